// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dapr components backed by Azure resources.
//!
//! The renderer describes the component in a flat string payload (see
//! [`keys`]). The handler confirms the Azure resource exists, reads its
//! access keys and applies a Dapr `Component` carrying them. The Azure
//! resource itself belongs to the user and is never deleted.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use radius_core::ResourceId;
use radius_core::datamodel::dapr::{KIND_PUBSUB_AZURE_SERVICE_BUS, KIND_STATE_AZURE_TABLE_STORAGE};
use radius_core::datamodel::{OutputResource, ResourceIdentity};
use serde_json::{Value, json};
use tracing::info;

use super::kubernetes::identity_of;
use super::{ArmClient, HandlerError, KubernetesClient, ResourceHandler, Result};

/// Payload keys shared by the Dapr renderers and handlers.
pub mod keys {
    /// Component name.
    pub const KUBERNETES_NAME: &str = "kubernetesname";
    /// Component namespace.
    pub const KUBERNETES_NAMESPACE: &str = "kubernetesnamespace";
    /// Component API version.
    pub const KUBERNETES_API_VERSION: &str = "kubernetesapiversion";
    /// Component kind.
    pub const KUBERNETES_KIND: &str = "kuberneteskind";
    /// Owning application name.
    pub const APPLICATION_NAME: &str = "applicationName";
    /// Radius resource name.
    pub const RESOURCE_NAME: &str = "resourceName";
    /// ID of the backing Azure resource.
    pub const RESOURCE_ID: &str = "resourceId";
    /// Storage account of a table.
    pub const STORAGE_ACCOUNT_NAME: &str = "storageAccountName";
    /// Service Bus namespace name.
    pub const SERVICE_BUS_NAMESPACE: &str = "serviceBusNamespace";
}

const STORAGE_API_VERSION: &str = "2022-09-01";
const SERVICE_BUS_API_VERSION: &str = "2021-11-01";
const ROOT_RULE: &str = "authorizationRules/RootManageSharedAccessKey";

fn payload_value<'a>(resource: &'a OutputResource, key: &str) -> Result<&'a str> {
    resource
        .resource
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            HandlerError::Invalid(format!(
                "missing required property '{key}' for output resource {}",
                resource.local_id
            ))
        })
}

fn pointer_string(body: &Value, pointer: &str, what: &str) -> Result<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HandlerError::Invalid(format!("{what} response has no value at {pointer}")))
}

/// Build the Dapr `Component` object described by the payload.
fn component(
    resource: &OutputResource,
    component_type: &str,
    metadata: Vec<(&str, String)>,
) -> Result<Value> {
    let metadata: Vec<Value> = metadata
        .into_iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();
    Ok(json!({
        "apiVersion": payload_value(resource, keys::KUBERNETES_API_VERSION)?,
        "kind": payload_value(resource, keys::KUBERNETES_KIND)?,
        "metadata": {
            "name": payload_value(resource, keys::KUBERNETES_NAME)?,
            "namespace": payload_value(resource, keys::KUBERNETES_NAMESPACE)?,
            "labels": {
                "radapp.io/application": resource.resource.get(keys::APPLICATION_NAME).cloned().unwrap_or(Value::Null),
                "radapp.io/resource": resource.resource.get(keys::RESOURCE_NAME).cloned().unwrap_or(Value::Null),
            },
        },
        "spec": {
            "type": component_type,
            "version": "v1",
            "metadata": metadata,
        },
    }))
}

async fn apply_component(
    kubernetes: &dyn KubernetesClient,
    resource: &mut OutputResource,
    object: Value,
) -> Result<String> {
    let identity = identity_of(&object)?;
    kubernetes.apply(&object).await?;
    let name = identity.name.clone();
    resource.identity = Some(ResourceIdentity::Kubernetes(identity));
    Ok(name)
}

async fn delete_component(kubernetes: &dyn KubernetesClient, resource: &OutputResource) -> Result<()> {
    match &resource.identity {
        Some(ResourceIdentity::Kubernetes(id)) => {
            kubernetes.delete(&id.kind, &id.namespace, &id.name).await
        }
        _ => Ok(()),
    }
}

fn parse_id(id: &str) -> Result<ResourceId> {
    ResourceId::parse(id).map_err(|e| HandlerError::Invalid(e.to_string()))
}

/// Dapr state store over an Azure Storage table.
pub struct DaprAzureStorageHandler {
    arm: Arc<dyn ArmClient>,
    kubernetes: Arc<dyn KubernetesClient>,
}

impl DaprAzureStorageHandler {
    /// Create the handler.
    pub fn new(arm: Arc<dyn ArmClient>, kubernetes: Arc<dyn KubernetesClient>) -> Self {
        Self { arm, kubernetes }
    }
}

#[async_trait]
impl ResourceHandler for DaprAzureStorageHandler {
    async fn put(&self, resource: &mut OutputResource) -> Result<BTreeMap<String, String>> {
        let table_id = payload_value(resource, keys::RESOURCE_ID)?.to_string();
        let table = parse_id(&table_id)?;
        self.arm.get_resource(&table_id, STORAGE_API_VERSION).await?;

        // tables -> tableServices -> storageAccounts
        let account_id = table.truncate().truncate();
        let account_name = account_id.name().to_string();
        let keys_response = self
            .arm
            .invoke_action(&account_id.to_string(), "listKeys", STORAGE_API_VERSION)
            .await?;
        let account_key = pointer_string(&keys_response, "/keys/0/value", "listKeys")?;

        let object = component(
            resource,
            KIND_STATE_AZURE_TABLE_STORAGE,
            vec![
                ("accountName", account_name.clone()),
                ("accountKey", account_key),
                ("tableName", table.name().to_string()),
            ],
        )?;
        let name = apply_component(self.kubernetes.as_ref(), resource, object).await?;
        info!(component = %name, table = %table_id, "applied dapr state store component");

        Ok(BTreeMap::from([
            (keys::KUBERNETES_NAME.to_string(), name),
            (keys::STORAGE_ACCOUNT_NAME.to_string(), account_name),
        ]))
    }

    async fn delete(&self, resource: &OutputResource) -> Result<()> {
        delete_component(self.kubernetes.as_ref(), resource).await
    }
}

/// Dapr pub/sub broker over an Azure Service Bus namespace.
pub struct DaprAzureServiceBusHandler {
    arm: Arc<dyn ArmClient>,
    kubernetes: Arc<dyn KubernetesClient>,
}

impl DaprAzureServiceBusHandler {
    /// Create the handler.
    pub fn new(arm: Arc<dyn ArmClient>, kubernetes: Arc<dyn KubernetesClient>) -> Self {
        Self { arm, kubernetes }
    }
}

#[async_trait]
impl ResourceHandler for DaprAzureServiceBusHandler {
    async fn put(&self, resource: &mut OutputResource) -> Result<BTreeMap<String, String>> {
        let namespace_id = payload_value(resource, keys::RESOURCE_ID)?.to_string();
        let namespace = parse_id(&namespace_id)?;
        self.arm
            .get_resource(&namespace_id, SERVICE_BUS_API_VERSION)
            .await?;

        let rule = format!("{namespace_id}/{ROOT_RULE}");
        let keys_response = self
            .arm
            .invoke_action(&rule, "listKeys", SERVICE_BUS_API_VERSION)
            .await?;
        let connection_string =
            pointer_string(&keys_response, "/primaryConnectionString", "listKeys")?;

        let object = component(
            resource,
            KIND_PUBSUB_AZURE_SERVICE_BUS,
            vec![("connectionString", connection_string)],
        )?;
        let name = apply_component(self.kubernetes.as_ref(), resource, object).await?;
        info!(component = %name, namespace = %namespace_id, "applied dapr pub/sub component");

        Ok(BTreeMap::from([
            (keys::KUBERNETES_NAME.to_string(), name),
            (
                keys::SERVICE_BUS_NAMESPACE.to_string(),
                namespace.name().to_string(),
            ),
        ]))
    }

    async fn delete(&self, resource: &OutputResource) -> Result<()> {
        delete_component(self.kubernetes.as_ref(), resource).await
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Azure Resource Manager resources.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use radius_core::datamodel::{OutputResource, ResourceIdentity};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{HandlerError, ResourceHandler, Result};

/// The subset of ARM the resource provider uses.
#[async_trait]
pub trait ArmClient: Send + Sync {
    /// Read a resource body. Missing resources fail with
    /// [`HandlerError::NotFound`].
    async fn get_resource(&self, id: &str, api_version: &str) -> Result<Value>;

    /// Invoke a POST action such as `listKeys` and return its response.
    async fn invoke_action(&self, id: &str, action: &str, api_version: &str) -> Result<Value>;

    /// Delete a resource. Absent resources are not an error.
    async fn delete_resource(&self, id: &str, api_version: &str) -> Result<()>;
}

/// ARM stand-in keeping resources and action responses in memory.
///
/// Keys are resource IDs compared case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryArm {
    resources: RwLock<HashMap<String, Value>>,
    actions: RwLock<HashMap<(String, String), Value>>,
    failing: bool,
}

impl InMemoryArm {
    /// Create an empty subscription.
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscription that rejects every call.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Add or replace a resource body.
    pub async fn insert_resource(&self, id: &str, body: Value) {
        self.resources
            .write()
            .await
            .insert(id.to_ascii_lowercase(), body);
    }

    /// Set the response of `action` on `id`.
    pub async fn set_action(&self, id: &str, action: &str, response: Value) {
        self.actions.write().await.insert(
            (id.to_ascii_lowercase(), action.to_ascii_lowercase()),
            response,
        );
    }

    /// True when a resource with this ID exists.
    pub async fn contains(&self, id: &str) -> bool {
        self.resources
            .read()
            .await
            .contains_key(&id.to_ascii_lowercase())
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(HandlerError::Provider(
                "azure resource manager is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ArmClient for InMemoryArm {
    async fn get_resource(&self, id: &str, _api_version: &str) -> Result<Value> {
        self.check()?;
        self.resources
            .read()
            .await
            .get(&id.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| HandlerError::NotFound(format!("azure resource {id}")))
    }

    async fn invoke_action(&self, id: &str, action: &str, _api_version: &str) -> Result<Value> {
        self.check()?;
        self.actions
            .read()
            .await
            .get(&(id.to_ascii_lowercase(), action.to_ascii_lowercase()))
            .cloned()
            .ok_or_else(|| HandlerError::NotFound(format!("action {action} on {id}")))
    }

    async fn delete_resource(&self, id: &str, _api_version: &str) -> Result<()> {
        self.check()?;
        self.resources
            .write()
            .await
            .remove(&id.to_ascii_lowercase());
        Ok(())
    }
}

/// Tracks Azure resources that already exist or were created by a recipe.
///
/// `put` never creates anything: it confirms the resource exists and loads
/// its body so computed values can read from it with JSON pointers.
pub struct ArmResourceHandler {
    client: Arc<dyn ArmClient>,
}

impl ArmResourceHandler {
    /// Create a handler over an ARM client.
    pub fn new(client: Arc<dyn ArmClient>) -> Self {
        Self { client }
    }
}

pub(crate) fn arm_identity(resource: &OutputResource) -> Result<(&str, &str)> {
    match &resource.identity {
        Some(ResourceIdentity::Arm(arm)) if !arm.id.is_empty() => {
            Ok((arm.id.as_str(), arm.api_version.as_str()))
        }
        _ => Err(HandlerError::Invalid(format!(
            "output resource {} is missing an azure resource id",
            resource.local_id
        ))),
    }
}

#[async_trait]
impl ResourceHandler for ArmResourceHandler {
    async fn put(&self, resource: &mut OutputResource) -> Result<BTreeMap<String, String>> {
        let (id, api_version) = arm_identity(resource)?;
        let id = id.to_string();
        let body = self.client.get_resource(&id, api_version).await?;
        debug!(local_id = %resource.local_id, resource_id = %id, "loaded azure resource");

        resource.resource = body;
        Ok(BTreeMap::from([("resourceId".to_string(), id)]))
    }

    async fn delete(&self, resource: &OutputResource) -> Result<()> {
        let (id, api_version) = arm_identity(resource)?;
        self.client.delete_resource(id, api_version).await
    }
}

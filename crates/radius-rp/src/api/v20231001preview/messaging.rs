// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RabbitMQ queues and extenders.

use std::collections::BTreeMap;

use radius_core::datamodel::datastores::values;
use radius_core::datamodel::{self, ProvisioningState, Resource, ResourceProvisioning};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    ProvisioningCheck, Recipe, ResourceStatus, VersionedProperties, basic_properties,
    non_empty, parse_provisioning, provisioning_state_of, recipe_of, status_of,
};
use crate::error::Result;

/// Secrets of a RabbitMQ queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMqQueueSecrets {
    /// Connection URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// `Applications.Messaging/rabbitMQQueues` properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMqQueueProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Environment ID.
    #[serde(default)]
    pub environment: String,
    /// Application ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// `manual` or `recipe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_provisioning: Option<String>,
    /// Recipe, in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
    /// Queue name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    /// Broker host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Broker port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Virtual host.
    #[serde(default, rename = "vHost", skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<RabbitMqQueueSecrets>,
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl VersionedProperties for RabbitMqQueueProperties {
    type DataModel = datamodel::RabbitMqQueueProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mode = parse_provisioning(self.resource_provisioning.as_deref())?;
        ProvisioningCheck::new(mode, self.recipe.as_ref())
            .required("queue", self.queue.is_some())
            .optional("host", self.host.is_some())
            .optional("port", self.port.is_some())
            .optional("vHost", self.vhost.is_some())
            .optional("username", self.username.is_some())
            .optional("tls", self.tls.is_some())
            .optional("secrets", self.secrets.is_some())
            .finish()?;

        let mut secrets = BTreeMap::new();
        if let Some(s) = self.secrets {
            if let Some(uri) = s.uri {
                secrets.insert(values::URI.to_string(), uri);
            }
            if let Some(password) = s.password {
                secrets.insert(values::PASSWORD.to_string(), password);
            }
        }

        Ok(datamodel::RabbitMqQueueProperties {
            basic: basic_properties(self.application, self.environment),
            resource_provisioning: mode,
            recipe: self.recipe.map(Recipe::convert_to),
            queue: self.queue,
            host: self.host,
            port: self.port,
            vhost: self.vhost,
            username: self.username,
            tls: self.tls,
            secrets,
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            environment: props.basic.environment.clone(),
            application: non_empty(&props.basic.application),
            resource_provisioning: Some(props.resource_provisioning.as_str().to_string()),
            recipe: recipe_of(&props.recipe),
            queue: props.queue.clone(),
            host: props.host.clone(),
            port: props.port,
            vhost: props.vhost.clone(),
            username: props.username.clone(),
            tls: props.tls,
            secrets: None,
            status: status_of(&props.basic),
        }
    }
}

/// `Applications.Core/extenders` properties.
///
/// Any property not listed here is an additional property and is returned
/// as a computed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtenderProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Environment ID.
    #[serde(default)]
    pub environment: String,
    /// Application ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// `manual` or `recipe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_provisioning: Option<String>,
    /// Recipe, in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
    /// Write-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<BTreeMap<String, String>>,
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
    /// Additional properties.
    #[serde(flatten)]
    pub additional_properties: BTreeMap<String, Value>,
}

impl VersionedProperties for ExtenderProperties {
    type DataModel = datamodel::ExtenderProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mode = parse_provisioning(self.resource_provisioning.as_deref())?;
        ProvisioningCheck::new(mode, self.recipe.as_ref())
            .optional("secrets", self.secrets.is_some())
            .finish()?;

        // Recipe outputs own the additional properties of a recipe extender.
        let additional_properties = match mode {
            ResourceProvisioning::Manual => self.additional_properties,
            ResourceProvisioning::Recipe => BTreeMap::new(),
        };
        Ok(datamodel::ExtenderProperties {
            basic: basic_properties(self.application, self.environment),
            resource_provisioning: mode,
            recipe: self.recipe.map(Recipe::convert_to),
            additional_properties,
            secrets: self.secrets.unwrap_or_default(),
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            environment: props.basic.environment.clone(),
            application: non_empty(&props.basic.application),
            resource_provisioning: Some(props.resource_provisioning.as_str().to_string()),
            recipe: recipe_of(&props.recipe),
            secrets: None,
            status: status_of(&props.basic),
            additional_properties: props.additional_properties.clone(),
        }
    }
}

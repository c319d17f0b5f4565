// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RabbitMQ queues and extenders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{BasicResourceProperties, ResourceProvisioning, ResourceRecipe};
use super::datastores::recipe_when;
use super::{Resource, ResourceProperties, resource_types};

/// Computed value key holding the queue name.
pub const QUEUE: &str = "queue";

/// Applications.Messaging/rabbitMQQueues properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMqQueueProperties {
    /// Application, environment and status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Manual or recipe.
    #[serde(default)]
    pub resource_provisioning: ResourceProvisioning,
    /// Recipe selection in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<ResourceRecipe>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,
    /// User name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Whether TLS is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    /// Secrets supplied with a write request. Held in memory only.
    #[serde(skip)]
    pub secrets: BTreeMap<String, String>,
}

impl ResourceProperties for RabbitMqQueueProperties {
    const RESOURCE_TYPE: &'static str = resource_types::RABBITMQ_QUEUES;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }

    fn recipe(&self) -> Option<ResourceRecipe> {
        recipe_when(self.resource_provisioning, &self.recipe)
    }

    fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        Some(&mut self.secrets)
    }

    fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
        if let Some(queue) = computed.get(QUEUE).and_then(Value::as_str) {
            self.queue = Some(queue.to_string());
        }
    }
}

/// Applications.Messaging/rabbitMQQueues
pub type RabbitMqQueue = Resource<RabbitMqQueueProperties>;

/// Applications.Core/extenders properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtenderProperties {
    /// Application, environment and status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Manual or recipe.
    #[serde(default)]
    pub resource_provisioning: ResourceProvisioning,
    /// Recipe selection in recipe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<ResourceRecipe>,
    /// User defined, non-secret properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, Value>,
    /// Secrets supplied with a write request. Held in memory only.
    #[serde(skip)]
    pub secrets: BTreeMap<String, String>,
}

impl ResourceProperties for ExtenderProperties {
    const RESOURCE_TYPE: &'static str = resource_types::EXTENDERS;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }

    fn recipe(&self) -> Option<ResourceRecipe> {
        recipe_when(self.resource_provisioning, &self.recipe)
    }

    fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        Some(&mut self.secrets)
    }

    fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
        // Recipe outputs surface as extender properties.
        if self.resource_provisioning == ResourceProvisioning::Recipe {
            for (k, v) in computed {
                self.additional_properties.insert(k.clone(), v.clone());
            }
        }
    }
}

/// Applications.Core/extenders
pub type Extender = Resource<ExtenderProperties>;

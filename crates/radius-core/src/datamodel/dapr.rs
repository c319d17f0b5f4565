// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dapr state stores, pub/sub brokers and secret stores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{BasicResourceProperties, ResourceProvisioning, ResourceRecipe};
use super::{Resource, ResourceProperties, resource_types};

/// Kind value selecting a plain Dapr component.
pub const KIND_GENERIC: &str = "generic";
/// State store kind backed by an Azure Storage table.
pub const KIND_STATE_AZURE_TABLE_STORAGE: &str = "state.azure.tablestorage";
/// Pub/sub kind backed by an Azure Service Bus namespace.
pub const KIND_PUBSUB_AZURE_SERVICE_BUS: &str = "pubsub.azure.servicebus";

/// The manual-mode description of a Dapr component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaprComponentSpec {
    /// Sub-renderer selector; `generic` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Dapr component type, e.g. `state.redis`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    /// Dapr component version, e.g. `v1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Component metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Backing Azure resource for the Azure kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl DaprComponentSpec {
    /// Effective kind.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(KIND_GENERIC)
    }
}

macro_rules! dapr_resource {
    ($(#[$doc:meta])* $props:ident, $alias:ident, $type_const:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $props {
            /// Application, environment and status.
            #[serde(flatten)]
            pub basic: BasicResourceProperties,
            /// Manual or recipe.
            #[serde(default)]
            pub resource_provisioning: ResourceProvisioning,
            /// Recipe selection in recipe mode.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub recipe: Option<ResourceRecipe>,
            /// Component description in manual mode.
            #[serde(flatten)]
            pub component: DaprComponentSpec,
            /// Name of the deployed Dapr component.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub component_name: Option<String>,
        }

        impl ResourceProperties for $props {
            const RESOURCE_TYPE: &'static str = $type_const;

            fn basic(&self) -> &BasicResourceProperties {
                &self.basic
            }

            fn basic_mut(&mut self) -> &mut BasicResourceProperties {
                &mut self.basic
            }

            fn recipe(&self) -> Option<ResourceRecipe> {
                super::datastores::recipe_when(self.resource_provisioning, &self.recipe)
            }

            fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
                self.component_name = computed
                    .get(COMPONENT_NAME)
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }

        #[doc = concat!("Resource envelope for [`", stringify!($props), "`].")]
        pub type $alias = Resource<$props>;
    };
}

/// Computed value key holding the Dapr component name.
pub const COMPONENT_NAME: &str = "componentName";

dapr_resource!(
    /// Applications.Dapr/stateStores properties.
    DaprStateStoreProperties,
    DaprStateStore,
    resource_types::DAPR_STATE_STORES
);

dapr_resource!(
    /// Applications.Dapr/pubSubBrokers properties.
    DaprPubSubBrokerProperties,
    DaprPubSubBroker,
    resource_types::DAPR_PUB_SUB_BROKERS
);

dapr_resource!(
    /// Applications.Dapr/secretStores properties.
    DaprSecretStoreProperties,
    DaprSecretStore,
    resource_types::DAPR_SECRET_STORES
);

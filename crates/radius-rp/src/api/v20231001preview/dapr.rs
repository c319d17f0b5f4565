// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dapr state stores, pub/sub brokers and secret stores.
//!
//! In manual mode a `generic` component needs `type`, `version` and
//! `metadata`; the Azure kinds point at an existing `resource` instead.

use std::collections::BTreeMap;

use radius_core::datamodel::dapr::KIND_GENERIC;
use radius_core::datamodel::{self, DaprComponentSpec, ProvisioningState, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    ProvisioningCheck, Recipe, ResourceStatus, VersionedProperties, basic_properties,
    non_empty, parse_provisioning, provisioning_state_of, recipe_of, status_of,
};
use crate::error::Result;

macro_rules! dapr_properties {
    ($(#[$doc:meta])* $name:ident => $model:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
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
            /// Component kind, `generic` when omitted.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub kind: Option<String>,
            /// Dapr component type.
            #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
            pub component_type: Option<String>,
            /// Dapr component version.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub version: Option<String>,
            /// Component metadata.
            #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
            pub metadata: BTreeMap<String, Value>,
            /// Backing resource ID.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub resource: Option<String>,
            /// Name of the deployed component. Read-only.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub component_name: Option<String>,
            /// Read-only.
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub status: Option<ResourceStatus>,
        }

        impl VersionedProperties for $name {
            type DataModel = datamodel::$model;

            fn convert_to(self) -> Result<Self::DataModel> {
                let mode = parse_provisioning(self.resource_provisioning.as_deref())?;
                let generic = self.kind.as_deref().unwrap_or(KIND_GENERIC) == KIND_GENERIC;
                let mut check = ProvisioningCheck::new(mode, self.recipe.as_ref());
                if generic {
                    check
                        .required("type", self.component_type.is_some())
                        .required("version", self.version.is_some())
                        .required("metadata", !self.metadata.is_empty())
                        .optional("resource", self.resource.is_some());
                } else {
                    check
                        .required("resource", self.resource.is_some())
                        .optional("type", self.component_type.is_some())
                        .optional("version", self.version.is_some())
                        .optional("metadata", !self.metadata.is_empty());
                }
                check.finish()?;

                Ok(datamodel::$model {
                    basic: basic_properties(self.application, self.environment),
                    resource_provisioning: mode,
                    recipe: self.recipe.map(Recipe::convert_to),
                    component: DaprComponentSpec {
                        kind: self.kind,
                        component_type: self.component_type,
                        version: self.version,
                        metadata: self.metadata,
                        resource: self.resource,
                    },
                    component_name: None,
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
                    kind: props.component.kind.clone(),
                    component_type: props.component.component_type.clone(),
                    version: props.component.version.clone(),
                    metadata: props.component.metadata.clone(),
                    resource: props.component.resource.clone(),
                    component_name: props.component_name.clone(),
                    status: status_of(&props.basic),
                }
            }
        }
    };
}

dapr_properties!(
    /// `Applications.Dapr/stateStores` properties.
    DaprStateStoreProperties => DaprStateStoreProperties
);

dapr_properties!(
    /// `Applications.Dapr/pubSubBrokers` properties.
    DaprPubSubBrokerProperties => DaprPubSubBrokerProperties
);

dapr_properties!(
    /// `Applications.Dapr/secretStores` properties.
    DaprSecretStoreProperties => DaprSecretStoreProperties
);

#[cfg(test)]
mod tests {
    use super::super::{resource_from_datamodel, resource_to_datamodel};
    use radius_core::datamodel::{AnyResource, ResourceProvisioning, resource_types};
    use serde_json::json;

    const ENV_ID: &str =
        "/planes/radius/local/resourceGroups/rg/providers/Applications.Core/environments/env";

    #[test]
    fn test_manual_generic_state_store() {
        let body = json!({
            "properties": {
                "environment": ENV_ID,
                "resourceProvisioning": "manual",
                "type": "state.redis",
                "version": "v1",
                "metadata": {"redisHost": "redis:6379"}
            }
        });
        let resource = resource_to_datamodel(resource_types::DAPR_STATE_STORES, body).unwrap();
        let AnyResource::DaprStateStore(store) = &resource else {
            panic!("expected a state store");
        };
        assert_eq!(store.properties.resource_provisioning, ResourceProvisioning::Manual);
        assert_eq!(store.properties.component.kind(), "generic");
        assert!(resource.recipe().is_none());

        let wire = resource_from_datamodel(&resource).unwrap();
        assert_eq!(wire["properties"]["type"], "state.redis");
        assert_eq!(wire["properties"]["metadata"]["redisHost"], "redis:6379");
    }

    #[test]
    fn test_manual_generic_reports_every_missing_field() {
        let body = json!({
            "properties": {
                "environment": ENV_ID,
                "resourceProvisioning": "manual",
                "recipe": {"name": "custom"}
            }
        });
        let err = resource_to_datamodel(resource_types::DAPR_PUB_SUB_BROKERS, body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "multiple errors were found:\n\
             \trecipe details cannot be specified when resourceProvisioning is set to manual\n\
             \ttype must be specified when resourceProvisioning is set to manual\n\
             \tversion must be specified when resourceProvisioning is set to manual\n\
             \tmetadata must be specified when resourceProvisioning is set to manual"
        );
    }

    #[test]
    fn test_recipe_mode_rejects_manual_fields() {
        let body = json!({
            "properties": {
                "environment": ENV_ID,
                "type": "secretstores.kubernetes",
                "version": "v1"
            }
        });
        let err = resource_to_datamodel(resource_types::DAPR_SECRET_STORES, body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "multiple errors were found:\n\
             \ttype cannot be specified when resourceProvisioning is set to recipe (default)\n\
             \tversion cannot be specified when resourceProvisioning is set to recipe (default)"
        );
    }

    #[test]
    fn test_recipe_mode_defaults() {
        let body = json!({"properties": {"environment": ENV_ID}});
        let resource = resource_to_datamodel(resource_types::DAPR_STATE_STORES, body).unwrap();
        assert_eq!(resource.recipe().unwrap().name, "default");
    }

    #[test]
    fn test_azure_kind_needs_resource() {
        let body = json!({
            "properties": {
                "environment": ENV_ID,
                "resourceProvisioning": "manual",
                "kind": "state.azure.tablestorage"
            }
        });
        let err = resource_to_datamodel(resource_types::DAPR_STATE_STORES, body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "resource must be specified when resourceProvisioning is set to manual"
        );
    }
}

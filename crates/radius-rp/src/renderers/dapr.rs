// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dapr component renderers.

use std::collections::BTreeMap;

use radius_core::datamodel::dapr::{
    COMPONENT_NAME, KIND_GENERIC, KIND_PUBSUB_AZURE_SERVICE_BUS, KIND_STATE_AZURE_TABLE_STORAGE,
};
use radius_core::datamodel::{
    AnyResource, ComputedValueReference, DaprComponentSpec, OutputResource, ResourceProperties,
    ResourceRecipe, ResourceType, kinds, local_ids, providers,
};
use serde_json::{Value, json};

use super::{
    KindRegistry, RenderOptions, Renderer, RendererOutput, application_name, invalid_model,
    parse_resource_field, recipe_data,
};
use crate::error::{ClientError, Result};
use crate::handlers::keys;

const DAPR_API_VERSION: &str = "dapr.io/v1alpha1";
const DAPR_KIND: &str = "Component";
const STORAGE_TABLE_TYPE: &str = "Microsoft.Storage/storageAccounts/tableServices/tables";
const SERVICE_BUS_NAMESPACE_TYPE: &str = "Microsoft.ServiceBus/namespaces";

/// What the kind specific render functions need.
struct DaprInput<'a> {
    name: &'a str,
    application: Option<String>,
    component: &'a DaprComponentSpec,
    namespace: &'a str,
}

type RenderFn = fn(&DaprInput<'_>) -> Result<RendererOutput>;

fn metadata_entries(metadata: &BTreeMap<String, Value>) -> Vec<Value> {
    metadata
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({"name": name, "value": value})
        })
        .collect()
}

fn render_generic(input: &DaprInput<'_>) -> Result<RendererOutput> {
    let component = input.component;
    let component_type = component
        .component_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::bad_request("No type specified for generic Dapr component"))?;
    let version = component
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ClientError::bad_request("No Dapr component version specified for generic Dapr component")
        })?;
    if component.metadata.is_empty() {
        return Err(ClientError::bad_request(format!(
            "No metadata specified for Dapr component of type {component_type}"
        ))
        .into());
    }

    let object = json!({
        "apiVersion": DAPR_API_VERSION,
        "kind": DAPR_KIND,
        "metadata": {
            "name": input.name.to_ascii_lowercase(),
            "namespace": input.namespace,
            "labels": {
                "radapp.io/application": input.application.as_deref().unwrap_or_default(),
                "radapp.io/resource": input.name,
            },
        },
        "spec": {
            "type": component_type,
            "version": version,
            "metadata": metadata_entries(&component.metadata),
        },
    });

    Ok(RendererOutput {
        resources: vec![OutputResource::new(
            local_ids::DAPR_COMPONENT,
            ResourceType::new(kinds::DAPR_COMPONENT, providers::KUBERNETES),
            object,
        )],
        ..Default::default()
    })
}

/// Payload read by the Azure-backed Dapr handlers.
fn azure_payload(input: &DaprInput<'_>, resource_id: String, extra: (&str, String)) -> Value {
    let mut payload = json!({
        (keys::KUBERNETES_NAME): input.name.to_ascii_lowercase(),
        (keys::KUBERNETES_NAMESPACE): input.namespace,
        (keys::KUBERNETES_API_VERSION): DAPR_API_VERSION,
        (keys::KUBERNETES_KIND): DAPR_KIND,
        (keys::APPLICATION_NAME): input.application.as_deref().unwrap_or_default(),
        (keys::RESOURCE_NAME): input.name,
        (keys::RESOURCE_ID): resource_id,
    });
    payload[extra.0] = Value::String(extra.1);
    payload
}

fn render_table_storage(input: &DaprInput<'_>) -> Result<RendererOutput> {
    let table = parse_resource_field(
        input.component.resource.as_deref(),
        STORAGE_TABLE_TYPE,
        "a Storage Table",
    )?;
    let account = table.truncate().truncate();

    let payload = azure_payload(
        input,
        table.to_string(),
        (keys::STORAGE_ACCOUNT_NAME, account.name().to_string()),
    );
    Ok(RendererOutput {
        resources: vec![OutputResource::new(
            local_ids::DAPR_STATE_STORE_AZURE_STORAGE,
            ResourceType::new(kinds::DAPR_STATE_STORE_AZURE_STORAGE, providers::AZURE),
            payload,
        )],
        ..Default::default()
    })
}

fn render_service_bus(input: &DaprInput<'_>) -> Result<RendererOutput> {
    let namespace = parse_resource_field(
        input.component.resource.as_deref(),
        SERVICE_BUS_NAMESPACE_TYPE,
        "a ServiceBus Namespace",
    )?;

    let payload = azure_payload(
        input,
        namespace.to_string(),
        (keys::SERVICE_BUS_NAMESPACE, namespace.name().to_string()),
    );
    Ok(RendererOutput {
        resources: vec![OutputResource::new(
            local_ids::DAPR_PUB_SUB_AZURE_SERVICE_BUS,
            ResourceType::new(kinds::DAPR_PUB_SUB_AZURE_SERVICE_BUS, providers::AZURE),
            payload,
        )],
        ..Default::default()
    })
}

/// Shared flow of the three Dapr renderers.
fn render_dapr<P: ResourceProperties>(
    registry: &KindRegistry<RenderFn>,
    name: &str,
    properties: &P,
    component: &DaprComponentSpec,
    recipe: Option<ResourceRecipe>,
    options: &RenderOptions,
) -> Result<RendererOutput> {
    let application = application_name(&properties.basic().application)?;

    let mut output = match recipe {
        Some(recipe) => RendererOutput {
            recipe_data: Some(recipe_data(recipe)),
            ..Default::default()
        },
        None => {
            let render = registry.get(component.kind())?;
            render(&DaprInput {
                name,
                application,
                component,
                namespace: &options.namespace,
            })?
        }
    };
    output.computed_values.insert(
        COMPONENT_NAME.to_string(),
        ComputedValueReference::value(name.to_ascii_lowercase()),
    );
    Ok(output)
}

/// Renders `Applications.Dapr/stateStores`.
pub struct DaprStateStoreRenderer {
    kinds: KindRegistry<RenderFn>,
}

impl Default for DaprStateStoreRenderer {
    fn default() -> Self {
        Self {
            kinds: KindRegistry::new()
                .register(KIND_GENERIC, render_generic as RenderFn)
                .register(KIND_STATE_AZURE_TABLE_STORAGE, render_table_storage),
        }
    }
}

impl Renderer for DaprStateStoreRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::DaprStateStore(r) = resource else {
            return Err(invalid_model());
        };
        render_dapr(
            &self.kinds,
            r.name(),
            &r.properties,
            &r.properties.component,
            r.properties.recipe(),
            options,
        )
    }
}

/// Renders `Applications.Dapr/pubSubBrokers`.
pub struct DaprPubSubBrokerRenderer {
    kinds: KindRegistry<RenderFn>,
}

impl Default for DaprPubSubBrokerRenderer {
    fn default() -> Self {
        Self {
            kinds: KindRegistry::new()
                .register(KIND_GENERIC, render_generic as RenderFn)
                .register(KIND_PUBSUB_AZURE_SERVICE_BUS, render_service_bus),
        }
    }
}

impl Renderer for DaprPubSubBrokerRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::DaprPubSubBroker(r) = resource else {
            return Err(invalid_model());
        };
        render_dapr(
            &self.kinds,
            r.name(),
            &r.properties,
            &r.properties.component,
            r.properties.recipe(),
            options,
        )
    }
}

/// Renders `Applications.Dapr/secretStores`.
pub struct DaprSecretStoreRenderer {
    kinds: KindRegistry<RenderFn>,
}

impl Default for DaprSecretStoreRenderer {
    fn default() -> Self {
        Self {
            kinds: KindRegistry::new().register(KIND_GENERIC, render_generic as RenderFn),
        }
    }
}

impl Renderer for DaprSecretStoreRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::DaprSecretStore(r) = resource else {
            return Err(invalid_model());
        };
        render_dapr(
            &self.kinds,
            r.name(),
            &r.properties,
            &r.properties.component,
            r.properties.recipe(),
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::ResourceId;
    use radius_core::datamodel::{
        DaprPubSubBroker, DaprPubSubBrokerProperties, DaprStateStore, DaprStateStoreProperties,
        ResourceProvisioning, RedisCache, RedisCacheProperties,
    };

    const APP: &str =
        "/subscriptions/test-sub/resourceGroups/test-group/providers/Applications.Core/applications/testApplication";
    const TABLE: &str = "/subscriptions/test-sub/resourceGroups/test-group/providers/Microsoft.Storage/storageAccounts/test-account/tableServices/default/tables/mytable";

    fn options() -> RenderOptions {
        RenderOptions {
            namespace: "default-app".to_string(),
            environment_id: String::new(),
            application: Some("testApplication".to_string()),
        }
    }

    fn state_store(component: DaprComponentSpec) -> AnyResource {
        let id = ResourceId::parse(
            "/subscriptions/test-sub/resourceGroups/test-group/providers/Applications.Dapr/stateStores/daprStateStore0",
        )
        .unwrap();
        let mut props = DaprStateStoreProperties {
            resource_provisioning: ResourceProvisioning::Manual,
            component,
            ..Default::default()
        };
        props.basic.application = APP.to_string();
        DaprStateStore::new(&id, props).into()
    }

    #[test]
    fn test_render_table_storage() {
        let resource = state_store(DaprComponentSpec {
            kind: Some(KIND_STATE_AZURE_TABLE_STORAGE.to_string()),
            resource: Some(TABLE.to_string()),
            ..Default::default()
        });

        let output = DaprStateStoreRenderer::default()
            .render(&resource, &options())
            .unwrap();

        assert_eq!(output.resources.len(), 1);
        let out = &output.resources[0];
        assert_eq!(out.local_id, local_ids::DAPR_STATE_STORE_AZURE_STORAGE);
        assert_eq!(out.resource_type.provider, providers::AZURE);
        assert_eq!(out.resource[keys::RESOURCE_ID], TABLE);
        assert_eq!(out.resource[keys::STORAGE_ACCOUNT_NAME], "test-account");
        assert_eq!(out.resource[keys::APPLICATION_NAME], "testApplication");
        assert_eq!(
            output.computed_values[COMPONENT_NAME],
            ComputedValueReference::value("daprstatestore0")
        );
    }

    #[test]
    fn test_render_table_storage_wrong_resource_type() {
        let resource = state_store(DaprComponentSpec {
            kind: Some(KIND_STATE_AZURE_TABLE_STORAGE.to_string()),
            resource: Some(
                "/subscriptions/test-sub/resourceGroups/test-group/providers/Microsoft.ServiceBus/namespaces/bus"
                    .to_string(),
            ),
            ..Default::default()
        });
        let err = DaprStateStoreRenderer::default()
            .render(&resource, &options())
            .unwrap_err();
        assert_eq!(err.to_string(), "the 'resource' field must refer to a Storage Table");
    }

    #[test]
    fn test_render_unsupported_kind() {
        let resource = state_store(DaprComponentSpec {
            kind: Some("state.azure.cosmosdb".to_string()),
            ..Default::default()
        });
        let err = DaprStateStoreRenderer::default()
            .render(&resource, &options())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "state.azure.cosmosdb is not supported. Supported kind values: [generic, state.azure.tablestorage]"
        );
    }

    #[test]
    fn test_render_generic() {
        let resource = state_store(DaprComponentSpec {
            component_type: Some("state.zookeeper".to_string()),
            version: Some("v1".to_string()),
            metadata: BTreeMap::from([
                ("servers".to_string(), json!("zk:2181")),
                ("ttl".to_string(), json!(30)),
            ]),
            ..Default::default()
        });
        let output = DaprStateStoreRenderer::default()
            .render(&resource, &options())
            .unwrap();

        let component = &output.resources[0].resource;
        assert_eq!(output.resources[0].local_id, local_ids::DAPR_COMPONENT);
        assert_eq!(component["metadata"]["name"], "daprstatestore0");
        assert_eq!(component["metadata"]["namespace"], "default-app");
        assert_eq!(component["spec"]["type"], "state.zookeeper");
        assert_eq!(
            component["spec"]["metadata"],
            json!([{"name": "servers", "value": "zk:2181"}, {"name": "ttl", "value": "30"}])
        );
    }

    #[test]
    fn test_render_generic_validation_order() {
        let cases = vec![
            (DaprComponentSpec::default(), "No type specified for generic Dapr component"),
            (
                DaprComponentSpec {
                    component_type: Some("state.zookeeper".to_string()),
                    ..Default::default()
                },
                "No Dapr component version specified for generic Dapr component",
            ),
            (
                DaprComponentSpec {
                    component_type: Some("state.zookeeper".to_string()),
                    version: Some("v1".to_string()),
                    ..Default::default()
                },
                "No metadata specified for Dapr component of type state.zookeeper",
            ),
        ];
        for (component, expected) in cases {
            let err = DaprStateStoreRenderer::default()
                .render(&state_store(component), &options())
                .unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_render_service_bus() {
        let id = ResourceId::parse(
            "/subscriptions/test-sub/resourceGroups/test-group/providers/Applications.Dapr/pubSubBrokers/pubsub",
        )
        .unwrap();
        let props = DaprPubSubBrokerProperties {
            resource_provisioning: ResourceProvisioning::Manual,
            component: DaprComponentSpec {
                kind: Some(KIND_PUBSUB_AZURE_SERVICE_BUS.to_string()),
                resource: Some(
                    "/subscriptions/test-sub/resourceGroups/test-group/providers/Microsoft.ServiceBus/namespaces/bus"
                        .to_string(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        let output = DaprPubSubBrokerRenderer::default()
            .render(&DaprPubSubBroker::new(&id, props).into(), &options())
            .unwrap();
        assert_eq!(output.resources[0].resource[keys::SERVICE_BUS_NAMESPACE], "bus");
    }

    #[test]
    fn test_render_recipe_mode() {
        let id = ResourceId::parse(
            "/subscriptions/test-sub/resourceGroups/test-group/providers/Applications.Dapr/stateStores/s",
        )
        .unwrap();
        let output = DaprStateStoreRenderer::default()
            .render(
                &DaprStateStore::new(&id, DaprStateStoreProperties::default()).into(),
                &options(),
            )
            .unwrap();
        assert!(output.resources.is_empty());
        assert_eq!(output.recipe_data.unwrap().name, "default");
    }

    #[test]
    fn test_render_invalid_model() {
        let id = ResourceId::parse(
            "/subscriptions/test-sub/resourceGroups/test-group/providers/Applications.Datastores/redisCaches/r",
        )
        .unwrap();
        let err = DaprStateStoreRenderer::default()
            .render(
                &RedisCache::new(&id, RedisCacheProperties::default()).into(),
                &options(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid model conversion");
    }
}

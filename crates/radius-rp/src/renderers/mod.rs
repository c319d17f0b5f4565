// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Renderers.
//!
//! A renderer translates one logical resource into the output resources that
//! back it, together with the computed values and secret references the
//! deployment processor resolves later. Rendering is pure: nothing here talks
//! to a provider.
//!
//! | Resource type | Renderer | Discriminator |
//! |---------------|----------|---------------|
//! | `Applications.Core/environments` | [`EnvironmentRenderer`] | |
//! | `Applications.Core/applications` | [`ApplicationRenderer`] | |
//! | `Applications.Core/extenders` | [`ExtenderRenderer`] | `resourceProvisioning` |
//! | `Applications.Dapr/stateStores` | [`DaprStateStoreRenderer`] | `kind` |
//! | `Applications.Dapr/pubSubBrokers` | [`DaprPubSubBrokerRenderer`] | `kind` |
//! | `Applications.Dapr/secretStores` | [`DaprSecretStoreRenderer`] | `kind` |
//! | `Applications.Datastores/mongoDatabases` | [`MongoDatabaseRenderer`] | `resourceProvisioning` |
//! | `Applications.Datastores/redisCaches` | [`RedisCacheRenderer`] | `resourceProvisioning` |
//! | `Applications.Datastores/sqlDatabases` | [`SqlDatabaseRenderer`] | `resourceProvisioning` |
//! | `Applications.Messaging/rabbitMQQueues` | [`RabbitMqQueueRenderer`] | `resourceProvisioning` |

mod dapr;
mod datastores;
mod environment;
mod messaging;

pub use dapr::{DaprPubSubBrokerRenderer, DaprSecretStoreRenderer, DaprStateStoreRenderer};
pub use datastores::{MongoDatabaseRenderer, RedisCacheRenderer, SqlDatabaseRenderer};
pub use environment::{ApplicationRenderer, EnvironmentRenderer};
pub use messaging::{ExtenderRenderer, RabbitMqQueueRenderer};

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use radius_core::ResourceId;
use radius_core::datamodel::{
    AnyResource, ComputedValueReference, OutputResource, RecipeData, ResourceRecipe,
    ResourceType, SecretValueReference, kinds, local_ids, providers,
};
use serde_json::json;

use crate::error::{ClientError, Error, Result};
use crate::recipes::RecipeContext;

/// Turns a resource into output resources.
pub trait Renderer: Send + Sync {
    /// Render `resource`.
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput>;
}

/// Deployment context a renderer needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    /// Kubernetes namespace the resource deploys to.
    pub namespace: String,
    /// Environment ID.
    pub environment_id: String,
    /// Application name, when the resource belongs to one.
    pub application: Option<String>,
}

/// What a renderer produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererOutput {
    /// Output resources, in no particular order.
    pub resources: Vec<OutputResource>,
    /// Values resolved after deployment.
    pub computed_values: BTreeMap<String, ComputedValueReference>,
    /// Secret references.
    pub secret_values: BTreeMap<String, SecretValueReference>,
    /// Recipe to run, for recipe-provisioned resources.
    pub recipe_data: Option<RecipeData>,
    /// Environment the resource deploys into.
    pub environment_id: String,
    /// Context passed to the recipe, set by the processor for
    /// recipe-provisioned resources.
    pub recipe_context: Option<RecipeContext>,
}

/// Sub-renderers keyed by a discriminator value.
pub struct KindRegistry<F> {
    entries: BTreeMap<&'static str, F>,
}

impl<F> KindRegistry<F> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register `f` under `kind`.
    pub fn register(mut self, kind: &'static str, f: F) -> Self {
        self.entries.insert(kind, f);
        self
    }

    /// Look up a kind. Misses list the registered kinds in sorted order.
    pub fn get(&self, kind: &str) -> Result<&F> {
        self.entries.get(kind).ok_or_else(|| {
            let supported: Vec<&str> = self.entries.keys().copied().collect();
            ClientError::bad_request(format!(
                "{kind} is not supported. Supported kind values: [{}]",
                supported.join(", ")
            ))
            .into()
        })
    }
}

impl<F> Default for KindRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn invalid_model() -> Error {
    Error::Other("invalid model conversion".to_string())
}

/// Parse the application property, returning the application name.
pub(crate) fn application_name(application: &str) -> Result<Option<String>> {
    if application.is_empty() {
        return Ok(None);
    }
    let id = ResourceId::parse(application).map_err(|e| {
        ClientError::bad_request(format!("failed to parse application from the property: {e}"))
    })?;
    Ok(Some(id.name().to_string()))
}

/// Validate a `resource` field against the expected Azure type.
pub(crate) fn parse_resource_field(
    resource: Option<&str>,
    expected_type: &str,
    description: &str,
) -> Result<ResourceId> {
    let id = resource
        .filter(|r| !r.is_empty())
        .and_then(|r| ResourceId::parse(r).ok())
        .filter(ResourceId::is_resource)
        .ok_or_else(|| {
            ClientError::bad_request("the 'resource' field must be a valid resource id")
        })?;
    if !id.resource_type().eq_ignore_ascii_case(expected_type) {
        return Err(ClientError::bad_request(format!(
            "the 'resource' field must refer to {description}"
        ))
        .into());
    }
    Ok(id)
}

/// Recipe bookkeeping for a recipe-provisioned resource. The processor
/// resolves the template from the environment.
pub(crate) fn recipe_data(recipe: ResourceRecipe) -> RecipeData {
    RecipeData {
        name: recipe.name,
        template_kind: String::new(),
        template_path: String::new(),
        parameters: recipe.parameters,
        resources: Vec::new(),
    }
}

/// Name of the Kubernetes `Secret` that holds a resource's secrets.
///
/// Names are lower case and include the type, so a Redis cache and a SQL
/// database with the same name get separate secrets.
pub(crate) fn secret_object_name(resource_type: &str, resource_name: &str) -> String {
    let type_name = resource_type.rsplit('/').next().unwrap_or(resource_type);
    format!("{type_name}-{resource_name}").to_ascii_lowercase()
}

/// Store user supplied secrets in a Kubernetes `Secret` and reference them.
pub(crate) fn secret_values(
    resource_type: &str,
    resource_name: &str,
    options: &RenderOptions,
    secrets: &BTreeMap<String, String>,
    output: &mut RendererOutput,
) {
    if secrets.is_empty() {
        return;
    }
    let data: BTreeMap<&str, String> = secrets
        .iter()
        .map(|(k, v)| (k.as_str(), STANDARD.encode(v)))
        .collect();
    output.resources.push(OutputResource::new(
        local_ids::SECRET_VALUES,
        ResourceType::new(kinds::SECRET, providers::KUBERNETES),
        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "type": "Opaque",
            "metadata": {
                "name": secret_object_name(resource_type, resource_name),
                "namespace": options.namespace,
            },
            "data": data,
        }),
    ));
    for key in secrets.keys() {
        output.secret_values.insert(
            key.clone(),
            SecretValueReference::new(local_ids::SECRET_VALUES, "", format!("/data/{key}")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_kind_registry_lists_sorted_kinds() {
        let registry: KindRegistry<u8> = KindRegistry::new()
            .register("state.azure.tablestorage", 1)
            .register("generic", 2);
        assert_eq!(*registry.get("generic").unwrap(), 2);

        let err = registry.get("state.azure.cosmosdb").err().unwrap();
        assert_eq!(
            err.to_string(),
            "state.azure.cosmosdb is not supported. Supported kind values: [generic, state.azure.tablestorage]"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_application_name() {
        assert_eq!(application_name("").unwrap(), None);
        assert_eq!(
            application_name(
                "/planes/radius/local/resourceGroups/rg/providers/Applications.Core/applications/app"
            )
            .unwrap()
            .as_deref(),
            Some("app")
        );
        let err = application_name("invalid-app-id").unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to parse application from the property: 'invalid-app-id' is not a valid resource id"
        );
    }

    #[test]
    fn test_parse_resource_field() {
        let err = parse_resource_field(None, "Microsoft.Cache/redis", "an Azure Redis Cache")
            .unwrap_err();
        assert_eq!(err.to_string(), "the 'resource' field must be a valid resource id");

        let err = parse_resource_field(
            Some("/subscriptions/s/resourceGroups/g/providers/Microsoft.Sql/servers/s/databases/d"),
            "Microsoft.Cache/redis",
            "an Azure Redis Cache",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "the 'resource' field must refer to an Azure Redis Cache"
        );
    }

    #[test]
    fn test_secret_names_differ_by_type() {
        let redis = secret_object_name("Applications.Datastores/redisCaches", "db");
        let sql = secret_object_name("Applications.Datastores/sqlDatabases", "db");
        assert_eq!(redis, "rediscaches-db");
        assert_eq!(sql, "sqldatabases-db");
        assert_eq!(
            secret_object_name("Applications.Datastores/redisCaches", "DB"),
            redis
        );
    }

    #[test]
    fn test_secret_values_are_encoded() {
        let mut output = RendererOutput::default();
        let options = RenderOptions {
            namespace: "default-app".to_string(),
            ..Default::default()
        };
        let secrets = BTreeMap::from([("password".to_string(), "hunter2".to_string())]);
        secret_values(
            "Applications.Datastores/redisCaches",
            "Redis0",
            &options,
            &secrets,
            &mut output,
        );

        let secret = &output.resources[0];
        assert_eq!(secret.local_id, local_ids::SECRET_VALUES);
        assert_eq!(secret.resource["metadata"]["name"], "rediscaches-redis0");
        assert_eq!(
            secret.resource["data"]["password"],
            Value::String(STANDARD.encode("hunter2"))
        );
        assert_eq!(output.secret_values["password"].value_selector, "/data/password");
    }
}

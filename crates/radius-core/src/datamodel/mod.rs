// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persisted data model.
//!
//! Every resource type is a [`Resource<P>`] envelope around a type specific
//! properties struct. The envelope holds the ARM identity, audit data,
//! internal metadata (including the provisioning state) and the deployment
//! facts in [`ResourceMetadata`].
//!
//! ```text
//! Resource<P>
//! ├── TrackedResource      id, name, type, location, tags
//! ├── SystemData           created/modified audit
//! ├── InternalMetadata     api versions, provisioningState
//! ├── properties: P        BasicResourceProperties + type specific fields
//! └── ResourceMetadata     computed values, secret references, recipe data
//! ```

pub mod common;
pub mod dapr;
pub mod datastores;
pub mod environment;
pub mod messaging;
pub mod output;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use common::*;
pub use dapr::{
    DaprComponentSpec, DaprPubSubBroker, DaprPubSubBrokerProperties, DaprSecretStore,
    DaprSecretStoreProperties, DaprStateStore, DaprStateStoreProperties,
};
pub use datastores::{
    MongoDatabase, MongoDatabaseProperties, RedisCache, RedisCacheProperties, SqlDatabase,
    SqlDatabaseProperties,
};
pub use environment::{
    Application, ApplicationProperties, Environment, EnvironmentProperties,
    EnvironmentRecipeProperties,
};
pub use messaging::{Extender, ExtenderProperties, RabbitMqQueue, RabbitMqQueueProperties};
pub use output::*;

use crate::error::{CoreError, Result};
use crate::resources::ResourceId;

/// Fully qualified resource type names.
pub mod resource_types {
    /// Environments.
    pub const ENVIRONMENTS: &str = "Applications.Core/environments";
    /// Applications.
    pub const APPLICATIONS: &str = "Applications.Core/applications";
    /// Extenders.
    pub const EXTENDERS: &str = "Applications.Core/extenders";
    /// Dapr state stores.
    pub const DAPR_STATE_STORES: &str = "Applications.Dapr/stateStores";
    /// Dapr pub/sub brokers.
    pub const DAPR_PUB_SUB_BROKERS: &str = "Applications.Dapr/pubSubBrokers";
    /// Dapr secret stores.
    pub const DAPR_SECRET_STORES: &str = "Applications.Dapr/secretStores";
    /// Mongo databases.
    pub const MONGO_DATABASES: &str = "Applications.Datastores/mongoDatabases";
    /// Redis caches.
    pub const REDIS_CACHES: &str = "Applications.Datastores/redisCaches";
    /// SQL databases.
    pub const SQL_DATABASES: &str = "Applications.Datastores/sqlDatabases";
    /// RabbitMQ queues.
    pub const RABBITMQ_QUEUES: &str = "Applications.Messaging/rabbitMQQueues";

    /// Every type served by the resource provider.
    pub const ALL: [&str; 10] = [
        ENVIRONMENTS,
        APPLICATIONS,
        EXTENDERS,
        DAPR_STATE_STORES,
        DAPR_PUB_SUB_BROKERS,
        DAPR_SECRET_STORES,
        MONGO_DATABASES,
        REDIS_CACHES,
        SQL_DATABASES,
        RABBITMQ_QUEUES,
    ];
}

/// Type specific properties of a resource.
pub trait ResourceProperties:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Fully qualified resource type.
    const RESOURCE_TYPE: &'static str;

    /// Shared properties.
    fn basic(&self) -> &BasicResourceProperties;

    /// Shared properties, mutable.
    fn basic_mut(&mut self) -> &mut BasicResourceProperties;

    /// The recipe to run, when the resource is recipe-provisioned.
    fn recipe(&self) -> Option<ResourceRecipe> {
        None
    }

    /// Secrets supplied with a write request, for types that accept them.
    fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        None
    }

    /// Copy resolved computed values into user-visible properties.
    fn apply_computed_values(&mut self, _computed: &BTreeMap<String, Value>) {}
}

/// Envelope shared by every persisted resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<P> {
    /// ARM identity.
    #[serde(flatten)]
    pub tracked: TrackedResource,
    /// Audit data.
    #[serde(default)]
    pub system_data: SystemData,
    /// API versions and provisioning state.
    #[serde(flatten)]
    pub internal: InternalMetadata,
    /// Type specific properties.
    pub properties: P,
    /// Deployment facts.
    #[serde(default)]
    pub resource_metadata: ResourceMetadata,
}

impl<P: ResourceProperties> Resource<P> {
    /// Create a resource stamped with the identity of `id`.
    pub fn new(id: &ResourceId, properties: P) -> Self {
        Self {
            tracked: TrackedResource {
                id: id.to_string(),
                name: id.name().to_string(),
                resource_type: P::RESOURCE_TYPE.to_string(),
                location: "global".to_string(),
                tags: BTreeMap::new(),
            },
            system_data: SystemData::default(),
            internal: InternalMetadata::default(),
            properties,
            resource_metadata: ResourceMetadata::default(),
        }
    }

    /// Resource ID.
    pub fn id(&self) -> &str {
        &self.tracked.id
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.tracked.name
    }

    /// Current provisioning state.
    pub fn provisioning_state(&self) -> ProvisioningState {
        self.internal.async_provisioning_state
    }

    /// Output resources recorded by the last deployment.
    pub fn output_resources(&self) -> &[OutputResource] {
        &self.properties.basic().status.output_resources
    }

    /// Record the result of a deployment.
    pub fn apply_deployment_output(&mut self, output: DeploymentOutput) {
        self.properties.apply_computed_values(&output.computed_values);
        self.properties.basic_mut().status.output_resources = output.deployed_output_resources;
        self.resource_metadata = ResourceMetadata {
            computed_values: output.computed_values,
            secret_values: output.secret_values,
            recipe_data: output.recipe_data,
        };
    }
}

macro_rules! any_resource {
    ($($variant:ident),* $(,)?) => {
        /// A resource of any type served by the resource provider.
        #[derive(Debug, Clone, PartialEq)]
        pub enum AnyResource {
            $(
                #[doc = concat!("A [`", stringify!($variant), "`].")]
                $variant($variant),
            )*
        }

        $(
            impl From<$variant> for AnyResource {
                fn from(r: $variant) -> Self {
                    Self::$variant(r)
                }
            }
        )*

        impl AnyResource {
            /// Decode a stored document of the given resource type.
            pub fn from_value(resource_type: &str, value: Value) -> Result<Self> {
                $(
                    if resource_type.eq_ignore_ascii_case(
                        <$variant as HasProperties>::Properties::RESOURCE_TYPE,
                    ) {
                        return Ok(Self::$variant(serde_json::from_value(value)?));
                    }
                )*
                Err(CoreError::invalid(format!(
                    "unsupported resource type '{resource_type}'"
                )))
            }
        }
    };
}

macro_rules! with_resource {
    ($value:expr, $r:ident => $body:expr) => {
        match $value {
            AnyResource::Environment($r) => $body,
            AnyResource::Application($r) => $body,
            AnyResource::Extender($r) => $body,
            AnyResource::DaprStateStore($r) => $body,
            AnyResource::DaprPubSubBroker($r) => $body,
            AnyResource::DaprSecretStore($r) => $body,
            AnyResource::MongoDatabase($r) => $body,
            AnyResource::RedisCache($r) => $body,
            AnyResource::SqlDatabase($r) => $body,
            AnyResource::RabbitMqQueue($r) => $body,
        }
    };
}

/// Maps a resource alias back to its properties type.
trait HasProperties {
    type Properties: ResourceProperties;
}

impl<P: ResourceProperties> HasProperties for Resource<P> {
    type Properties = P;
}

any_resource!(
    Environment,
    Application,
    Extender,
    DaprStateStore,
    DaprPubSubBroker,
    DaprSecretStore,
    MongoDatabase,
    RedisCache,
    SqlDatabase,
    RabbitMqQueue,
);

impl AnyResource {
    /// Fully qualified resource type.
    pub fn resource_type(&self) -> &str {
        &self.tracked().resource_type
    }

    /// ARM identity.
    pub fn tracked(&self) -> &TrackedResource {
        with_resource!(self, r => &r.tracked)
    }

    /// ARM identity, mutable.
    pub fn tracked_mut(&mut self) -> &mut TrackedResource {
        with_resource!(self, r => &mut r.tracked)
    }

    /// Resource ID.
    pub fn id(&self) -> &str {
        &self.tracked().id
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.tracked().name
    }

    /// Audit data, mutable.
    pub fn system_data_mut(&mut self) -> &mut SystemData {
        with_resource!(self, r => &mut r.system_data)
    }

    /// Audit data.
    pub fn system_data(&self) -> &SystemData {
        with_resource!(self, r => &r.system_data)
    }

    /// Internal metadata.
    pub fn internal(&self) -> &InternalMetadata {
        with_resource!(self, r => &r.internal)
    }

    /// Internal metadata, mutable.
    pub fn internal_mut(&mut self) -> &mut InternalMetadata {
        with_resource!(self, r => &mut r.internal)
    }

    /// Shared properties.
    pub fn basic(&self) -> &BasicResourceProperties {
        with_resource!(self, r => r.properties.basic())
    }

    /// Shared properties, mutable.
    pub fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        with_resource!(self, r => r.properties.basic_mut())
    }

    /// Deployment facts.
    pub fn resource_metadata(&self) -> &ResourceMetadata {
        with_resource!(self, r => &r.resource_metadata)
    }

    /// Deployment facts, mutable.
    pub fn resource_metadata_mut(&mut self) -> &mut ResourceMetadata {
        with_resource!(self, r => &mut r.resource_metadata)
    }

    /// Current provisioning state.
    pub fn provisioning_state(&self) -> ProvisioningState {
        self.internal().async_provisioning_state
    }

    /// Set the provisioning state.
    pub fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.internal_mut().async_provisioning_state = state;
    }

    /// Output resources recorded by the last deployment.
    pub fn output_resources(&self) -> &[OutputResource] {
        &self.basic().status.output_resources
    }

    /// The recipe to run, when recipe-provisioned.
    pub fn recipe(&self) -> Option<ResourceRecipe> {
        with_resource!(self, r => r.properties.recipe())
    }

    /// Request secrets, for types that accept them.
    pub fn secrets_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        with_resource!(self, r => r.properties.secrets_mut())
    }

    /// Record the result of a deployment.
    pub fn apply_deployment_output(&mut self, output: DeploymentOutput) {
        with_resource!(self, r => r.apply_deployment_output(output))
    }

    /// Encode for storage.
    pub fn to_value(&self) -> Result<Value> {
        Ok(with_resource!(self, r => serde_json::to_value(r)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REDIS_ID: &str =
        "/planes/radius/local/resourceGroups/rg/providers/Applications.Datastores/redisCaches/redis0";

    #[test]
    fn test_new_stamps_identity() {
        let id = ResourceId::parse(REDIS_ID).unwrap();
        let redis = RedisCache::new(&id, RedisCacheProperties::default());
        assert_eq!(redis.id(), REDIS_ID);
        assert_eq!(redis.name(), "redis0");
        assert_eq!(redis.tracked.resource_type, resource_types::REDIS_CACHES);
        assert_eq!(redis.provisioning_state(), ProvisioningState::None);
    }

    #[test]
    fn test_apply_deployment_output() {
        let id = ResourceId::parse(REDIS_ID).unwrap();
        let mut redis = RedisCache::new(&id, RedisCacheProperties::default());
        redis.apply_deployment_output(DeploymentOutput {
            deployed_output_resources: vec![OutputResource::new(
                local_ids::AZURE_REDIS,
                ResourceType::new(kinds::AZURE_REDIS, providers::AZURE),
                json!({}),
            )],
            computed_values: BTreeMap::from([("host".to_string(), json!("myhost"))]),
            secret_values: BTreeMap::from([(
                "password".to_string(),
                SecretValueReference::new(local_ids::AZURE_REDIS, "listKeys", "/primaryKey"),
            )]),
            recipe_data: None,
        });
        assert_eq!(redis.output_resources().len(), 1);
        assert_eq!(redis.properties.host.as_deref(), Some("myhost"));
        assert_eq!(
            redis.resource_metadata.secret_values["password"].action,
            "listKeys"
        );
    }

    #[test]
    fn test_any_resource_from_value() {
        let id = ResourceId::parse(REDIS_ID).unwrap();
        let mut redis = RedisCache::new(&id, RedisCacheProperties::default());
        redis.internal.async_provisioning_state = ProvisioningState::Updating;
        let value = serde_json::to_value(&redis).unwrap();
        assert_eq!(value["provisioningState"], "Updating");
        assert_eq!(value["type"], resource_types::REDIS_CACHES);

        let any = AnyResource::from_value("applications.datastores/rediscaches", value).unwrap();
        assert!(matches!(any, AnyResource::RedisCache(_)));
        assert_eq!(any.provisioning_state(), ProvisioningState::Updating);
        assert_eq!(any.to_value().unwrap()["name"], "redis0");

        let err = AnyResource::from_value("Applications.Core/containers", json!({})).unwrap_err();
        assert!(err.to_string().contains("unsupported resource type"));
    }

    #[test]
    fn test_stored_kubernetes_outputs_read_back() {
        let id = ResourceId::parse(REDIS_ID).unwrap();
        let mut redis = RedisCache::new(&id, RedisCacheProperties::default());
        let identity = ResourceIdentity::Kubernetes(KubernetesIdentity {
            kind: kinds::SECRET.into(),
            api_version: "v1".into(),
            name: "redis0".into(),
            namespace: "default".into(),
        });
        redis.apply_deployment_output(DeploymentOutput {
            deployed_output_resources: vec![
                OutputResource::new(
                    local_ids::SECRET_VALUES,
                    ResourceType::new(kinds::SECRET, providers::KUBERNETES),
                    json!({"data": {"password": "c2VjcmV0"}}),
                )
                .with_identity(identity.clone()),
            ],
            ..DeploymentOutput::default()
        });

        let object = crate::store::Object::from_model(REDIS_ID, &redis).unwrap();
        let any = AnyResource::from_value(resource_types::REDIS_CACHES, object.data).unwrap();
        let outputs = any.output_resources();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].identity.as_ref(), Some(&identity));
        assert_eq!(outputs[0].resource, Value::Null);
    }
}

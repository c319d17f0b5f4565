// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `2023-10-01-preview` wire models.
//!
//! Every resource travels as a [`VersionedResource`] envelope around a
//! type specific properties struct implementing [`VersionedProperties`].
//! Conversion to the data model validates the request; conversion back
//! drops write-only fields such as `secrets`.
//!
//! Portable resources carry the `resourceProvisioning` discriminator. In
//! `manual` mode the connection fields are supplied by the caller and the
//! `recipe` must be absent; in `recipe` mode (the default) it is the other
//! way round. Every violated field is reported in one error.

mod dapr;
mod datastores;
mod environment;
mod messaging;

pub use dapr::{DaprPubSubBrokerProperties, DaprSecretStoreProperties, DaprStateStoreProperties};
pub use datastores::{
    MongoDatabaseProperties, MongoDatabaseSecrets, RedisCacheProperties, RedisCacheSecrets,
    SqlDatabaseProperties, SqlDatabaseSecrets,
};
pub use environment::{
    ApplicationExtension, ApplicationProperties, EnvironmentCompute, EnvironmentProperties,
    EnvironmentRecipe, ProviderAzure, Providers,
};
pub use messaging::{ExtenderProperties, RabbitMqQueueProperties, RabbitMqQueueSecrets};

use std::collections::BTreeMap;

use radius_core::datamodel::{
    self, AnyResource, BasicResourceProperties, ProvisioningState, Resource, ResourceProperties,
    ResourceProvisioning, SystemData, TrackedResource, resource_types,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Error, Result};

/// The API version served by this module.
pub const API_VERSION: &str = "2023-10-01-preview";

/// Type specific wire properties.
pub trait VersionedProperties: Serialize + DeserializeOwned + Send {
    /// Data model properties this version converts to.
    type DataModel: ResourceProperties;

    /// Validate and convert to the data model.
    fn convert_to(self) -> Result<Self::DataModel>;

    /// Build the wire shape of a stored resource.
    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self;
}

/// ARM envelope of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedResource<P> {
    /// Resource ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resource type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Audit data. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
    /// Type specific properties.
    pub properties: P,
}

impl<P: VersionedProperties> VersionedResource<P> {
    /// Validate and convert to the data model.
    ///
    /// Identity fields are copied as sent; the controller overwrites them
    /// from the request route.
    pub fn convert_to(self) -> Result<Resource<P::DataModel>> {
        let properties = self.properties.convert_to()?;
        Ok(Resource {
            tracked: TrackedResource {
                id: self.id.unwrap_or_default(),
                name: self.name.unwrap_or_default(),
                resource_type: P::DataModel::RESOURCE_TYPE.to_string(),
                location: self.location.unwrap_or_else(|| "global".to_string()),
                tags: self.tags,
            },
            system_data: SystemData::default(),
            internal: Default::default(),
            properties,
            resource_metadata: Default::default(),
        })
    }

    /// Build the wire shape of a stored resource.
    pub fn from_datamodel(resource: &Resource<P::DataModel>) -> Self {
        Self {
            id: Some(resource.tracked.id.clone()),
            name: Some(resource.tracked.name.clone()),
            resource_type: Some(resource.tracked.resource_type.clone()),
            location: Some(resource.tracked.location.clone()),
            tags: resource.tracked.tags.clone(),
            system_data: Some(resource.system_data.clone()),
            properties: P::from_datamodel(resource),
        }
    }
}

// ============================================================================
// Shared wire types
// ============================================================================

/// Recipe selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Recipe name, `default` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parameters overriding the environment's.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
}

impl Recipe {
    fn is_populated(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty()) || !self.parameters.is_empty()
    }

    fn convert_to(self) -> datamodel::ResourceRecipe {
        datamodel::ResourceRecipe {
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| datamodel::DEFAULT_RECIPE_NAME.to_string()),
            parameters: self.parameters,
        }
    }

    fn from_datamodel(recipe: &datamodel::ResourceRecipe) -> Self {
        Self {
            name: Some(recipe.name.clone()),
            parameters: recipe.parameters.clone(),
        }
    }
}

/// An output resource as reported in `status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputResourceStatus {
    /// Local ID within the resource.
    #[serde(rename = "localId")]
    pub local_id: String,
    /// Provider-side ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether radius owns the lifecycle of the resource.
    pub radius_managed: bool,
}

/// Compute reported in `status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeStatus {
    /// Always `kubernetes`.
    pub kind: String,
    /// Namespace.
    pub namespace: String,
}

/// Deployment status. Read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Output resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_resources: Vec<OutputResourceStatus>,
    /// Compute, for applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeStatus>,
}

impl ResourceStatus {
    fn from_datamodel(basic: &BasicResourceProperties) -> Option<Self> {
        let status = &basic.status;
        if status.output_resources.is_empty() && status.compute.is_none() {
            return None;
        }
        Some(Self {
            output_resources: status
                .output_resources
                .iter()
                .map(|r| OutputResourceStatus {
                    local_id: r.local_id.clone(),
                    id: r.identity.as_ref().map(|i| i.display_id()),
                    radius_managed: r.radius_managed,
                })
                .collect(),
            compute: status.compute.as_ref().map(|c| ComputeStatus {
                kind: COMPUTE_KIND_KUBERNETES.to_string(),
                namespace: c.namespace.clone(),
            }),
        })
    }
}

pub(crate) const COMPUTE_KIND_KUBERNETES: &str = "kubernetes";

pub(crate) fn provisioning_state_of(state: ProvisioningState) -> Option<ProvisioningState> {
    (state != ProvisioningState::None).then_some(state)
}

pub(crate) fn status_of(basic: &BasicResourceProperties) -> Option<ResourceStatus> {
    ResourceStatus::from_datamodel(basic)
}

pub(crate) fn recipe_of(recipe: &Option<datamodel::ResourceRecipe>) -> Option<Recipe> {
    recipe.as_ref().map(Recipe::from_datamodel)
}

pub(crate) fn basic_properties(application: Option<String>, environment: String) -> BasicResourceProperties {
    BasicResourceProperties {
        application: application.unwrap_or_default(),
        environment,
        status: Default::default(),
    }
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ============================================================================
// Discriminator validation
// ============================================================================

/// Parse `properties.resourceProvisioning`; absent means `recipe`.
pub(crate) fn parse_provisioning(value: Option<&str>) -> Result<ResourceProvisioning> {
    match value {
        None => Ok(ResourceProvisioning::Recipe),
        Some("recipe") => Ok(ResourceProvisioning::Recipe),
        Some("manual") => Ok(ResourceProvisioning::Manual),
        Some(_) => Err(ClientError::bad_request(
            "$.properties.resourceProvisioning must be one of [manual recipe].",
        )
        .into()),
    }
}

/// Collects discriminator violations so that all of them are reported.
#[derive(Debug)]
pub(crate) struct ProvisioningCheck {
    mode: ResourceProvisioning,
    errors: Vec<String>,
}

impl ProvisioningCheck {
    pub(crate) fn new(mode: ResourceProvisioning, recipe: Option<&Recipe>) -> Self {
        let mut check = Self {
            mode,
            errors: Vec::new(),
        };
        if mode == ResourceProvisioning::Manual && recipe.is_some_and(Recipe::is_populated) {
            check.errors.push(
                "recipe details cannot be specified when resourceProvisioning is set to manual"
                    .to_string(),
            );
        }
        check
    }

    /// A manual field that must be set in manual mode.
    pub(crate) fn required(&mut self, field: &str, present: bool) -> &mut Self {
        match self.mode {
            ResourceProvisioning::Manual if !present => self.errors.push(format!(
                "{field} must be specified when resourceProvisioning is set to manual"
            )),
            ResourceProvisioning::Recipe if present => self.forbidden(field),
            _ => {}
        }
        self
    }

    /// A manual field that may be omitted in manual mode.
    pub(crate) fn optional(&mut self, field: &str, present: bool) -> &mut Self {
        if self.mode == ResourceProvisioning::Recipe && present {
            self.forbidden(field);
        }
        self
    }

    fn forbidden(&mut self, field: &str) {
        self.errors.push(format!(
            "{field} cannot be specified when resourceProvisioning is set to recipe (default)"
        ));
    }

    pub(crate) fn finish(&mut self) -> Result<()> {
        validation_result(std::mem::take(&mut self.errors))
    }
}

/// One error verbatim, several joined.
pub(crate) fn validation_result(errors: Vec<String>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(ClientError::bad_request(errors.concat()).into()),
        _ => Err(ClientError::bad_request(format!(
            "multiple errors were found:\n\t{}",
            errors.join("\n\t")
        ))
        .into()),
    }
}

// ============================================================================
// Dispatch by resource type
// ============================================================================

fn decode<P>(body: Value) -> Result<AnyResource>
where
    P: VersionedProperties,
    Resource<P::DataModel>: Into<AnyResource>,
{
    let versioned: VersionedResource<P> = serde_json::from_value(body)
        .map_err(|e| ClientError::invalid_content(format!("invalid request body: {e}")))?;
    Ok(versioned.convert_to()?.into())
}

fn encode<P: VersionedProperties>(resource: &Resource<P::DataModel>) -> Result<Value> {
    Ok(serde_json::to_value(VersionedResource::<P>::from_datamodel(resource))?)
}

fn unsupported(resource_type: &str) -> Error {
    ClientError::not_found(resource_type).into()
}

/// Decode and validate a request body for `resource_type`.
pub fn resource_to_datamodel(resource_type: &str, body: Value) -> Result<AnyResource> {
    let is = |t: &str| t.eq_ignore_ascii_case(resource_type);
    if is(resource_types::ENVIRONMENTS) {
        decode::<EnvironmentProperties>(body)
    } else if is(resource_types::APPLICATIONS) {
        decode::<ApplicationProperties>(body)
    } else if is(resource_types::EXTENDERS) {
        decode::<ExtenderProperties>(body)
    } else if is(resource_types::DAPR_STATE_STORES) {
        decode::<DaprStateStoreProperties>(body)
    } else if is(resource_types::DAPR_PUB_SUB_BROKERS) {
        decode::<DaprPubSubBrokerProperties>(body)
    } else if is(resource_types::DAPR_SECRET_STORES) {
        decode::<DaprSecretStoreProperties>(body)
    } else if is(resource_types::MONGO_DATABASES) {
        decode::<MongoDatabaseProperties>(body)
    } else if is(resource_types::REDIS_CACHES) {
        decode::<RedisCacheProperties>(body)
    } else if is(resource_types::SQL_DATABASES) {
        decode::<SqlDatabaseProperties>(body)
    } else if is(resource_types::RABBITMQ_QUEUES) {
        decode::<RabbitMqQueueProperties>(body)
    } else {
        Err(unsupported(resource_type))
    }
}

/// Wire shape of a stored resource.
pub fn resource_from_datamodel(resource: &AnyResource) -> Result<Value> {
    match resource {
        AnyResource::Environment(r) => encode::<EnvironmentProperties>(r),
        AnyResource::Application(r) => encode::<ApplicationProperties>(r),
        AnyResource::Extender(r) => encode::<ExtenderProperties>(r),
        AnyResource::DaprStateStore(r) => encode::<DaprStateStoreProperties>(r),
        AnyResource::DaprPubSubBroker(r) => encode::<DaprPubSubBrokerProperties>(r),
        AnyResource::DaprSecretStore(r) => encode::<DaprSecretStoreProperties>(r),
        AnyResource::MongoDatabase(r) => encode::<MongoDatabaseProperties>(r),
        AnyResource::RedisCache(r) => encode::<RedisCacheProperties>(r),
        AnyResource::SqlDatabase(r) => encode::<SqlDatabaseProperties>(r),
        AnyResource::RabbitMqQueue(r) => encode::<RabbitMqQueueProperties>(r),
    }
}

/// True when `resource_type` exposes `listSecrets`.
pub fn supports_secrets(resource_type: &str) -> bool {
    [
        resource_types::EXTENDERS,
        resource_types::MONGO_DATABASES,
        resource_types::REDIS_CACHES,
        resource_types::SQL_DATABASES,
        resource_types::RABBITMQ_QUEUES,
    ]
    .iter()
    .any(|t| t.eq_ignore_ascii_case(resource_type))
}

fn typed_secrets<S: Serialize + DeserializeOwned>(secrets: BTreeMap<String, Value>) -> Result<Value> {
    let object: serde_json::Map<String, Value> = secrets.into_iter().collect();
    let typed: S = serde_json::from_value(Value::Object(object))?;
    Ok(serde_json::to_value(typed)?)
}

/// `listSecrets` response for `resource_type`.
pub fn secrets_to_versioned(resource_type: &str, secrets: BTreeMap<String, Value>) -> Result<Value> {
    let is = |t: &str| t.eq_ignore_ascii_case(resource_type);
    if is(resource_types::MONGO_DATABASES) {
        typed_secrets::<MongoDatabaseSecrets>(secrets)
    } else if is(resource_types::REDIS_CACHES) {
        typed_secrets::<RedisCacheSecrets>(secrets)
    } else if is(resource_types::SQL_DATABASES) {
        typed_secrets::<SqlDatabaseSecrets>(secrets)
    } else if is(resource_types::RABBITMQ_QUEUES) {
        typed_secrets::<RabbitMqQueueSecrets>(secrets)
    } else if is(resource_types::EXTENDERS) {
        Ok(serde_json::to_value(secrets)?)
    } else {
        Err(unsupported(resource_type))
    }
}

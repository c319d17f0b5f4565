// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Output resources and the values threaded through deployment.
//!
//! A renderer turns one logical resource into a list of [`OutputResource`]s.
//! The deployment processor hands each one to a provider handler, which fills
//! in the [`ResourceIdentity`] of the object it created. Computed values are
//! resolved once at deploy time and persisted; secret values are persisted
//! only as [`SecretValueReference`]s and resolved on demand.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Provider names used in [`ResourceType::provider`].
pub mod providers {
    /// Azure Resource Manager.
    pub const AZURE: &str = "azure";
    /// Kubernetes API server.
    pub const KUBERNETES: &str = "kubernetes";
    /// AWS Cloud Control.
    pub const AWS: &str = "aws";
}

/// Kinds of output resources rendered by the resource provider.
pub mod kinds {
    /// Dapr `Component` custom resource.
    pub const DAPR_COMPONENT: &str = "DaprComponent";
    /// Dapr state store over an Azure Storage table.
    pub const DAPR_STATE_STORE_AZURE_STORAGE: &str = "DaprStateStoreAzureStorage";
    /// Dapr pub/sub over an Azure Service Bus namespace.
    pub const DAPR_PUB_SUB_AZURE_SERVICE_BUS: &str = "DaprPubSubBrokerAzureServiceBus";
    /// Kubernetes `Secret`.
    pub const SECRET: &str = "Secret";
    /// Azure Cache for Redis.
    pub const AZURE_REDIS: &str = "azure.redis";
    /// Azure Cosmos DB account.
    pub const AZURE_COSMOS_ACCOUNT: &str = "azure.cosmosdb.account";
    /// Azure Cosmos DB Mongo database.
    pub const AZURE_COSMOS_DB_MONGO: &str = "azure.cosmosdb.mongo";
    /// Azure SQL database.
    pub const AZURE_SQL_DATABASE: &str = "azure.sql";
    /// Any ARM resource deployed by a recipe.
    pub const AZURE_RESOURCE: &str = "azure.resource";
}

/// Well-known local IDs.
pub mod local_ids {
    /// The Dapr component of a Dapr resource.
    pub const DAPR_COMPONENT: &str = "DaprComponent";
    /// Dapr state store backed by Azure Storage.
    pub const DAPR_STATE_STORE_AZURE_STORAGE: &str = "DaprStateStoreAzureStorage";
    /// Dapr pub/sub backed by Azure Service Bus.
    pub const DAPR_PUB_SUB_AZURE_SERVICE_BUS: &str = "DaprPubSubBrokerAzureServiceBus";
    /// Kubernetes secret holding user supplied secrets.
    pub const SECRET_VALUES: &str = "SecretValues";
    /// Kubernetes secret holding secrets returned by a recipe.
    pub const RECIPE_SECRETS: &str = "RecipeSecrets";
    /// Azure Redis cache.
    pub const AZURE_REDIS: &str = "AzureRedis";
    /// Azure Cosmos account.
    pub const AZURE_COSMOS_ACCOUNT: &str = "AzureCosmosAccount";
    /// Azure Cosmos Mongo database.
    pub const AZURE_COSMOS_DB_MONGO: &str = "AzureCosmosDBMongo";
    /// Azure SQL database.
    pub const AZURE_SQL_DATABASE: &str = "AzureSqlDatabase";
}

/// Type and provider of an output resource; the key handlers register under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceType {
    /// Kind, see [`kinds`].
    #[serde(rename = "type")]
    pub type_name: String,
    /// Provider, see [`providers`].
    pub provider: String,
}

impl ResourceType {
    /// Create a resource type.
    pub fn new(type_name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            provider: provider.into(),
        }
    }
}

/// ARM identity of a deployed Azure resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmIdentity {
    /// ARM resource ID.
    pub id: String,
    /// API version used to talk to it.
    pub api_version: String,
}

/// Identity of a deployed Kubernetes object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesIdentity {
    /// Object kind, e.g. `Component`.
    pub kind: String,
    /// Object API version, e.g. `dapr.io/v1alpha1`.
    pub api_version: String,
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
}

/// Provider-native identity filled in by handlers.
///
/// Stored as `{"resourceType": "arm" | "kubernetes", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType", content = "data", rename_all = "camelCase")]
pub enum ResourceIdentity {
    /// An Azure resource.
    Arm(ArmIdentity),
    /// A Kubernetes object.
    Kubernetes(KubernetesIdentity),
}

impl ResourceIdentity {
    /// Provider name of this identity.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Arm(_) => providers::AZURE,
            Self::Kubernetes(_) => providers::KUBERNETES,
        }
    }

    /// A printable ID for logs and error messages.
    pub fn display_id(&self) -> String {
        match self {
            Self::Arm(arm) => arm.id.clone(),
            Self::Kubernetes(k) => format!("{}/{}/{}", k.kind, k.namespace, k.name),
        }
    }
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// One concrete provider-side object backing part of a logical resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputResource {
    /// Stable name within the logical resource.
    #[serde(rename = "localId")]
    pub local_id: String,
    /// Kind and provider.
    pub resource_type: ResourceType,
    /// Identity once deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ResourceIdentity>,
    /// False for pre-existing resources radius must never delete.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub radius_managed: bool,
    /// Local IDs that must be deployed first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Provider payload. Can hold secret material, so it is never persisted.
    #[serde(skip)]
    pub resource: Value,
}

impl OutputResource {
    /// Create an output resource with the given payload.
    pub fn new(local_id: impl Into<String>, resource_type: ResourceType, resource: Value) -> Self {
        Self {
            local_id: local_id.into(),
            resource_type,
            identity: None,
            radius_managed: true,
            dependencies: Vec::new(),
            resource,
        }
    }

    /// Mark the resource as not managed by radius.
    pub fn unmanaged(mut self) -> Self {
        self.radius_managed = false;
        self
    }

    /// Set the identity up front (e.g. for existing Azure resources).
    pub fn with_identity(mut self, identity: ResourceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Add a dependency on another local ID.
    pub fn depends_on(mut self, local_id: impl Into<String>) -> Self {
        self.dependencies.push(local_id.into());
        self
    }
}

/// Order output resources so dependencies come before dependents.
///
/// Resources without dependency relations keep their input order.
pub fn order_output_resources(resources: &[OutputResource]) -> Result<Vec<OutputResource>> {
    let by_id: HashMap<&str, usize> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.local_id.as_str(), i))
        .collect();

    for r in resources {
        for dep in &r.dependencies {
            if dep.is_empty() {
                return Err(CoreError::invalid("missing localID for outputresource"));
            }
            if !by_id.contains_key(dep.as_str()) {
                return Err(CoreError::invalid(format!(
                    "output resource {} depends on unknown localID {}",
                    r.local_id, dep
                )));
            }
        }
    }

    let mut ordered = Vec::with_capacity(resources.len());
    let mut placed: HashSet<&str> = HashSet::new();
    while ordered.len() < resources.len() {
        let next = resources.iter().find(|r| {
            !placed.contains(r.local_id.as_str())
                && r.dependencies.iter().all(|d| placed.contains(d.as_str()))
        });
        match next {
            Some(r) => {
                placed.insert(r.local_id.as_str());
                ordered.push(r.clone());
            }
            None => {
                return Err(CoreError::invalid(
                    "circular dependency detected between output resources",
                ));
            }
        }
    }
    Ok(ordered)
}

/// How to obtain a computed value once the output resources are deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComputedValueReference {
    /// A value known at render time.
    Value(Value),
    /// A property returned by the handler that deployed `local_id`.
    #[serde(rename_all = "camelCase")]
    PropertyReference {
        /// Output resource to read from.
        local_id: String,
        /// Property name in the handler's output.
        property: String,
    },
    /// A JSON pointer into the deployed body of `local_id`.
    #[serde(rename_all = "camelCase")]
    JsonPointer {
        /// Output resource to read from.
        local_id: String,
        /// RFC 6901 pointer.
        pointer: String,
    },
}

impl ComputedValueReference {
    /// Static value.
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    /// Handler property reference.
    pub fn property(local_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self::PropertyReference {
            local_id: local_id.into(),
            property: property.into(),
        }
    }

    /// JSON pointer reference.
    pub fn pointer(local_id: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self::JsonPointer {
            local_id: local_id.into(),
            pointer: pointer.into(),
        }
    }
}

/// Where and how to fetch a secret at read time.
///
/// Only the reference is persisted; the secret itself stays with the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretValueReference {
    /// Output resource holding the secret.
    #[serde(rename = "localId")]
    pub local_id: String,
    /// Provider action to invoke, e.g. `listKeys`. Empty reads the object itself.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    /// JSON pointer into the action's response.
    pub value_selector: String,
    /// Optional transformer applied to the fetched value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<ResourceType>,
}

impl SecretValueReference {
    /// Reference a value inside an output resource.
    pub fn new(
        local_id: impl Into<String>,
        action: impl Into<String>,
        value_selector: impl Into<String>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            action: action.into(),
            value_selector: value_selector.into(),
            transformer: None,
        }
    }

    /// Apply a transformer after fetching.
    pub fn with_transformer(mut self, transformer: ResourceType) -> Self {
        self.transformer = Some(transformer);
        self
    }
}

/// The recipe a resource was provisioned with and what it produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeData {
    /// Recipe name.
    pub name: String,
    /// Template language, e.g. `bicep`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_kind: String,
    /// Template the recipe was resolved to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_path: String,
    /// Effective parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    /// IDs of the resources the recipe deployed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

/// Deployment facts persisted alongside a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    /// Resolved computed values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub computed_values: BTreeMap<String, Value>,
    /// Secret references; never the secrets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secret_values: BTreeMap<String, SecretValueReference>,
    /// Recipe bookkeeping for recipe-provisioned resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_data: Option<RecipeData>,
}

/// Result of deploying a rendered resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentOutput {
    /// Output resources with identities filled in.
    pub deployed_output_resources: Vec<OutputResource>,
    /// Resolved computed values.
    pub computed_values: BTreeMap<String, Value>,
    /// Secret references.
    pub secret_values: BTreeMap<String, SecretValueReference>,
    /// Recipe bookkeeping.
    pub recipe_data: Option<RecipeData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(local_id: &str, deps: &[&str]) -> OutputResource {
        let mut r = OutputResource::new(
            local_id,
            ResourceType::new(kinds::AZURE_COSMOS_ACCOUNT, providers::AZURE),
            json!({}),
        );
        r.dependencies = deps.iter().map(|d| d.to_string()).collect();
        r
    }

    #[test]
    fn test_order_output_resources() {
        let input = vec![
            output("db", &["account"]),
            output("role", &["identity", "db"]),
            output("account", &[]),
            output("identity", &[]),
        ];
        let ordered: Vec<String> = order_output_resources(&input)
            .unwrap()
            .into_iter()
            .map(|r| r.local_id)
            .collect();
        assert_eq!(ordered, vec!["account", "db", "identity", "role"]);
    }

    #[test]
    fn test_order_missing_local_id() {
        let input = vec![output("a", &[""])];
        let err = order_output_resources(&input).unwrap_err();
        assert_eq!(err.to_string(), "missing localID for outputresource");
    }

    #[test]
    fn test_order_cycle() {
        let input = vec![output("a", &["b"]), output("b", &["a"])];
        assert!(order_output_resources(&input).is_err());
    }

    #[test]
    fn test_payload_is_not_persisted() {
        let r = OutputResource::new(
            local_ids::SECRET_VALUES,
            ResourceType::new(kinds::SECRET, providers::KUBERNETES),
            json!({"data": {"password": "c2VjcmV0"}}),
        );
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("c2VjcmV0"));
        let back: OutputResource = serde_json::from_str(&json).unwrap();
        assert!(back.radius_managed);
        assert_eq!(back.resource, Value::Null);
    }

    #[test]
    fn test_identity_json_is_tagged() {
        let identity = ResourceIdentity::Arm(ArmIdentity {
            id: "/subscriptions/s/resourceGroups/g/providers/Microsoft.Cache/Redis/c".into(),
            api_version: "2022-06-01".into(),
        });
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["resourceType"], "arm");
        assert_eq!(json["data"]["apiVersion"], "2022-06-01");
        assert_eq!(identity.provider(), providers::AZURE);
    }

    #[test]
    fn test_kubernetes_identity_roundtrips() {
        let identity = ResourceIdentity::Kubernetes(KubernetesIdentity {
            kind: "Secret".into(),
            api_version: "v1".into(),
            name: "db".into(),
            namespace: "default".into(),
        });
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["resourceType"], "kubernetes");
        assert_eq!(json["data"]["kind"], "Secret");

        let back: ResourceIdentity = serde_json::from_value(json).unwrap();
        assert_eq!(back, identity);
        assert_eq!(back.provider(), providers::KUBERNETES);
    }
}

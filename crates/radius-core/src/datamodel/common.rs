// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Building blocks shared by every resource type.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::output::OutputResource;

/// ARM identity of a tracked resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResource {
    /// Fully qualified resource ID.
    pub id: String,
    /// Resource name (last ID segment).
    pub name: String,
    /// Fully qualified resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Location, `global` for most radius resources.
    #[serde(default)]
    pub location: String,
    /// Resource tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Creation and modification audit fields.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl SystemData {
    /// Audit data for a write performed now by `actor`.
    pub fn modified_now(actor: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            created_by: actor.map(str::to_string),
            created_by_type: actor.map(|_| "User".to_string()),
            created_at: Some(now),
            last_modified_by: actor.map(str::to_string),
            last_modified_by_type: actor.map(|_| "User".to_string()),
            last_modified_at: Some(now),
        }
    }

    /// Combine the stored record with the incoming one.
    ///
    /// Creation fields come from `old` when it has them; modification fields
    /// come from `new`.
    pub fn merge(old: &SystemData, new: &SystemData) -> SystemData {
        let keep_old = old.created_at.is_some();
        SystemData {
            created_by: if keep_old { old.created_by.clone() } else { new.created_by.clone() },
            created_by_type: if keep_old {
                old.created_by_type.clone()
            } else {
                new.created_by_type.clone()
            },
            created_at: if keep_old { old.created_at } else { new.created_at },
            last_modified_by: new.last_modified_by.clone(),
            last_modified_by_type: new.last_modified_by_type.clone(),
            last_modified_at: new.last_modified_at,
        }
    }
}

/// Lifecycle status of the last mutation applied to a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// Accepted and queued.
    Accepted,
    /// Being deployed.
    Updating,
    /// Last mutation finished successfully.
    Succeeded,
    /// Last mutation failed.
    Failed,
    /// Last mutation was cancelled or timed out.
    Canceled,
    /// Being deleted.
    Deleting,
    /// Never mutated.
    #[default]
    None,
}

impl ProvisioningState {
    /// True when no operation is in flight and a new mutation may start.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Canceled | Self::None
        )
    }

    /// Wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Updating => "Updating",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Deleting => "Deleting",
            Self::None => "None",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Accepted,
            Self::Updating,
            Self::Succeeded,
            Self::Failed,
            Self::Canceled,
            Self::Deleting,
            Self::None,
        ]
        .into_iter()
        .find(|state| state.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown provisioning state '{s}'"))
    }
}

/// Internal bookkeeping never exposed on the wire as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalMetadata {
    /// API version the resource was created with. Never regresses.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_api_version: String,
    /// API version of the last write.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_api_version: String,
    /// State of the last async mutation.
    #[serde(default, rename = "provisioningState")]
    pub async_provisioning_state: ProvisioningState,
}

/// Compute platform an environment or application deploys to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesCompute {
    /// Target namespace.
    pub namespace: String,
    /// Optional ID of the cluster resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Deployment status shared by all resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Output resources created for this resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_resources: Vec<OutputResource>,
    /// Resolved compute, set for applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<KubernetesCompute>,
}

/// Properties every application-scoped resource carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicResourceProperties {
    /// Owning application ID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application: String,
    /// Owning environment ID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
    /// Deployment status.
    #[serde(default)]
    pub status: ResourceStatus,
}

/// How a portable resource gets its backing infrastructure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceProvisioning {
    /// A recipe registered in the environment provisions it.
    #[default]
    Recipe,
    /// The user supplies connection details.
    Manual,
}

impl ResourceProvisioning {
    /// Wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recipe => "recipe",
            Self::Manual => "manual",
        }
    }
}

/// Default recipe name used when a resource does not name one.
pub const DEFAULT_RECIPE_NAME: &str = "default";

/// Recipe selection on a portable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecipe {
    /// Recipe name registered in the environment.
    pub name: String,
    /// Parameters overriding the environment's defaults.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
}

impl Default for ResourceRecipe {
    fn default() -> Self {
        Self {
            name: DEFAULT_RECIPE_NAME.to_string(),
            parameters: BTreeMap::new(),
        }
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Environments and applications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{BasicResourceProperties, KubernetesCompute};
use super::{Resource, ResourceProperties, resource_types};

/// A recipe registered in an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRecipeProperties {
    /// Template engine, e.g. `bicep` or `terraform`.
    #[serde(default)]
    pub template_kind: String,
    /// Template location.
    pub template_path: String,
    /// Default parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
}

/// Azure provider scope of an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureProvider {
    /// Scope recipes deploy into, e.g. `/subscriptions/s/resourceGroups/g`.
    pub scope: String,
}

/// Cloud providers configured on an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Providers {
    /// Azure configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureProvider>,
}

/// Environment properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProperties {
    /// Unused owner fields and deployment status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Kubernetes compute the environment deploys to.
    pub compute: KubernetesCompute,
    /// Recipes keyed by resource type, then by recipe name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recipes: BTreeMap<String, BTreeMap<String, EnvironmentRecipeProperties>>,
    /// Cloud provider configuration.
    #[serde(default)]
    pub providers: Providers,
}

impl EnvironmentProperties {
    /// Look up a recipe by resource type (case-insensitive) and name.
    pub fn find_recipe(
        &self,
        resource_type: &str,
        name: &str,
    ) -> Option<&EnvironmentRecipeProperties> {
        self.recipes
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(resource_type))
            .and_then(|(_, by_name)| by_name.get(name))
    }
}

impl ResourceProperties for EnvironmentProperties {
    const RESOURCE_TYPE: &'static str = resource_types::ENVIRONMENTS;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }
}

/// Applications.Core/environments
pub type Environment = Resource<EnvironmentProperties>;

/// Application properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationProperties {
    /// Environment and deployment status.
    #[serde(flatten)]
    pub basic: BasicResourceProperties,
    /// Namespace override from the `kubernetesNamespace` extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_namespace: Option<String>,
}

impl ResourceProperties for ApplicationProperties {
    const RESOURCE_TYPE: &'static str = resource_types::APPLICATIONS;

    fn basic(&self) -> &BasicResourceProperties {
        &self.basic
    }

    fn basic_mut(&mut self) -> &mut BasicResourceProperties {
        &mut self.basic
    }

    fn apply_computed_values(&mut self, computed: &BTreeMap<String, Value>) {
        if let Some(namespace) = computed.get("namespace").and_then(Value::as_str) {
            self.basic.status.compute = Some(KubernetesCompute {
                namespace: namespace.to_string(),
                resource_id: None,
            });
        }
    }
}

/// Applications.Core/applications
pub type Application = Resource<ApplicationProperties>;

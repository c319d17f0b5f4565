// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Environments and applications.

use std::collections::BTreeMap;

use radius_core::datamodel::environment::AzureProvider;
use radius_core::datamodel::{
    self, EnvironmentRecipeProperties, KubernetesCompute, ProvisioningState, Resource,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    COMPUTE_KIND_KUBERNETES, ResourceStatus, VersionedProperties, basic_properties,
    provisioning_state_of, status_of, validation_result,
};
use crate::error::Result;

const EXTENSION_KUBERNETES_NAMESPACE: &str = "kubernetesNamespace";

/// Compute an environment deploys to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCompute {
    /// Must be `kubernetes`.
    pub kind: String,
    /// Namespace.
    #[serde(default)]
    pub namespace: String,
    /// Cluster resource ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// A recipe registered in an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRecipe {
    /// Template engine, `bicep` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_kind: Option<String>,
    /// Template location.
    #[serde(default)]
    pub template_path: String,
    /// Default parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
}

/// Azure provider scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderAzure {
    /// Scope, e.g. `/subscriptions/s/resourceGroups/g`.
    pub scope: String,
}

/// Cloud providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Providers {
    /// Azure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<ProviderAzure>,
}

/// `Applications.Core/environments` properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Compute.
    #[serde(default)]
    pub compute: EnvironmentCompute,
    /// Recipes keyed by resource type, then name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recipes: BTreeMap<String, BTreeMap<String, EnvironmentRecipe>>,
    /// Cloud providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Providers>,
}

impl VersionedProperties for EnvironmentProperties {
    type DataModel = datamodel::EnvironmentProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mut errors = Vec::new();
        if !self.compute.kind.eq_ignore_ascii_case(COMPUTE_KIND_KUBERNETES) {
            errors.push(format!(
                "$.properties.compute.kind must be one of [{COMPUTE_KIND_KUBERNETES}]."
            ));
        }
        for (resource_type, by_name) in &self.recipes {
            for (name, recipe) in by_name {
                if recipe.template_path.is_empty() {
                    errors.push(format!(
                        "templatePath must be specified for recipe {name} of {resource_type}"
                    ));
                }
            }
        }
        validation_result(errors)?;

        Ok(datamodel::EnvironmentProperties {
            basic: Default::default(),
            compute: KubernetesCompute {
                namespace: self.compute.namespace,
                resource_id: self.compute.resource_id,
            },
            recipes: self
                .recipes
                .into_iter()
                .map(|(t, by_name)| {
                    let by_name = by_name
                        .into_iter()
                        .map(|(name, r)| {
                            (
                                name,
                                EnvironmentRecipeProperties {
                                    template_kind: r.template_kind.unwrap_or_else(|| "bicep".into()),
                                    template_path: r.template_path,
                                    parameters: r.parameters,
                                },
                            )
                        })
                        .collect();
                    (t, by_name)
                })
                .collect(),
            providers: datamodel::environment::Providers {
                azure: self
                    .providers
                    .and_then(|p| p.azure)
                    .map(|a| AzureProvider { scope: a.scope }),
            },
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            compute: EnvironmentCompute {
                kind: COMPUTE_KIND_KUBERNETES.to_string(),
                namespace: props.compute.namespace.clone(),
                resource_id: props.compute.resource_id.clone(),
            },
            recipes: props
                .recipes
                .iter()
                .map(|(t, by_name)| {
                    let by_name = by_name
                        .iter()
                        .map(|(name, r)| {
                            (
                                name.clone(),
                                EnvironmentRecipe {
                                    template_kind: Some(r.template_kind.clone())
                                        .filter(|k| !k.is_empty()),
                                    template_path: r.template_path.clone(),
                                    parameters: r.parameters.clone(),
                                },
                            )
                        })
                        .collect();
                    (t.clone(), by_name)
                })
                .collect(),
            providers: props.providers.azure.as_ref().map(|a| Providers {
                azure: Some(ProviderAzure {
                    scope: a.scope.clone(),
                }),
            }),
        }
    }
}

/// An application extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationExtension {
    /// Extension kind. Only `kubernetesNamespace` is understood.
    pub kind: String,
    /// Namespace for `kubernetesNamespace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// `Applications.Core/applications` properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationProperties {
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Environment ID.
    #[serde(default)]
    pub environment: String,
    /// Extensions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ApplicationExtension>,
    /// Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl VersionedProperties for ApplicationProperties {
    type DataModel = datamodel::ApplicationProperties;

    fn convert_to(self) -> Result<Self::DataModel> {
        let mut errors = Vec::new();
        if self.environment.is_empty() {
            errors.push("environment must be specified".to_string());
        }
        let mut kubernetes_namespace = None;
        for extension in self.extensions {
            if extension.kind == EXTENSION_KUBERNETES_NAMESPACE {
                match extension.namespace.filter(|n| !n.is_empty()) {
                    Some(namespace) => kubernetes_namespace = Some(namespace),
                    None => errors.push(format!(
                        "namespace must be specified for the {EXTENSION_KUBERNETES_NAMESPACE} extension"
                    )),
                }
            }
        }
        validation_result(errors)?;

        Ok(datamodel::ApplicationProperties {
            basic: basic_properties(None, self.environment),
            kubernetes_namespace,
        })
    }

    fn from_datamodel(resource: &Resource<Self::DataModel>) -> Self {
        let props = &resource.properties;
        Self {
            provisioning_state: provisioning_state_of(resource.provisioning_state()),
            environment: props.basic.environment.clone(),
            extensions: props
                .kubernetes_namespace
                .iter()
                .map(|ns| ApplicationExtension {
                    kind: EXTENSION_KUBERNETES_NAMESPACE.to_string(),
                    namespace: Some(ns.clone()),
                })
                .collect(),
            status: status_of(&props.basic),
        }
    }
}

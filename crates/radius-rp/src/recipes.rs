// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recipe execution.
//!
//! A recipe is an infrastructure template registered in an environment for
//! a resource type. The [`RecipeDriver`] runs the template and reports what
//! it created; the deployment processor turns that into output resources,
//! computed values and secrets.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use radius_core::datamodel::OutputResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Errors returned by recipe drivers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RecipeError {
    /// The template failed to deploy.
    #[error("failed to deploy recipe {name} from {template_path}: {message}")]
    Deployment {
        /// Recipe name.
        name: String,
        /// Template path.
        template_path: String,
        /// Driver message.
        message: String,
    },

    /// The template produced an output the resource provider cannot read.
    #[error("failed to read the recipe output: {0}")]
    InvalidOutput(String),

    /// Tearing down recipe resources failed.
    #[error("failed to delete recipe resources: {0}")]
    Deletion(String),
}

/// Result type using RecipeError
pub type Result<T> = std::result::Result<T, RecipeError>;

/// Deployment facts passed to the template as its `context` parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeContext {
    /// Resource the recipe provisions.
    pub resource_id: String,
    /// Environment the recipe is registered in.
    pub environment_id: String,
    /// Owning application, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Kubernetes namespace of the resource.
    pub namespace: String,
    /// Azure scope from the environment's provider configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_scope: Option<String>,
}

/// A recipe resolved against its environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDefinition {
    /// Recipe name.
    pub name: String,
    /// Template language, e.g. `bicep`.
    pub template_kind: String,
    /// Template location.
    pub template_path: String,
    /// Effective parameters.
    pub parameters: BTreeMap<String, Value>,
}

impl RecipeDefinition {
    /// Combine environment (operator) and resource (developer) parameters.
    /// Developer values win.
    pub fn merge_parameters(
        operator: &BTreeMap<String, Value>,
        developer: &BTreeMap<String, Value>,
    ) -> BTreeMap<String, Value> {
        let mut merged = operator.clone();
        merged.extend(developer.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// What a recipe deployed and returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeOutput {
    /// IDs of deployed resources.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Non-secret values.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Secret values.
    #[serde(default)]
    pub secrets: BTreeMap<String, Value>,
}

impl RecipeOutput {
    /// Read the `result` output of a template and append the resources it
    /// created implicitly.
    pub fn from_template_result(result: Option<&Value>, created: &[String]) -> Result<Self> {
        let mut output = match result {
            Some(value) => serde_json::from_value::<RecipeOutput>(value.clone())
                .map_err(|e| RecipeError::InvalidOutput(e.to_string()))?,
            None => RecipeOutput::default(),
        };
        for id in created {
            if !output.resources.iter().any(|r| r.eq_ignore_ascii_case(id)) {
                output.resources.push(id.clone());
            }
        }
        Ok(output)
    }
}

/// Runs recipe templates.
#[async_trait]
pub trait RecipeDriver: Send + Sync {
    /// Deploy the template.
    async fn execute(
        &self,
        context: &RecipeContext,
        definition: &RecipeDefinition,
    ) -> Result<RecipeOutput>;

    /// Delete resources a recipe created.
    async fn delete(&self, context: &RecipeContext, resources: &[OutputResource]) -> Result<()>;
}

#[derive(Debug, Clone)]
enum TemplateBehavior {
    Output(Value, Vec<String>),
    Fail(String),
}

/// Driver returning preconfigured outputs per template path.
///
/// Unknown templates deploy nothing and return an empty output.
#[derive(Debug, Default)]
pub struct StaticRecipeDriver {
    templates: Mutex<HashMap<String, TemplateBehavior>>,
    executed: Mutex<Vec<RecipeDefinition>>,
    deleted: Mutex<Vec<String>>,
}

impl StaticRecipeDriver {
    /// Create a driver with no templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `result` output of a template and the resources it
    /// creates implicitly.
    pub async fn set_output(&self, template_path: &str, result: Value, created: Vec<String>) {
        self.templates.lock().await.insert(
            template_path.to_string(),
            TemplateBehavior::Output(result, created),
        );
    }

    /// Make a template fail with `message`.
    pub async fn set_failure(&self, template_path: &str, message: &str) {
        self.templates.lock().await.insert(
            template_path.to_string(),
            TemplateBehavior::Fail(message.to_string()),
        );
    }

    /// Definitions executed so far.
    pub async fn executed(&self) -> Vec<RecipeDefinition> {
        self.executed.lock().await.clone()
    }

    /// IDs of resources deleted so far.
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl RecipeDriver for StaticRecipeDriver {
    async fn execute(
        &self,
        context: &RecipeContext,
        definition: &RecipeDefinition,
    ) -> Result<RecipeOutput> {
        info!(
            recipe = %definition.name,
            template = %definition.template_path,
            resource_id = %context.resource_id,
            "deploying recipe"
        );
        self.executed.lock().await.push(definition.clone());

        let behavior = self
            .templates
            .lock()
            .await
            .get(&definition.template_path)
            .cloned();
        match behavior {
            Some(TemplateBehavior::Output(result, created)) => {
                RecipeOutput::from_template_result(result.get("result").or(Some(&result)), &created)
            }
            Some(TemplateBehavior::Fail(message)) => Err(RecipeError::Deployment {
                name: definition.name.clone(),
                template_path: definition.template_path.clone(),
                message,
            }),
            None => Ok(RecipeOutput::default()),
        }
    }

    async fn delete(&self, context: &RecipeContext, resources: &[OutputResource]) -> Result<()> {
        let mut deleted = self.deleted.lock().await;
        for resource in resources {
            let id = resource
                .identity
                .as_ref()
                .map(|i| i.display_id())
                .unwrap_or_else(|| resource.local_id.clone());
            deleted.push(id);
        }
        info!(
            resource_id = %context.resource_id,
            count = resources.len(),
            "deleted recipe resources"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(path: &str) -> RecipeDefinition {
        RecipeDefinition {
            name: "default".to_string(),
            template_kind: "bicep".to_string(),
            template_path: path.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn test_developer_parameters_win() {
        let operator = BTreeMap::from([
            ("size".to_string(), json!("small")),
            ("region".to_string(), json!("westus")),
        ]);
        let developer = BTreeMap::from([("size".to_string(), json!("large"))]);
        let merged = RecipeDefinition::merge_parameters(&operator, &developer);
        assert_eq!(merged["size"], "large");
        assert_eq!(merged["region"], "westus");
    }

    #[test]
    fn test_template_result_rejects_unknown_fields() {
        let err = RecipeOutput::from_template_result(Some(&json!({"bogus": 1})), &[]).unwrap_err();
        assert!(matches!(err, RecipeError::InvalidOutput(_)));
    }

    #[test]
    fn test_template_result_merges_created_resources() {
        let created = vec!["/subscriptions/s/resourceGroups/g/providers/Microsoft.Cache/redis/c".to_string()];
        let output = RecipeOutput::from_template_result(
            Some(&json!({"values": {"host": "c.redis"}, "resources": [created[0].to_uppercase()]})),
            &created,
        )
        .unwrap();
        assert_eq!(output.resources.len(), 1);
        assert_eq!(output.values["host"], "c.redis");
    }

    #[tokio::test]
    async fn test_static_driver() {
        let driver = StaticRecipeDriver::new();
        driver
            .set_output(
                "registry/redis:1.0",
                json!({"result": {"values": {"port": 6379}, "secrets": {"password": "p"}}}),
                vec![],
            )
            .await;
        driver.set_failure("registry/broken:1.0", "quota exceeded").await;
        let ctx = RecipeContext::default();

        let output = driver
            .execute(&ctx, &definition("registry/redis:1.0"))
            .await
            .unwrap();
        assert_eq!(output.values["port"], 6379);
        assert_eq!(output.secrets["password"], "p");

        let err = driver
            .execute(&ctx, &definition("registry/broken:1.0"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to deploy recipe default from registry/broken:1.0: quota exceeded"
        );

        let empty = driver
            .execute(&ctx, &definition("registry/unknown:1.0"))
            .await
            .unwrap();
        assert!(empty.resources.is_empty());
        assert_eq!(driver.executed().await.len(), 3);
    }
}

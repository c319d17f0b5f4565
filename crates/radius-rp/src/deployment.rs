// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment processor.
//!
//! The processor is the bridge between a stored resource and the providers
//! that back it:
//!
//! ```text
//! AnyResource ──render──► RendererOutput ──deploy──► DeploymentOutput
//!                 │                          │
//!        environment/application      recipe driver, handlers,
//!        documents from the store     computed value resolution
//!
//! ResourceData ──delete──► handlers / recipe driver (reverse order)
//! ResourceData ──fetch_secrets──► secret client + transformers
//! ```
//!
//! Every call is a single attempt. Retrying is left to the async worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use radius_core::ResourceId;
use radius_core::datamodel::{
    AnyResource, Application, ArmIdentity, ComputedValueReference, DeploymentOutput, Environment,
    OutputResource, RecipeData, ResourceIdentity, ResourceType, SecretValueReference, kinds,
    local_ids, order_output_resources, providers,
};
use radius_core::store::StorageClient;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::{ClientError, Error, Result};
use crate::model::ApplicationModel;
use crate::recipes::{RecipeContext, RecipeDefinition, RecipeDriver};
use crate::renderers::{RenderOptions, RendererOutput, secret_object_name};

/// Local ID prefix of resources deployed by a recipe.
const RECIPE_RESOURCE_PREFIX: &str = "RecipeResource";

/// A stored resource reduced to what delete and secret fetching need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    /// Resource ID.
    pub id: String,
    /// Fully qualified resource type.
    pub resource_type: String,
    /// Output resources recorded by the last deployment.
    pub output_resources: Vec<OutputResource>,
    /// Resolved computed values.
    pub computed_values: BTreeMap<String, Value>,
    /// Secret references.
    pub secret_values: BTreeMap<String, SecretValueReference>,
    /// Recipe bookkeeping.
    pub recipe_data: Option<RecipeData>,
    /// Environment ID.
    pub environment_id: String,
    /// Application ID, empty when the resource has none.
    pub application_id: String,
}

impl ResourceData {
    /// Collect the deployment facts of a resource.
    pub fn from_resource(resource: &AnyResource) -> Self {
        let metadata = resource.resource_metadata();
        let basic = resource.basic();
        Self {
            id: resource.id().to_string(),
            resource_type: resource.resource_type().to_string(),
            output_resources: resource.output_resources().to_vec(),
            computed_values: metadata.computed_values.clone(),
            secret_values: metadata.secret_values.clone(),
            recipe_data: metadata.recipe_data.clone(),
            environment_id: basic.environment.clone(),
            application_id: basic.application.clone(),
        }
    }
}

/// Renders, deploys and tears down resources.
#[async_trait]
pub trait DeploymentProcessor: Send + Sync {
    /// Render a resource against its environment and application.
    async fn render(&self, id: &ResourceId, resource: &AnyResource) -> Result<RendererOutput>;

    /// Deploy a rendered resource.
    async fn deploy(&self, id: &ResourceId, rendered: RendererOutput) -> Result<DeploymentOutput>;

    /// Delete the output resources of a resource.
    async fn delete(&self, resource: &ResourceData) -> Result<()>;

    /// Resolve the secret values of a resource. Never cached.
    async fn fetch_secrets(&self, resource: &ResourceData) -> Result<BTreeMap<String, Value>>;
}

/// The default [`DeploymentProcessor`].
pub struct Processor {
    model: Arc<ApplicationModel>,
    storage: Arc<dyn StorageClient>,
    recipes: Arc<dyn RecipeDriver>,
}

impl Processor {
    /// Create a processor.
    pub fn new(
        model: Arc<ApplicationModel>,
        storage: Arc<dyn StorageClient>,
        recipes: Arc<dyn RecipeDriver>,
    ) -> Self {
        Self {
            model,
            storage,
            recipes,
        }
    }

    /// Read a scope resource (environment or application) the resource refers to.
    async fn fetch_scope_resource<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        ResourceId::parse(id)
            .map_err(|_| ClientError::bad_request(format!("{id} is not a valid resource id")))?;
        match self.storage.get(id).await {
            Ok(object) => Ok(object.as_model()?),
            Err(e) if e.is_not_found() => {
                Err(ClientError::bad_request(format!("{id} does not exist")).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a resource's recipe against its environment.
    fn resolve_recipe(
        &self,
        resource_type: &str,
        environment_id: &str,
        environment: &Environment,
        recipe: &mut RecipeData,
    ) -> Result<()> {
        let registered = environment
            .properties
            .find_recipe(resource_type, &recipe.name)
            .ok_or_else(|| {
                ClientError::bad_request(format!(
                    "recipe with name \"{}\" does not exist in the environment {}",
                    recipe.name, environment_id
                ))
            })?;
        recipe.template_kind = registered.template_kind.clone();
        recipe.template_path = registered.template_path.clone();
        recipe.parameters =
            RecipeDefinition::merge_parameters(&registered.parameters, &recipe.parameters);
        Ok(())
    }

    async fn deploy_recipe(
        &self,
        id: &ResourceId,
        rendered: &RendererOutput,
        recipe: &mut RecipeData,
    ) -> Result<(Vec<OutputResource>, BTreeMap<String, Value>, BTreeMap<String, Value>)> {
        let context = rendered.recipe_context.clone().unwrap_or_else(|| RecipeContext {
            resource_id: id.to_string(),
            environment_id: rendered.environment_id.clone(),
            ..Default::default()
        });
        let definition = RecipeDefinition {
            name: recipe.name.clone(),
            template_kind: recipe.template_kind.clone(),
            template_path: recipe.template_path.clone(),
            parameters: recipe.parameters.clone(),
        };
        let output = self.recipes.execute(&context, &definition).await?;
        info!(
            resource_id = %id,
            recipe = %recipe.name,
            resources = output.resources.len(),
            "recipe deployed"
        );

        let mut resources = Vec::with_capacity(output.resources.len() + 1);
        for (i, deployed) in output.resources.iter().enumerate() {
            ResourceId::parse(deployed).map_err(|e| {
                ClientError::bad_request(format!(
                    "failed to parse id {deployed} of the resource deployed by recipe {} for resource {id}: {e}",
                    recipe.name
                ))
            })?;
            resources.push(
                OutputResource::new(
                    format!("{RECIPE_RESOURCE_PREFIX}{i}"),
                    ResourceType::new(kinds::AZURE_RESOURCE, providers::AZURE),
                    Value::Null,
                )
                .with_identity(ResourceIdentity::Arm(ArmIdentity {
                    id: deployed.clone(),
                    api_version: String::new(),
                })),
            );
        }
        recipe.resources = output.resources.clone();

        if !output.secrets.is_empty() {
            let data: BTreeMap<&str, String> = output
                .secrets
                .iter()
                .map(|(k, v)| {
                    let plain = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.as_str(), STANDARD.encode(plain))
                })
                .collect();
            resources.push(OutputResource::new(
                local_ids::RECIPE_SECRETS,
                ResourceType::new(kinds::SECRET, providers::KUBERNETES),
                json!({
                    "apiVersion": "v1",
                    "kind": "Secret",
                    "type": "Opaque",
                    "metadata": {
                        "name": format!(
                            "{}-recipe-secrets",
                            secret_object_name(&id.resource_type(), id.name())
                        ),
                        "namespace": context.namespace,
                    },
                    "data": data,
                }),
            ));
        }
        Ok((resources, output.values, output.secrets))
    }

    /// Resolve the computed values that reference one deployed output resource.
    fn resolve_computed_values(
        resource: &OutputResource,
        properties: &BTreeMap<String, String>,
        references: &BTreeMap<String, ComputedValueReference>,
        computed: &mut BTreeMap<String, Value>,
    ) -> Result<()> {
        for (key, reference) in references {
            match reference {
                ComputedValueReference::PropertyReference { local_id, property }
                    if *local_id == resource.local_id =>
                {
                    if let Some(value) = properties.get(property) {
                        computed.insert(key.clone(), Value::String(value.clone()));
                    }
                }
                ComputedValueReference::JsonPointer { local_id, pointer }
                    if *local_id == resource.local_id =>
                {
                    let value = resource.resource.pointer(pointer).ok_or_else(|| {
                        Error::Other(format!(
                            "failed to process JSON Pointer {pointer} for resource: no value found at {pointer} in {}",
                            resource.local_id
                        ))
                    })?;
                    computed.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn fetch_secret(
        &self,
        resource: &ResourceData,
        name: &str,
        reference: &SecretValueReference,
    ) -> Result<Value> {
        let identity = resource
            .output_resources
            .iter()
            .find(|r| r.local_id == reference.local_id)
            .and_then(|r| r.identity.as_ref())
            .ok_or_else(|| {
                Error::Other(format!(
                    "cannot find an output resource matching LocalID for secret reference {name}"
                ))
            })?;
        self.model
            .secret_client()
            .fetch_secret(identity, &reference.action, &reference.value_selector)
            .await
            .map_err(|e| {
                Error::Other(format!(
                    "failed to fetch secret {name} for resource {}: {e}",
                    resource.id
                ))
            })
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeploymentProcessor for Processor {
    #[instrument(skip(self, resource), fields(resource_id = %id))]
    async fn render(&self, id: &ResourceId, resource: &AnyResource) -> Result<RendererOutput> {
        let resource_type = resource.resource_type();
        let renderer = self.model.lookup_renderer(resource_type).ok_or_else(|| {
            ClientError::bad_request(format!("rendering is not supported for {resource_type}"))
        })?;
        info!(resource_id = %id, resource_type, "rendering resource");

        let basic = resource.basic();
        let (environment_id, environment) = match resource {
            AnyResource::Environment(env) => (id.to_string(), env.clone()),
            _ => {
                let mut environment_id = basic.environment.clone();
                if environment_id.is_empty() && !basic.application.is_empty() {
                    let app: Application = self.fetch_scope_resource(&basic.application).await?;
                    environment_id = app.properties.basic.environment;
                }
                if environment_id.is_empty() {
                    return Err(ClientError::bad_request("environment must be specified").into());
                }
                let env: Environment = self.fetch_scope_resource(&environment_id).await?;
                (environment_id, env)
            }
        };

        let mut namespace = environment.properties.compute.namespace.clone();
        if namespace.is_empty() && !matches!(resource, AnyResource::Environment(_)) {
            return Err(Error::Other(
                "cannot find namespace in the environment resource".to_string(),
            ));
        }

        let mut application = None;
        if !basic.application.is_empty() && !matches!(resource, AnyResource::Application(_)) {
            let app: Application = self.fetch_scope_resource(&basic.application).await?;
            if let Some(compute) = &app.properties.basic.status.compute
                && !compute.namespace.is_empty()
            {
                namespace = compute.namespace.clone();
            }
            application = Some(app.name().to_string());
        }

        let options = RenderOptions {
            namespace: namespace.clone(),
            environment_id: environment_id.clone(),
            application,
        };
        let mut output = renderer.render(resource, &options)?;

        for output_resource in &output.resources {
            let provider = &output_resource.resource_type.provider;
            if provider.is_empty() {
                return Err(Error::Other(format!(
                    "output resource {} does not have a provider specified",
                    output_resource.local_id
                )));
            }
            if !self.model.is_provider_supported(provider) {
                return Err(ClientError::bad_request(format!(
                    "provider {provider} is not configured. Cannot support resource type {}",
                    output_resource.resource_type.type_name
                ))
                .into());
            }
        }

        if let Some(recipe) = output.recipe_data.as_mut() {
            self.resolve_recipe(resource_type, &environment_id, &environment, recipe)?;
            output.recipe_context = Some(RecipeContext {
                resource_id: id.to_string(),
                environment_id: environment_id.clone(),
                application_id: Some(basic.application.clone()).filter(|a| !a.is_empty()),
                namespace,
                azure_scope: environment
                    .properties
                    .providers
                    .azure
                    .as_ref()
                    .map(|azure| azure.scope.clone()),
            });
        }
        output.environment_id = environment_id;
        Ok(output)
    }

    #[instrument(skip(self, rendered), fields(resource_id = %id))]
    async fn deploy(&self, id: &ResourceId, rendered: RendererOutput) -> Result<DeploymentOutput> {
        info!(resource_id = %id, "deploying resource");

        let mut recipe_data = rendered.recipe_data.clone();
        let mut resources = rendered.resources.clone();
        let mut recipe_values = BTreeMap::new();
        let mut recipe_secrets = BTreeMap::new();
        let mut recipe_resources = Vec::new();
        if let Some(recipe) = recipe_data.as_mut() {
            let (deployed, values, secrets) = self.deploy_recipe(id, &rendered, recipe).await?;
            recipe_resources = deployed;
            recipe_values = values;
            recipe_secrets = secrets;
        }
        resources.extend(recipe_resources);

        let mut ordered = order_output_resources(&resources)?;
        let mut computed = BTreeMap::new();
        for resource in ordered.iter_mut() {
            if resource.resource_type.type_name == kinds::AZURE_RESOURCE
                && resource.local_id.starts_with(RECIPE_RESOURCE_PREFIX)
            {
                // Already deployed by the recipe.
                continue;
            }
            let handler = self
                .model
                .lookup_handler(&resource.resource_type)
                .ok_or_else(|| {
                    Error::Other(format!(
                        "failed to deploy output resource {}: no handler for {}/{}",
                        resource.local_id,
                        resource.resource_type.provider,
                        resource.resource_type.type_name
                    ))
                })?;
            debug!(local_id = %resource.local_id, "deploying output resource");
            let properties = handler.put(resource).await.map_err(|e| {
                Error::Other(format!(
                    "failed to deploy output resource {}: {e}",
                    resource.local_id
                ))
            })?;
            if resource.identity.is_none() {
                return Err(Error::Other(format!(
                    "output resource {} does not have an identity",
                    resource.local_id
                )));
            }
            Self::resolve_computed_values(
                resource,
                &properties,
                &rendered.computed_values,
                &mut computed,
            )?;
        }

        for (key, reference) in &rendered.computed_values {
            if let ComputedValueReference::Value(value) = reference
                && !value.is_null()
            {
                computed.insert(key.clone(), value.clone());
            }
        }
        computed.extend(recipe_values.into_iter().filter(|(_, v)| !v.is_null()));

        let mut secret_values = BTreeMap::new();
        for (key, reference) in &rendered.secret_values {
            if recipe_data.is_some() && !ordered.iter().any(|r| r.local_id == reference.local_id) {
                continue;
            }
            secret_values.insert(key.clone(), reference.clone());
        }
        for key in recipe_secrets.keys() {
            secret_values.insert(
                key.clone(),
                SecretValueReference::new(local_ids::RECIPE_SECRETS, "", format!("/data/{key}")),
            );
        }

        Ok(DeploymentOutput {
            deployed_output_resources: ordered,
            computed_values: computed,
            secret_values,
            recipe_data,
        })
    }

    #[instrument(skip(self, resource), fields(resource_id = %resource.id))]
    async fn delete(&self, resource: &ResourceData) -> Result<()> {
        let ordered = order_output_resources(&resource.output_resources)?;
        let (recipe_resources, resources): (Vec<_>, Vec<_>) = ordered
            .into_iter()
            .filter(|r| r.radius_managed)
            .partition(|r| {
                r.resource_type.type_name == kinds::AZURE_RESOURCE
                    && r.local_id.starts_with(RECIPE_RESOURCE_PREFIX)
            });

        if !recipe_resources.is_empty() {
            let context = RecipeContext {
                resource_id: resource.id.clone(),
                environment_id: resource.environment_id.clone(),
                application_id: Some(resource.application_id.clone()).filter(|a| !a.is_empty()),
                ..Default::default()
            };
            self.recipes.delete(&context, &recipe_resources).await?;
        }

        for output_resource in resources.iter().rev() {
            let handler = self
                .model
                .lookup_handler(&output_resource.resource_type)
                .ok_or_else(|| {
                    Error::Other(format!(
                        "failed to delete output resource {}: no handler for {}/{}",
                        output_resource.local_id,
                        output_resource.resource_type.provider,
                        output_resource.resource_type.type_name
                    ))
                })?;
            debug!(
                resource_id = %resource.id,
                local_id = %output_resource.local_id,
                "deleting output resource"
            );
            match handler.delete(output_resource).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(
                        resource_id = %resource.id,
                        local_id = %output_resource.local_id,
                        error = %e,
                        "failed to delete output resource"
                    );
                    return Err(Error::Other(format!(
                        "failed to delete output resource {}: {e}",
                        output_resource.local_id
                    )));
                }
            }
        }
        Ok(())
    }

    async fn fetch_secrets(&self, resource: &ResourceData) -> Result<BTreeMap<String, Value>> {
        let mut secrets = BTreeMap::new();
        for (name, reference) in &resource.secret_values {
            let mut secret = self.fetch_secret(resource, name, reference).await?;
            if let Some(transformer_type) = &reference.transformer {
                let transformer =
                    self.model
                        .lookup_transformer(transformer_type)
                        .ok_or_else(|| {
                            Error::Other(format!(
                                "could not find a secret transformer for {}/{}",
                                transformer_type.provider, transformer_type.type_name
                            ))
                        })?;
                secret = transformer
                    .transform(&resource.computed_values, secret)
                    .map_err(|e| {
                        Error::Other(format!(
                            "failed to transform secret {name} for resource {}: {e}",
                            resource.id
                        ))
                    })?;
            }
            secrets.insert(name.clone(), secret);
        }
        Ok(secrets)
    }
}

/// Render and deploy `resource`, record the result on it and tear down the
/// output resources of the previous deployment that are no longer produced.
///
/// `resource` must still carry the status and metadata of the previous
/// deployment, if any.
pub async fn reconcile(processor: &dyn DeploymentProcessor, resource: &mut AnyResource) -> Result<()> {
    let id = ResourceId::parse(resource.id())?;
    let rendered = processor.render(&id, resource).await?;
    let output = processor.deploy(&id, rendered).await?;

    let mut stale = ResourceData::from_resource(resource);
    stale.output_resources.retain(|old| {
        old.identity.as_ref().is_some_and(|identity| {
            !output
                .deployed_output_resources
                .iter()
                .any(|new| new.identity.as_ref() == Some(identity))
        })
    });
    resource.apply_deployment_output(output);

    if !stale.output_resources.is_empty() {
        info!(
            resource_id = %id,
            count = stale.output_resources.len(),
            "deleting output resources of the previous deployment"
        );
        processor.delete(&stale).await?;
    }
    Ok(())
}

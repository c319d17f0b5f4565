// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The application model: which renderer, handler and transformer serves
//! which resource type.
//!
//! The model is built once at startup and passed to the deployment
//! processor. Provider support follows the clients it is built with: without
//! an ARM client no Azure handler is registered and rendering a resource
//! that needs one fails.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use radius_core::datamodel::{ResourceType, kinds, providers, resource_types};

use crate::handlers::{
    ArmClient, ArmResourceHandler, AzureRedisTransformer, DaprAzureServiceBusHandler,
    DaprAzureStorageHandler, KubernetesClient, KubernetesHandler, ProviderSecretClient,
    ResourceHandler, SecretValueClient, SecretValueTransformer,
};
use crate::renderers::{
    ApplicationRenderer, DaprPubSubBrokerRenderer, DaprSecretStoreRenderer,
    DaprStateStoreRenderer, EnvironmentRenderer, ExtenderRenderer, MongoDatabaseRenderer,
    RabbitMqQueueRenderer, RedisCacheRenderer, Renderer, SqlDatabaseRenderer,
};

/// Registry of renderers, handlers and secret plumbing.
pub struct ApplicationModel {
    renderers: HashMap<String, Arc<dyn Renderer>>,
    handlers: HashMap<ResourceType, Arc<dyn ResourceHandler>>,
    transformers: HashMap<ResourceType, Arc<dyn SecretValueTransformer>>,
    secret_client: Arc<dyn SecretValueClient>,
    supported_providers: HashSet<String>,
}

impl ApplicationModel {
    /// Build the default model over the given provider clients.
    pub fn new(kubernetes: Arc<dyn KubernetesClient>, arm: Option<Arc<dyn ArmClient>>) -> Self {
        let mut model = Self {
            renderers: HashMap::new(),
            handlers: HashMap::new(),
            transformers: HashMap::new(),
            secret_client: Arc::new(ProviderSecretClient::new(kubernetes.clone(), arm.clone())),
            supported_providers: HashSet::from([providers::KUBERNETES.to_string()]),
        };

        model.register_renderer(resource_types::ENVIRONMENTS, Arc::new(EnvironmentRenderer));
        model.register_renderer(resource_types::APPLICATIONS, Arc::new(ApplicationRenderer));
        model.register_renderer(resource_types::EXTENDERS, Arc::new(ExtenderRenderer));
        model.register_renderer(
            resource_types::DAPR_STATE_STORES,
            Arc::new(DaprStateStoreRenderer::default()),
        );
        model.register_renderer(
            resource_types::DAPR_PUB_SUB_BROKERS,
            Arc::new(DaprPubSubBrokerRenderer::default()),
        );
        model.register_renderer(
            resource_types::DAPR_SECRET_STORES,
            Arc::new(DaprSecretStoreRenderer::default()),
        );
        model.register_renderer(resource_types::MONGO_DATABASES, Arc::new(MongoDatabaseRenderer));
        model.register_renderer(resource_types::REDIS_CACHES, Arc::new(RedisCacheRenderer));
        model.register_renderer(resource_types::SQL_DATABASES, Arc::new(SqlDatabaseRenderer));
        model.register_renderer(resource_types::RABBITMQ_QUEUES, Arc::new(RabbitMqQueueRenderer));

        let kubernetes_handler: Arc<dyn ResourceHandler> =
            Arc::new(KubernetesHandler::new(kubernetes.clone()));
        for kind in [kinds::DAPR_COMPONENT, kinds::SECRET] {
            model.register_handler(
                ResourceType::new(kind, providers::KUBERNETES),
                kubernetes_handler.clone(),
            );
        }

        if let Some(arm) = arm {
            model.supported_providers.insert(providers::AZURE.to_string());
            model.register_handler(
                ResourceType::new(kinds::DAPR_STATE_STORE_AZURE_STORAGE, providers::AZURE),
                Arc::new(DaprAzureStorageHandler::new(arm.clone(), kubernetes.clone())),
            );
            model.register_handler(
                ResourceType::new(kinds::DAPR_PUB_SUB_AZURE_SERVICE_BUS, providers::AZURE),
                Arc::new(DaprAzureServiceBusHandler::new(arm.clone(), kubernetes)),
            );
            let arm_handler: Arc<dyn ResourceHandler> = Arc::new(ArmResourceHandler::new(arm));
            for kind in [
                kinds::AZURE_REDIS,
                kinds::AZURE_COSMOS_ACCOUNT,
                kinds::AZURE_COSMOS_DB_MONGO,
                kinds::AZURE_SQL_DATABASE,
                kinds::AZURE_RESOURCE,
            ] {
                model.register_handler(
                    ResourceType::new(kind, providers::AZURE),
                    arm_handler.clone(),
                );
            }
            model.register_transformer(
                ResourceType::new(kinds::AZURE_REDIS, providers::AZURE),
                Arc::new(AzureRedisTransformer),
            );
        }

        model
    }

    /// Register or replace the renderer of a resource type.
    pub fn register_renderer(&mut self, resource_type: &str, renderer: Arc<dyn Renderer>) {
        self.renderers
            .insert(resource_type.to_ascii_lowercase(), renderer);
    }

    /// Register or replace the handler of an output resource type.
    pub fn register_handler(&mut self, resource_type: ResourceType, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(resource_type, handler);
    }

    /// Register or replace a secret transformer.
    pub fn register_transformer(
        &mut self,
        resource_type: ResourceType,
        transformer: Arc<dyn SecretValueTransformer>,
    ) {
        self.transformers.insert(resource_type, transformer);
    }

    /// Replace the secret client.
    pub fn with_secret_client(mut self, client: Arc<dyn SecretValueClient>) -> Self {
        self.secret_client = client;
        self
    }

    /// Renderer for a resource type (case-insensitive).
    pub fn lookup_renderer(&self, resource_type: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers
            .get(&resource_type.to_ascii_lowercase())
            .cloned()
    }

    /// Handler for an output resource type.
    pub fn lookup_handler(&self, resource_type: &ResourceType) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.get(resource_type).cloned()
    }

    /// Transformer for a secret reference.
    pub fn lookup_transformer(
        &self,
        resource_type: &ResourceType,
    ) -> Option<Arc<dyn SecretValueTransformer>> {
        self.transformers.get(resource_type).cloned()
    }

    /// The secret client.
    pub fn secret_client(&self) -> Arc<dyn SecretValueClient> {
        self.secret_client.clone()
    }

    /// True when output resources of `provider` can be deployed.
    pub fn is_provider_supported(&self, provider: &str) -> bool {
        self.supported_providers
            .contains(&provider.to_ascii_lowercase())
    }
}

impl std::fmt::Debug for ApplicationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut renderers: Vec<&String> = self.renderers.keys().collect();
        renderers.sort();
        f.debug_struct("ApplicationModel")
            .field("renderers", &renderers)
            .field("handlers", &self.handlers.len())
            .field("supported_providers", &self.supported_providers)
            .finish()
    }
}

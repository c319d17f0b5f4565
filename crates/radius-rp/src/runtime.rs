// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for the resource provider.
//!
//! [`RpRuntime`] wires the store, deployment processor, controllers, async
//! worker and HTTP server together so the provider can run inside an
//! existing tokio application.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use radius_core::store::MemoryStorageClient;
//! use radius_rp::handlers::InMemoryKubernetes;
//! use radius_rp::model::ApplicationModel;
//! use radius_rp::runtime::RpRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let model = ApplicationModel::new(Arc::new(InMemoryKubernetes::new()), None);
//!
//!     let runtime = RpRuntime::builder()
//!         .storage(Arc::new(MemoryStorageClient::new()))
//!         .model(Arc::new(model))
//!         .bind_addr("127.0.0.1:8080".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::Router;
use radius_core::store::StorageClient;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::asyncop::{
    AsyncWorker, AsyncWorkerConfig, ControllerRegistry, InMemoryQueue, Queue, StatusManager,
};
use crate::config::Config;
use crate::deployment::{DeploymentProcessor, Processor};
use crate::frontend::{ASYNC_RESOURCE_TYPES, OperationController, ResourceController};
use crate::model::ApplicationModel;
use crate::recipes::{RecipeDriver, StaticRecipeDriver};
use crate::server::{self, AppState};

/// Builder for an [`RpRuntime`].
#[derive(Default)]
pub struct RpRuntimeBuilder {
    config: Config,
    storage: Option<Arc<dyn StorageClient>>,
    model: Option<Arc<ApplicationModel>>,
    recipes: Option<Arc<dyn RecipeDriver>>,
    queue: Option<Arc<dyn Queue>>,
    processor: Option<Arc<dyn DeploymentProcessor>>,
}

impl RpRuntimeBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for addresses, limits and timeouts.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the HTTP bind address.
    ///
    /// Default: `0.0.0.0:8080`
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.http_addr = addr;
        self
    }

    /// Set the document store (required).
    pub fn storage(mut self, storage: Arc<dyn StorageClient>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the renderer and handler registry (required unless a processor is given).
    pub fn model(mut self, model: Arc<ApplicationModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the recipe driver.
    ///
    /// Default: [`StaticRecipeDriver`] with no templates.
    pub fn recipes(mut self, recipes: Arc<dyn RecipeDriver>) -> Self {
        self.recipes = Some(recipes);
        self
    }

    /// Set the async operation queue. Its lease must outlast the operation timeout.
    ///
    /// Default: [`InMemoryQueue`] leased for [`Config::message_lock`]
    pub fn queue(mut self, queue: Arc<dyn Queue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Replace the deployment processor built from the model.
    pub fn processor(mut self, processor: Arc<dyn DeploymentProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Build the runtime configuration.
    ///
    /// Fails when the store, or both the model and the processor, are missing.
    pub fn build(self) -> Result<RpRuntimeConfig> {
        let storage = self.storage.ok_or_else(|| anyhow!("storage is required"))?;
        let processor: Arc<dyn DeploymentProcessor> = match (self.processor, self.model) {
            (Some(processor), _) => processor,
            (None, Some(model)) => {
                let recipes: Arc<dyn RecipeDriver> = match self.recipes {
                    Some(recipes) => recipes,
                    None => Arc::new(StaticRecipeDriver::new()),
                };
                Arc::new(Processor::new(model, storage.clone(), recipes))
            }
            (None, None) => return Err(anyhow!("model or processor is required")),
        };
        let queue: Arc<dyn Queue> = match self.queue {
            Some(queue) => queue,
            None => Arc::new(InMemoryQueue::with_message_lock(self.config.message_lock())),
        };

        Ok(RpRuntimeConfig {
            config: self.config,
            storage,
            processor,
            queue,
        })
    }
}

/// Configuration for an [`RpRuntime`].
pub struct RpRuntimeConfig {
    config: Config,
    storage: Arc<dyn StorageClient>,
    processor: Arc<dyn DeploymentProcessor>,
    queue: Arc<dyn Queue>,
}

impl RpRuntimeConfig {
    /// Handler state without starting anything.
    pub fn app_state(&self) -> AppState {
        let status = self.status_manager();
        self.app_state_with(status)
    }

    fn status_manager(&self) -> Arc<StatusManager> {
        Arc::new(StatusManager::new(
            self.storage.clone(),
            self.queue.clone(),
            self.config.location.clone(),
        ))
    }

    fn app_state_with(&self, status: Arc<StatusManager>) -> AppState {
        AppState {
            resources: Arc::new(ResourceController::new(
                self.storage.clone(),
                self.processor.clone(),
                status.clone(),
                self.config.async_operation_timeout,
                self.config.default_page_size,
            )),
            operations: Arc::new(OperationController::new(status)),
            storage: self.storage.clone(),
        }
    }

    /// Bind the HTTP listener and spawn the server and the async worker.
    pub async fn start(self) -> Result<RpRuntime> {
        let status = self.status_manager();
        let state = self.app_state_with(status.clone());

        let registry = Arc::new(ControllerRegistry::with_resource_types(
            &ASYNC_RESOURCE_TYPES,
            self.storage.clone(),
            self.processor.clone(),
        ));
        let worker = AsyncWorker::new(
            self.queue.clone(),
            status,
            self.storage.clone(),
            registry,
            AsyncWorkerConfig {
                max_operation_concurrency: self.config.max_operation_concurrency,
                max_operation_retry_count: self.config.max_operation_retry_count,
                dequeue_interval: self.config.dequeue_interval,
            },
        );
        let worker_shutdown = worker.shutdown_handle();
        let worker_handle = tokio::spawn(worker.run());

        let listener = TcpListener::bind(self.config.http_addr).await?;
        let bind_addr = listener.local_addr()?;
        let server_shutdown = Arc::new(Notify::new());
        let server_handle = tokio::spawn(server::serve(
            listener,
            state.clone(),
            server_shutdown.clone(),
        ));

        info!(
            bind_addr = %bind_addr,
            location = %self.config.location,
            max_operation_concurrency = self.config.max_operation_concurrency,
            "RpRuntime started"
        );

        Ok(RpRuntime {
            server_handle,
            worker_handle,
            server_shutdown,
            worker_shutdown,
            state,
            bind_addr,
        })
    }
}

/// A running resource provider: HTTP server plus async worker.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct RpRuntime {
    server_handle: JoinHandle<Result<()>>,
    worker_handle: JoinHandle<()>,
    server_shutdown: Arc<Notify>,
    worker_shutdown: Arc<Notify>,
    state: AppState,
    bind_addr: SocketAddr,
}

impl RpRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> RpRuntimeBuilder {
        RpRuntimeBuilder::new()
    }

    /// Address the HTTP server listens on.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router over the running runtime's state.
    pub fn router(&self) -> Router {
        server::router(self.state.clone())
    }

    /// Stop the HTTP server and the worker, waiting for in-flight operations.
    pub async fn shutdown(self) -> Result<()> {
        info!("RpRuntime shutting down...");

        self.server_shutdown.notify_one();
        self.worker_shutdown.notify_one();

        match self.server_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "HTTP server exited with error"),
            Err(e) => error!(error = %e, "HTTP server task panicked"),
        }
        if let Err(e) = self.worker_handle.await {
            error!(error = %e, "Async worker task panicked");
        }

        info!("RpRuntime stopped");
        Ok(())
    }
}

impl std::fmt::Debug for RpRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpRuntime")
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

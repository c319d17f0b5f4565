// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Radius resource provider server.
//!
//! Serves the resource provider API over HTTP and runs the async operation
//! worker against an in-memory or SQLite store.

use std::sync::Arc;

use radius_core::store::{MemoryStorageClient, SqliteStorageClient, StorageClient};
use radius_rp::config::Config;
use radius_rp::handlers::{InMemoryArm, InMemoryKubernetes};
use radius_rp::model::ApplicationModel;
use radius_rp::recipes::StaticRecipeDriver;
use radius_rp::runtime::RpRuntime;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radius_rp=info,radius_core=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        location = %config.location,
        "Starting Radius resource provider"
    );

    let storage: Arc<dyn StorageClient> = if config.uses_memory_store() {
        info!("Using in-memory store");
        Arc::new(MemoryStorageClient::new())
    } else {
        let storage = SqliteStorageClient::connect(&config.database_url).await?;
        info!("Connected to database");
        Arc::new(storage)
    };

    // Provider clients are in-memory until real Kubernetes and ARM clients are wired in.
    let model = ApplicationModel::new(
        Arc::new(InMemoryKubernetes::new()),
        Some(Arc::new(InMemoryArm::new())),
    );

    let http_addr = config.http_addr;
    let runtime = RpRuntime::builder()
        .config(config)
        .storage(storage)
        .model(Arc::new(model))
        .recipes(Arc::new(StaticRecipeDriver::new()))
        .build()?
        .start()
        .await?;

    info!(addr = %http_addr, "Resource provider ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;

    info!("Radius resource provider shut down");

    Ok(())
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider handlers.
//!
//! A handler deploys and deletes one kind of [`OutputResource`]. Handlers are
//! registered in the [`ApplicationModel`](crate::model::ApplicationModel)
//! under the output resource's `{type, provider}` pair.
//!
//! | Kind | Provider | Handler |
//! |------|----------|---------|
//! | `DaprComponent`, `Secret` | kubernetes | [`KubernetesHandler`] |
//! | `DaprStateStoreAzureStorage` | azure | [`DaprAzureStorageHandler`] |
//! | `DaprPubSubBrokerAzureServiceBus` | azure | [`DaprAzureServiceBusHandler`] |
//! | `azure.*` | azure | [`ArmResourceHandler`] |
//!
//! The provider APIs themselves sit behind [`KubernetesClient`] and
//! [`ArmClient`]; in-memory implementations of both ship with the crate.

mod arm;
mod dapr;
mod kubernetes;
mod secrets;

pub use arm::{ArmClient, ArmResourceHandler, InMemoryArm};
pub use dapr::{DaprAzureServiceBusHandler, DaprAzureStorageHandler, keys};
pub use kubernetes::{InMemoryKubernetes, KubernetesClient, KubernetesHandler};
pub use secrets::{
    ArmSecretClient, AzureRedisTransformer, KubernetesSecretClient, ProviderSecretClient,
    SecretValueClient, SecretValueTransformer,
};

use std::collections::BTreeMap;

use async_trait::async_trait;
use radius_core::datamodel::OutputResource;
use thiserror::Error;

/// Errors returned by handlers and provider clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HandlerError {
    /// The provider object does not exist.
    #[error("{0} was not found")]
    NotFound(String),

    /// The output resource or provider response is malformed.
    #[error("{0}")]
    Invalid(String),

    /// The provider rejected the call.
    #[error("provider error: {0}")]
    Provider(String),
}

impl HandlerError {
    /// True for [`HandlerError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type using HandlerError
pub type Result<T> = std::result::Result<T, HandlerError>;

/// Deploys and deletes one kind of output resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Create or update the resource.
    ///
    /// Sets `resource.identity` and may replace `resource.resource` with the
    /// deployed body. Returns properties that computed values can reference.
    async fn put(&self, resource: &mut OutputResource) -> Result<BTreeMap<String, String>>;

    /// Delete the resource. A resource that is already gone is not an error.
    async fn delete(&self, resource: &OutputResource) -> Result<()>;
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use radius_core::datamodel::{KubernetesIdentity, OutputResource, ResourceIdentity};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{HandlerError, ResourceHandler, Result};

/// The subset of the Kubernetes API the resource provider uses.
#[async_trait]
pub trait KubernetesClient: Send + Sync {
    /// Create or replace an object. The object carries its own
    /// `apiVersion`, `kind`, `metadata.name` and `metadata.namespace`.
    async fn apply(&self, object: &Value) -> Result<()>;

    /// Read an object, `None` when absent.
    async fn get(&self, kind: &str, namespace: &str, name: &str) -> Result<Option<Value>>;

    /// Delete an object. Absent objects are not an error.
    async fn delete(&self, kind: &str, namespace: &str, name: &str) -> Result<()>;
}

fn object_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", kind.to_ascii_lowercase(), namespace, name)
}

/// Identity fields of a Kubernetes object.
pub(crate) fn identity_of(object: &Value) -> Result<KubernetesIdentity> {
    let field = |pointer: &str, name: &str| {
        object
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| HandlerError::Invalid(format!("kubernetes object is missing {name}")))
    };
    Ok(KubernetesIdentity {
        api_version: field("/apiVersion", "apiVersion")?,
        kind: field("/kind", "kind")?,
        name: field("/metadata/name", "metadata.name")?,
        namespace: field("/metadata/namespace", "metadata.namespace")?,
    })
}

/// Cluster stand-in keeping objects in memory.
#[derive(Debug, Default)]
pub struct InMemoryKubernetes {
    objects: RwLock<BTreeMap<String, Value>>,
    failing: bool,
}

impl InMemoryKubernetes {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster that rejects every call.
    pub fn failing() -> Self {
        Self {
            objects: RwLock::default(),
            failing: true,
        }
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// True when the cluster holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(HandlerError::Provider(
                "kubernetes API server is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KubernetesClient for InMemoryKubernetes {
    async fn apply(&self, object: &Value) -> Result<()> {
        self.check()?;
        let id = identity_of(object)?;
        self.objects.write().await.insert(
            object_key(&id.kind, &id.namespace, &id.name),
            object.clone(),
        );
        Ok(())
    }

    async fn get(&self, kind: &str, namespace: &str, name: &str) -> Result<Option<Value>> {
        self.check()?;
        Ok(self
            .objects
            .read()
            .await
            .get(&object_key(kind, namespace, name))
            .cloned())
    }

    async fn delete(&self, kind: &str, namespace: &str, name: &str) -> Result<()> {
        self.check()?;
        self.objects
            .write()
            .await
            .remove(&object_key(kind, namespace, name));
        Ok(())
    }
}

/// Applies the output resource payload as a Kubernetes object.
pub struct KubernetesHandler {
    client: Arc<dyn KubernetesClient>,
}

impl KubernetesHandler {
    /// Create a handler over a Kubernetes client.
    pub fn new(client: Arc<dyn KubernetesClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for KubernetesHandler {
    async fn put(&self, resource: &mut OutputResource) -> Result<BTreeMap<String, String>> {
        let identity = identity_of(&resource.resource)?;
        self.client.apply(&resource.resource).await?;
        debug!(
            local_id = %resource.local_id,
            kind = %identity.kind,
            name = %identity.name,
            namespace = %identity.namespace,
            "applied kubernetes object"
        );

        let properties = BTreeMap::from([
            ("kind".to_string(), identity.kind.clone()),
            ("name".to_string(), identity.name.clone()),
            ("namespace".to_string(), identity.namespace.clone()),
        ]);
        resource.identity = Some(ResourceIdentity::Kubernetes(identity));
        Ok(properties)
    }

    async fn delete(&self, resource: &OutputResource) -> Result<()> {
        match &resource.identity {
            Some(ResourceIdentity::Kubernetes(id)) => {
                self.client.delete(&id.kind, &id.namespace, &id.name).await
            }
            // Never deployed.
            None => Ok(()),
            Some(other) => Err(HandlerError::Invalid(format!(
                "output resource {} has a non-kubernetes identity {}",
                resource.local_id,
                other.display_id()
            ))),
        }
    }
}

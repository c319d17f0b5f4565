// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Secret retrieval and transformation.
//!
//! Secrets are never stored with a resource. A [`SecretValueReference`]
//! names the output resource, an optional provider action and a JSON pointer
//! into the response; the secret is fetched each time it is listed.
//!
//! [`SecretValueReference`]: radius_core::datamodel::SecretValueReference

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use radius_core::datamodel::ResourceIdentity;
use radius_core::datamodel::datastores::values;
use serde_json::Value;

use super::{ArmClient, HandlerError, KubernetesClient, Result};

/// Fetches one secret value from the provider that holds it.
#[async_trait]
pub trait SecretValueClient: Send + Sync {
    /// Invoke `action` on the resource (or read it when `action` is empty)
    /// and return the value at `value_selector`.
    async fn fetch_secret(
        &self,
        identity: &ResourceIdentity,
        action: &str,
        value_selector: &str,
    ) -> Result<Value>;
}

fn select(body: &Value, value_selector: &str) -> Result<Value> {
    body.pointer(value_selector).cloned().ok_or_else(|| {
        HandlerError::Invalid(format!("no value at {value_selector}"))
    })
}

/// Secrets exposed by ARM actions such as `listKeys`.
pub struct ArmSecretClient {
    arm: Arc<dyn ArmClient>,
}

impl ArmSecretClient {
    /// Create a client over ARM.
    pub fn new(arm: Arc<dyn ArmClient>) -> Self {
        Self { arm }
    }
}

#[async_trait]
impl SecretValueClient for ArmSecretClient {
    async fn fetch_secret(
        &self,
        identity: &ResourceIdentity,
        action: &str,
        value_selector: &str,
    ) -> Result<Value> {
        let ResourceIdentity::Arm(arm) = identity else {
            return Err(HandlerError::Invalid(format!(
                "{} is not an azure resource",
                identity.display_id()
            )));
        };
        let body = if action.is_empty() {
            self.arm.get_resource(&arm.id, &arm.api_version).await?
        } else {
            self.arm
                .invoke_action(&arm.id, action, &arm.api_version)
                .await?
        };
        select(&body, value_selector)
    }
}

/// Secrets stored in Kubernetes `Secret` objects.
pub struct KubernetesSecretClient {
    kubernetes: Arc<dyn KubernetesClient>,
}

impl KubernetesSecretClient {
    /// Create a client over the cluster.
    pub fn new(kubernetes: Arc<dyn KubernetesClient>) -> Self {
        Self { kubernetes }
    }
}

#[async_trait]
impl SecretValueClient for KubernetesSecretClient {
    async fn fetch_secret(
        &self,
        identity: &ResourceIdentity,
        _action: &str,
        value_selector: &str,
    ) -> Result<Value> {
        let ResourceIdentity::Kubernetes(k) = identity else {
            return Err(HandlerError::Invalid(format!(
                "{} is not a kubernetes object",
                identity.display_id()
            )));
        };
        let secret = self
            .kubernetes
            .get(&k.kind, &k.namespace, &k.name)
            .await?
            .ok_or_else(|| HandlerError::NotFound(format!("secret {}/{}", k.namespace, k.name)))?;

        let encoded = select(&secret, value_selector)?;
        let encoded = encoded.as_str().ok_or_else(|| {
            HandlerError::Invalid(format!("value at {value_selector} is not a string"))
        })?;
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| HandlerError::Invalid(format!("failed to decode secret: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| HandlerError::Invalid(format!("secret is not valid UTF-8: {e}")))?;
        Ok(Value::String(decoded))
    }
}

/// Routes a fetch to the client for the identity's provider.
pub struct ProviderSecretClient {
    kubernetes: KubernetesSecretClient,
    arm: Option<ArmSecretClient>,
}

impl ProviderSecretClient {
    /// Create the dispatcher. Without ARM, azure identities are rejected.
    pub fn new(kubernetes: Arc<dyn KubernetesClient>, arm: Option<Arc<dyn ArmClient>>) -> Self {
        Self {
            kubernetes: KubernetesSecretClient::new(kubernetes),
            arm: arm.map(ArmSecretClient::new),
        }
    }
}

#[async_trait]
impl SecretValueClient for ProviderSecretClient {
    async fn fetch_secret(
        &self,
        identity: &ResourceIdentity,
        action: &str,
        value_selector: &str,
    ) -> Result<Value> {
        match identity {
            ResourceIdentity::Kubernetes(_) => {
                self.kubernetes
                    .fetch_secret(identity, action, value_selector)
                    .await
            }
            ResourceIdentity::Arm(_) => match &self.arm {
                Some(arm) => arm.fetch_secret(identity, action, value_selector).await,
                None => Err(HandlerError::Invalid(
                    "the azure provider is not configured".to_string(),
                )),
            },
        }
    }
}

/// Rewrites a fetched secret using the resource's computed values.
pub trait SecretValueTransformer: Send + Sync {
    /// Transform `secret`.
    fn transform(&self, computed_values: &BTreeMap<String, Value>, secret: Value) -> Result<Value>;
}

/// Turns an Azure Redis access key into a StackExchange connection string.
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureRedisTransformer;

impl SecretValueTransformer for AzureRedisTransformer {
    fn transform(&self, computed_values: &BTreeMap<String, Value>, secret: Value) -> Result<Value> {
        let password = secret.as_str().ok_or_else(|| {
            HandlerError::Invalid("expected the redis access key to be a string".to_string())
        })?;
        let host = computed_values
            .get(values::HOST)
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::Invalid("computed value host is missing".to_string()))?;
        let port = match computed_values.get(values::PORT) {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(HandlerError::Invalid(
                    "computed value port is missing".to_string(),
                ));
            }
        };
        Ok(Value::String(format!(
            "{host}:{port},password={password},ssl=True,abortConnect=False"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{InMemoryArm, InMemoryKubernetes};
    use radius_core::datamodel::{ArmIdentity, KubernetesIdentity};
    use serde_json::json;

    const REDIS: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Cache/Redis/cache0";

    fn arm_identity() -> ResourceIdentity {
        ResourceIdentity::Arm(ArmIdentity {
            id: REDIS.to_string(),
            api_version: "2022-06-01".to_string(),
        })
    }

    fn secret_identity() -> ResourceIdentity {
        ResourceIdentity::Kubernetes(KubernetesIdentity {
            kind: "Secret".to_string(),
            api_version: "v1".to_string(),
            name: "redis0".to_string(),
            namespace: "default-app".to_string(),
        })
    }

    #[tokio::test]
    async fn test_arm_secret_uses_action_and_selector() {
        let arm = Arc::new(InMemoryArm::new());
        arm.set_action(REDIS, "listKeys", json!({"primaryKey": "key1"}))
            .await;
        let client = ArmSecretClient::new(arm);

        let value = client
            .fetch_secret(&arm_identity(), "listKeys", "/primaryKey")
            .await
            .unwrap();
        assert_eq!(value, json!("key1"));

        let err = client
            .fetch_secret(&arm_identity(), "listKeys", "/secondaryKey")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no value at /secondaryKey");
    }

    #[tokio::test]
    async fn test_kubernetes_secret_is_decoded() {
        let cluster = Arc::new(InMemoryKubernetes::new());
        cluster
            .apply(&json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {"name": "redis0", "namespace": "default-app"},
                "data": {"password": STANDARD.encode("hunter2")}
            }))
            .await
            .unwrap();
        let client = ProviderSecretClient::new(cluster, None);

        let value = client
            .fetch_secret(&secret_identity(), "", "/data/password")
            .await
            .unwrap();
        assert_eq!(value, json!("hunter2"));
    }

    #[tokio::test]
    async fn test_provider_client_without_arm() {
        let client = ProviderSecretClient::new(Arc::new(InMemoryKubernetes::new()), None);
        let err = client
            .fetch_secret(&arm_identity(), "listKeys", "/primaryKey")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn test_azure_redis_transformer() {
        let computed = BTreeMap::from([
            (values::HOST.to_string(), json!("cache0.redis.cache.windows.net")),
            (values::PORT.to_string(), json!(6380)),
        ]);
        let out = AzureRedisTransformer
            .transform(&computed, json!("key1"))
            .unwrap();
        assert_eq!(
            out,
            json!("cache0.redis.cache.windows.net:6380,password=key1,ssl=True,abortConnect=False")
        );

        assert!(
            AzureRedisTransformer
                .transform(&BTreeMap::new(), json!("key1"))
                .is_err()
        );
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for the resource provider HTTP tests.
//!
//! Provides TestContext, which starts a runtime on an ephemeral port and
//! drives its router in process.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use radius_core::store::MemoryStorageClient;
use radius_rp::config::Config;
use radius_rp::handlers::InMemoryKubernetes;
use radius_rp::model::ApplicationModel;
use radius_rp::runtime::RpRuntime;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const API_VERSION: &str = "2023-10-01-preview";
pub const SCOPE: &str = "/planes/radius/local/resourceGroups/test-group";

/// Path of a resource under the test scope.
pub fn resource_path(namespace_and_type: &str, name: &str) -> String {
    format!("{SCOPE}/providers/{namespace_and_type}/{name}")
}

/// Path with the api-version query appended.
pub fn with_api_version(path: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}api-version={API_VERSION}")
}

pub fn environment_id() -> String {
    resource_path("Applications.Core/environments", "env")
}

pub fn environment_body() -> Value {
    json!({
        "location": "global",
        "properties": {
            "compute": {"kind": "kubernetes", "namespace": "default"}
        }
    })
}

pub fn extender_body(from_number: &str) -> Value {
    json!({
        "location": "global",
        "properties": {
            "environment": environment_id(),
            "resourceProvisioning": "manual",
            "fromNumber": from_number,
            "secrets": {"accountSid": "sid"}
        }
    })
}

pub fn redis_body(password: &str) -> Value {
    json!({
        "location": "global",
        "properties": {
            "environment": environment_id(),
            "resourceProvisioning": "manual",
            "host": "redis.local",
            "port": 6379,
            "secrets": {"password": password}
        }
    })
}

pub fn sql_body(password: &str) -> Value {
    json!({
        "location": "global",
        "properties": {
            "environment": environment_id(),
            "resourceProvisioning": "manual",
            "server": "sql.local",
            "port": 1433,
            "database": "inventory",
            "secrets": {"password": password}
        }
    })
}

pub fn generic_state_store_body() -> Value {
    json!({
        "location": "global",
        "properties": {
            "environment": environment_id(),
            "resourceProvisioning": "manual",
            "type": "state.zookeeper",
            "version": "v1",
            "metadata": {"servers": "zookeeper:2181"}
        }
    })
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn etag(&self) -> String {
        self.header("etag").expect("response has an ETag").to_string()
    }

    /// Path and query of an absolute URL header.
    pub fn header_path(&self, name: &str) -> String {
        let value = self.header(name).expect("header present");
        let url = url::Url::parse(value).expect("absolute URL");
        match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        }
    }
}

/// Test context owning a running runtime.
pub struct TestContext {
    pub runtime: RpRuntime,
    pub kubernetes: Arc<InMemoryKubernetes>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let storage = Arc::new(MemoryStorageClient::new());
        let kubernetes = Arc::new(InMemoryKubernetes::new());
        let model = ApplicationModel::new(kubernetes.clone(), None);
        let runtime = RpRuntime::builder()
            .config(config)
            .storage(storage)
            .model(Arc::new(model))
            .build()
            .expect("runtime config")
            .start()
            .await
            .expect("runtime starts");
        Self {
            runtime,
            kubernetes,
        }
    }

    /// Wrap a runtime built elsewhere. `kubernetes` is then a detached cluster.
    pub fn attach(runtime: RpRuntime) -> Self {
        Self {
            runtime,
            kubernetes: Arc::new(InMemoryKubernetes::new()),
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .runtime
            .router()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body readable")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, &with_api_version(path), Some(body), &[])
            .await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, &with_api_version(path), None, &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Method::DELETE, &with_api_version(path), None, &[])
            .await
    }

    pub async fn list_secrets(&self, path: &str) -> TestResponse {
        self.send(
            Method::POST,
            &with_api_version(&format!("{path}/listSecrets")),
            None,
            &[],
        )
        .await
    }

    /// PUT an async resource and wait for its operation to succeed.
    pub async fn put_and_wait(&self, path: &str, body: Value) {
        let response = self.put(path, body).await;
        assert!(response.status.is_success(), "{}", response.body);
        let done = self
            .wait_for_operation(&response.header_path("azure-asyncoperation"))
            .await;
        assert_eq!(done["status"], "Succeeded", "{done}");
    }

    pub async fn create_environment(&self) {
        let response = self.put(&environment_id(), environment_body()).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    }

    /// Poll an operation status URL until it reports a terminal state.
    pub async fn wait_for_operation(&self, status_path: &str) -> Value {
        for _ in 0..200 {
            let response = self.send(Method::GET, status_path, None, &[]).await;
            assert_eq!(response.status, StatusCode::OK, "{}", response.body);
            let status = response.body["status"].as_str().unwrap_or_default();
            if matches!(status, "Succeeded" | "Failed" | "Canceled") {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("operation {status_path} did not finish");
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "memory".to_string(),
        http_addr: "127.0.0.1:0".parse().expect("valid address"),
        dequeue_interval: Duration::from_millis(5),
        async_operation_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

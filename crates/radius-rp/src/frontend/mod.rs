// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Frontend controllers.
//!
//! The HTTP layer turns a request into an [`ArmRequestContext`] and hands it
//! to a controller. Controllers validate, guard with ETags and provisioning
//! state, then either deploy inline (environments, applications, extenders,
//! Dapr components) or queue an async operation (datastores and RabbitMQ
//! queues).
//!
//! ```text
//! PUT/PATCH ──► convert ──► ETag checks ──► state gate ──┬─► reconcile ──► save ──► 200
//!                                                        └─► save Accepted ──► queue ──► 201/200
//! DELETE    ──► absent? 204 ──► ETag/state ──────────────┬─► processor delete ──► store delete ──► 200
//!                                                        └─► save Deleting ──► queue ──► 202
//! ```

mod operations;
mod resource;

pub use operations::OperationController;
pub use resource::ResourceController;

use axum::Json;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use radius_core::ResourceId;
use radius_core::datamodel::{AnyResource, resource_types};
use radius_core::store::StorageClient;
use serde_json::Value;
use url::Url;

use crate::asyncop::{OperationMethod, OperationType};
use crate::error::{ClientError, Result};

/// `Azure-AsyncOperation` header.
pub const AZURE_ASYNC_OPERATION: HeaderName = HeaderName::from_static("azure-asyncoperation");

/// Resource types whose mutations run through the async worker.
pub const ASYNC_RESOURCE_TYPES: [&str; 4] = [
    resource_types::MONGO_DATABASES,
    resource_types::REDIS_CACHES,
    resource_types::SQL_DATABASES,
    resource_types::RABBITMQ_QUEUES,
];

/// True when mutations of `resource_type` are processed asynchronously.
pub fn is_async_type(resource_type: &str) -> bool {
    ASYNC_RESOURCE_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(resource_type))
}

/// Everything a controller needs to know about a request.
#[derive(Debug, Clone)]
pub struct ArmRequestContext {
    /// Resource ID for item routes, collection path for list routes.
    pub resource_id: String,
    /// Fully qualified resource type.
    pub resource_type: String,
    /// Scope the route lives in.
    pub root_scope: String,
    /// `api-version` query parameter.
    pub api_version: String,
    /// `If-Match` header.
    pub if_match: Option<String>,
    /// `If-None-Match` header.
    pub if_none_match: Option<String>,
    /// Raw `top` query parameter.
    pub top: Option<String>,
    /// `skipToken` query parameter.
    pub skip_token: Option<String>,
    /// Resource type and method.
    pub operation_type: OperationType,
    /// Absolute request URL.
    pub referer: Option<Url>,
}

impl ArmRequestContext {
    /// Context for an item route.
    pub fn for_resource(id: &ResourceId, api_version: &str, method: OperationMethod) -> Self {
        let resource_type = id.resource_type();
        Self {
            resource_id: id.to_string(),
            operation_type: OperationType::new(&resource_type, method),
            resource_type,
            root_scope: id.root_scope(),
            api_version: api_version.to_string(),
            if_match: None,
            if_none_match: None,
            top: None,
            skip_token: None,
            referer: None,
        }
    }

    /// Page size requested by `top`, `default` when absent or outside 1..=1000.
    pub fn page_size(&self, default: usize) -> usize {
        self.top
            .as_deref()
            .and_then(|top| top.parse::<usize>().ok())
            .filter(|top| (1..=1000).contains(top))
            .unwrap_or(default)
    }

    /// Absolute URL of `path` on the host the request came in on.
    pub fn absolute_url(&self, path: &str) -> String {
        let query = format!("api-version={}", self.api_version);
        match &self.referer {
            Some(referer) => {
                let mut url = referer.clone();
                url.set_path(path);
                url.set_query(Some(&query));
                url.to_string()
            }
            None => format!("{path}?{query}"),
        }
    }

    /// URL of the next list page for `skip_token`.
    pub fn next_link(&self, skip_token: &str) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("api-version", &self.api_version);
        query.append_pair("skipToken", skip_token);
        if let Some(top) = &self.top {
            query.append_pair("top", top);
        }
        let query = query.finish();
        match &self.referer {
            Some(referer) => {
                let mut url = referer.clone();
                url.set_query(Some(&query));
                url.to_string()
            }
            None => format!("{}?{query}", self.resource_id),
        }
    }
}

/// What a controller answers with.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerResponse {
    /// Status code.
    pub status: StatusCode,
    /// JSON body.
    pub body: Option<Value>,
    /// Extra headers.
    pub headers: HeaderMap,
}

impl ControllerResponse {
    /// Response with a JSON body.
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }

    /// Response without a body.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header. Values that are not valid header text are dropped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add an `ETag` header.
    pub fn with_etag(self, etag: &str) -> Self {
        self.with_header(header::ETAG, etag)
    }

    /// Header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for ControllerResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Load a stored resource and its ETag.
pub(crate) async fn load_resource(
    storage: &dyn StorageClient,
    resource_id: &str,
    resource_type: &str,
) -> Result<Option<(AnyResource, String)>> {
    match storage.get(resource_id).await {
        Ok(object) => {
            let resource = AnyResource::from_value(resource_type, object.data)?;
            Ok(Some((resource, object.metadata.etag)))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Apply `If-Match` / `If-None-Match` to the stored ETag, `None` when absent.
pub(crate) fn check_preconditions(ctx: &ArmRequestContext, stored: Option<&str>) -> Result<()> {
    if let Some(if_match) = ctx.if_match.as_deref() {
        match stored {
            None => {
                return Err(ClientError::precondition_failed(
                    &ctx.resource_id,
                    format!("resource {} does not exist", ctx.resource_id),
                )
                .into());
            }
            Some(etag) if if_match != "*" && if_match != etag => {
                return Err(ClientError::precondition_failed(
                    &ctx.resource_id,
                    format!("etag {if_match} does not match the current etag of {}", ctx.resource_id),
                )
                .into());
            }
            Some(_) => {}
        }
    }
    if ctx.if_none_match.as_deref() == Some("*") && stored.is_some() {
        return Err(ClientError::precondition_failed(
            &ctx.resource_id,
            format!("resource {} already exists", ctx.resource_id),
        )
        .into());
    }
    Ok(())
}

/// Reject mutations of a resource with an operation in flight.
pub(crate) fn ensure_terminal(resource: &AnyResource) -> Result<()> {
    let state = resource.provisioning_state();
    if state.is_terminal() {
        return Ok(());
    }
    Err(ClientError::conflict(format!(
        "the resource with state {} is in progress and cannot be modified until the operation completes",
        state.as_str()
    ))
    .with_target(resource.id())
    .into())
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource provider HTTP server.
//!
//! Every ARM route shares one catch-all handler: the path is split into a
//! scope, a provider namespace and the segments after it, then dispatched
//! to the resource or operation controller.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use radius_core::ResourceId;
use radius_core::datamodel::resource_types;
use radius_core::store::StorageClient;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use url::Url;

use crate::api::{SUPPORTED_API_VERSIONS, is_supported_api_version};
use crate::asyncop::{OperationMethod, OperationType};
use crate::error::{ClientError, Error, codes};
use crate::frontend::{ArmRequestContext, ControllerResponse, OperationController, ResourceController};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resource verbs.
    pub resources: Arc<ResourceController>,
    /// Operation polling.
    pub operations: Arc<OperationController>,
    /// Store, for health checks.
    pub storage: Arc<dyn StorageClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resources", &self.resources)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/{*path}", any(dispatch))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `bind_addr` and serve until `shutdown` is notified.
pub async fn run_server(bind_addr: SocketAddr, state: AppState, shutdown: Arc<Notify>) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is notified.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: Arc<Notify>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "Resource provider HTTP server starting");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;

    info!("Resource provider HTTP server stopped");
    Ok(())
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.storage.health_check().await {
        Ok(true) => (StatusCode::OK, axum::Json(json!({ ("status"): "ok" }))).into_response(),
        Ok(false) => unhealthy("store is not ready".to_string()),
        Err(e) => {
            error!(error = %e, "Health check failed");
            unhealthy(e.to_string())
        }
    }
}

fn unhealthy(message: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        axum::Json(json!({ ("status"): "unavailable", ("message"): message })),
    )
        .into_response()
}

/// What an ARM path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    /// `{scope}/providers/{ns}/{type}`
    Collection {
        scope: String,
        resource_type: &'static str,
    },
    /// `{scope}/providers/{ns}/{type}/{name}`
    Resource {
        id: String,
        resource_type: &'static str,
    },
    /// `{scope}/providers/{ns}/{type}/{name}/listSecrets`
    ListSecrets {
        id: String,
        resource_type: &'static str,
    },
    /// `{scope}/providers/{ns}/locations/{location}/operationStatuses/{id}`
    OperationStatus { scope: String, id: String },
    /// `{scope}/providers/{ns}/locations/{location}/operationResults/{id}`
    OperationResult { scope: String, id: String },
}

fn canonical_type(namespace: &str, type_name: &str) -> Option<&'static str> {
    let qualified = format!("{namespace}/{type_name}");
    resource_types::ALL
        .into_iter()
        .find(|t| t.eq_ignore_ascii_case(&qualified))
}

fn known_namespace(namespace: &str) -> bool {
    resource_types::ALL.iter().any(|t| {
        t.split_once('/')
            .is_some_and(|(ns, _)| ns.eq_ignore_ascii_case(namespace))
    })
}

fn parse_route(path: &str) -> Result<Route, ClientError> {
    let trimmed = path.trim_end_matches('/');
    let not_found = || ClientError::not_found(trimmed);
    let segments: Vec<&str> = trimmed.trim_start_matches('/').split('/').collect();
    let providers = segments
        .iter()
        .position(|s| s.eq_ignore_ascii_case("providers"))
        .ok_or_else(not_found)?;
    if providers == 0 {
        return Err(not_found());
    }
    let scope = format!("/{}", segments[..providers].join("/"));
    let namespace = segments.get(providers + 1).ok_or_else(not_found)?;
    let rest = &segments[providers + 2..];

    match rest {
        [locations, _, collection, _] if locations.eq_ignore_ascii_case("locations") => {
            if !known_namespace(namespace) {
                return Err(not_found());
            }
            let id = trimmed.to_string();
            if collection.eq_ignore_ascii_case("operationStatuses") {
                Ok(Route::OperationStatus { scope, id })
            } else if collection.eq_ignore_ascii_case("operationResults") {
                Ok(Route::OperationResult { scope, id })
            } else {
                Err(not_found())
            }
        }
        [type_name] => {
            let resource_type = canonical_type(namespace, type_name).ok_or_else(not_found)?;
            Ok(Route::Collection {
                scope,
                resource_type,
            })
        }
        [type_name, _] => {
            let resource_type = canonical_type(namespace, type_name).ok_or_else(not_found)?;
            Ok(Route::Resource {
                id: trimmed.to_string(),
                resource_type,
            })
        }
        [type_name, name, action] if action.eq_ignore_ascii_case("listSecrets") => {
            let resource_type = canonical_type(namespace, type_name).ok_or_else(not_found)?;
            Ok(Route::ListSecrets {
                id: format!("{scope}/providers/{namespace}/{type_name}/{name}"),
                resource_type,
            })
        }
        _ => Err(not_found()),
    }
}

/// Request details pulled from the query string and headers.
struct RequestParts {
    api_version: String,
    top: Option<String>,
    skip_token: Option<String>,
    if_match: Option<String>,
    if_none_match: Option<String>,
    referer: Option<Url>,
}

impl RequestParts {
    fn new(uri: &Uri, query: Option<&str>, headers: &HeaderMap) -> Result<Self, ClientError> {
        let mut api_version = None;
        let mut top = None;
        let mut skip_token = None;
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match &*key {
                "api-version" => api_version = Some(value.into_owned()),
                "top" | "$top" => top = Some(value.into_owned()),
                "skipToken" | "$skipToken" => skip_token = Some(value.into_owned()),
                _ => {}
            }
        }
        let api_version = match api_version {
            Some(v) if is_supported_api_version(&v) => v,
            Some(v) => {
                return Err(ClientError::new(
                    codes::INVALID_API_VERSION,
                    format!(
                        "unsupported api-version '{v}', supported versions are: {}",
                        SUPPORTED_API_VERSIONS.join(", ")
                    ),
                ));
            }
            None => {
                return Err(ClientError::new(
                    codes::INVALID_API_VERSION,
                    "the api-version query parameter is required",
                ));
            }
        };

        let read_header = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().trim_matches('"').to_string())
                .filter(|v| !v.is_empty())
        };
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let referer = Url::parse(&format!("http://{host}{uri}")).ok();

        Ok(Self {
            api_version,
            top,
            skip_token,
            if_match: read_header(header::IF_MATCH),
            if_none_match: read_header(header::IF_NONE_MATCH),
            referer,
        })
    }

    fn context(
        self,
        resource_id: String,
        resource_type: &str,
        root_scope: String,
        method: OperationMethod,
    ) -> ArmRequestContext {
        ArmRequestContext {
            resource_id,
            resource_type: resource_type.to_string(),
            root_scope,
            api_version: self.api_version,
            if_match: self.if_match,
            if_none_match: self.if_none_match,
            top: self.top,
            skip_token: self.skip_token,
            operation_type: OperationType::new(resource_type, method),
            referer: self.referer,
        }
    }
}

fn method_not_allowed(method: &Method) -> Error {
    ClientError::new(
        codes::METHOD_NOT_ALLOWED,
        format!("method {method} is not allowed on this route"),
    )
    .into()
}

/// Operation method for a request on a single resource.
fn resource_method(method: &Method) -> Result<OperationMethod, Error> {
    match *method {
        Method::GET => Ok(OperationMethod::Get),
        Method::PUT => Ok(OperationMethod::Put),
        Method::PATCH => Ok(OperationMethod::Patch),
        Method::DELETE => Ok(OperationMethod::Delete),
        _ => Err(method_not_allowed(method)),
    }
}

fn parse_body(body: &Bytes) -> Result<Value, Error> {
    serde_json::from_slice(body)
        .map_err(|e| ClientError::invalid_content(format!("invalid request body: {e}")).into())
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(&state, &method, &uri, query.as_deref(), &headers, body).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ControllerResponse, Error> {
    let route = parse_route(uri.path())?;
    let parts = RequestParts::new(uri, query, headers)?;

    match route {
        Route::Collection {
            scope,
            resource_type,
        } => {
            if method != Method::GET {
                return Err(method_not_allowed(method));
            }
            let collection = format!("{scope}/providers/{resource_type}");
            let ctx = parts.context(collection, resource_type, scope, OperationMethod::List);
            state.resources.list(&ctx).await
        }
        Route::Resource { id, resource_type } => {
            let operation = resource_method(method)?;
            let parsed = ResourceId::parse(&id)?;
            let ctx = parts.context(id, resource_type, parsed.root_scope(), operation);
            match *method {
                Method::GET => state.resources.get(&ctx).await,
                Method::DELETE => state.resources.delete(&ctx).await,
                _ => state.resources.create_or_update(&ctx, parse_body(&body)?).await,
            }
        }
        Route::ListSecrets { id, resource_type } => {
            if method != Method::POST {
                return Err(method_not_allowed(method));
            }
            let parsed = ResourceId::parse(&id)?;
            let ctx = parts.context(id, resource_type, parsed.root_scope(), OperationMethod::Post);
            state.resources.list_secrets(&ctx).await
        }
        Route::OperationStatus { .. } | Route::OperationResult { .. } if method != Method::GET => {
            Err(method_not_allowed(method))
        }
        Route::OperationStatus { scope, id } => {
            let ctx = parts.context(id, "", scope, OperationMethod::Get);
            state.operations.get_status(&ctx).await
        }
        Route::OperationResult { scope, id } => {
            let ctx = parts.context(id, "", scope, OperationMethod::Get);
            state.operations.get_result(&ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "/planes/radius/local/resourceGroups/rg";

    #[test]
    fn test_parse_routes() {
        assert_eq!(
            parse_route(&format!("{SCOPE}/providers/applications.datastores/rediscaches")).unwrap(),
            Route::Collection {
                scope: SCOPE.to_string(),
                resource_type: resource_types::REDIS_CACHES,
            }
        );
        assert_eq!(
            parse_route(&format!("{SCOPE}/providers/Applications.Core/extenders/twilio/")).unwrap(),
            Route::Resource {
                id: format!("{SCOPE}/providers/Applications.Core/extenders/twilio"),
                resource_type: resource_types::EXTENDERS,
            }
        );
        assert_eq!(
            parse_route(&format!("{SCOPE}/providers/Applications.Core/extenders/twilio/listsecrets"))
                .unwrap(),
            Route::ListSecrets {
                id: format!("{SCOPE}/providers/Applications.Core/extenders/twilio"),
                resource_type: resource_types::EXTENDERS,
            }
        );
        let status = format!(
            "{SCOPE}/providers/Applications.Datastores/locations/global/operationStatuses/op1"
        );
        assert_eq!(
            parse_route(&status).unwrap(),
            Route::OperationStatus {
                scope: SCOPE.to_string(),
                id: status.clone(),
            }
        );
        assert!(matches!(
            parse_route(&status.replace("operationStatuses", "operationResults")).unwrap(),
            Route::OperationResult { .. }
        ));
    }

    #[test]
    fn test_parse_route_rejects_unknown() {
        for path in [
            "/nothing/here".to_string(),
            format!("{SCOPE}/providers/Applications.Core/widgets/w"),
            format!("{SCOPE}/providers/Applications.Core/extenders/e/restart"),
            format!("{SCOPE}/providers/Contoso.Things/locations/global/operationStatuses/op"),
            "/providers/Applications.Core/extenders/e".to_string(),
        ] {
            let err = parse_route(&path).unwrap_err();
            assert_eq!(err.code, codes::NOT_FOUND, "{path}");
        }
    }

    #[test]
    fn test_resource_method() {
        for (method, expected) in [
            (Method::GET, OperationMethod::Get),
            (Method::PUT, OperationMethod::Put),
            (Method::PATCH, OperationMethod::Patch),
            (Method::DELETE, OperationMethod::Delete),
        ] {
            assert_eq!(resource_method(&method).unwrap(), expected, "{method}");
        }
        let err = resource_method(&Method::POST).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_request_parts() {
        let uri: Uri = "/x?api-version=2023-10-01-preview&top=5&skipToken=abc"
            .parse()
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "rp.local:8080".parse().unwrap());
        headers.insert(header::IF_MATCH, "\"etag-1\"".parse().unwrap());
        let parts = RequestParts::new(&uri, uri.query(), &headers).unwrap();
        assert_eq!(parts.api_version, "2023-10-01-preview");
        assert_eq!(parts.top.as_deref(), Some("5"));
        assert_eq!(parts.skip_token.as_deref(), Some("abc"));
        assert_eq!(parts.if_match.as_deref(), Some("etag-1"));
        assert_eq!(parts.referer.unwrap().host_str(), Some("rp.local"));

        let uri: Uri = "/x".parse().unwrap();
        let err = RequestParts::new(&uri, None, &HeaderMap::new()).err().unwrap();
        assert_eq!(err.code, codes::INVALID_API_VERSION);

        let uri: Uri = "/x?api-version=2020-01-01".parse().unwrap();
        let err = RequestParts::new(&uri, uri.query(), &HeaderMap::new()).err().unwrap();
        assert!(err.message.contains("2023-10-01-preview"));
    }
}

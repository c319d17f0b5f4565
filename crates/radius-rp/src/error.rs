// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for radius-rp.
//!
//! Every failure is either a [`ClientError`], which carries an ARM error code
//! and reaches the caller verbatim, or a server-side failure that is logged
//! in full and reported with a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use radius_core::error::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::handlers::HandlerError;
use crate::recipes::RecipeError;

/// ARM error codes.
pub mod codes {
    /// Malformed or semantically invalid request.
    pub const BAD_REQUEST: &str = "BadRequest";
    /// Request body could not be decoded.
    pub const INVALID_REQUEST_CONTENT: &str = "InvalidRequestContent";
    /// Generic validation failure.
    pub const INVALID: &str = "Invalid";
    /// Missing or unsupported `api-version`.
    pub const INVALID_API_VERSION: &str = "InvalidApiVersionParameter";
    /// Resource does not exist.
    pub const NOT_FOUND: &str = "NotFound";
    /// ETag precondition failed.
    pub const PRECONDITION_FAILED: &str = "PreconditionFailed";
    /// Resource is busy with another operation.
    pub const CONFLICT: &str = "Conflict";
    /// HTTP method not supported on the route.
    pub const METHOD_NOT_ALLOWED: &str = "MethodNotAllowed";
    /// Server-side failure.
    pub const INTERNAL: &str = "Internal";
    /// Operation was cancelled or timed out.
    pub const OPERATION_CANCELED: &str = "OperationCanceled";
}

const INTERNAL_MESSAGE: &str = "an internal error occurred while processing the request";

/// An error caused by the request rather than by the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    /// ARM error code, see [`codes`].
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// The resource or field the error refers to.
    pub target: Option<String>,
}

impl ClientError {
    /// Create a client error with an explicit code.
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            target: None,
        }
    }

    /// 400 `BadRequest`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, message)
    }

    /// 400 `InvalidRequestContent`.
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST_CONTENT, message)
    }

    /// 404 `NotFound` for a resource ID.
    pub fn not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(
            codes::NOT_FOUND,
            format!("the resource with id '{id}' was not found"),
        )
        .with_target(id)
    }

    /// 412 `PreconditionFailed`.
    pub fn precondition_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(codes::PRECONDITION_FAILED, message).with_target(target)
    }

    /// 409 `Conflict`.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(codes::CONFLICT, message)
    }

    /// Attach a target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// HTTP status for the code.
    pub fn status_code(&self) -> StatusCode {
        match self.code.as_str() {
            codes::NOT_FOUND => StatusCode::NOT_FOUND,
            codes::PRECONDITION_FAILED => StatusCode::PRECONDITION_FAILED,
            codes::CONFLICT => StatusCode::CONFLICT,
            codes::METHOD_NOT_ALLOWED => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Wire representation.
    pub fn to_details(&self) -> ErrorDetails {
        ErrorDetails {
            code: self.code.clone(),
            message: self.message.clone(),
            target: self.target.clone(),
            details: Vec::new(),
        }
    }
}

/// Resource provider errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request was invalid.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// A provider handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Recipe execution failed.
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// The operation queue rejected a call.
    #[error(transparent)]
    Queue(#[from] crate::asyncop::QueueError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the resource provider Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors caused by the request.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// True when the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Client(c) => c.status_code(),
            Self::Store(CoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Store(CoreError::Concurrency { .. }) => StatusCode::PRECONDITION_FAILED,
            Self::Store(CoreError::Invalid { .. } | CoreError::InvalidResourceId(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error details that keep the client/server distinction.
    ///
    /// Server errors carry a generic message; the full error is only logged.
    pub fn to_error_response(&self) -> ErrorResponse {
        let details = match self {
            Self::Client(c) => c.to_details(),
            Self::Store(e @ CoreError::NotFound { id }) => ErrorDetails {
                code: codes::NOT_FOUND.to_string(),
                message: e.to_string(),
                target: Some(id.clone()),
                details: Vec::new(),
            },
            Self::Store(CoreError::Concurrency { id }) => ErrorDetails {
                code: codes::PRECONDITION_FAILED.to_string(),
                message: format!("the resource '{id}' was modified by another request"),
                target: Some(id.clone()),
                details: Vec::new(),
            },
            Self::Store(e @ (CoreError::Invalid { .. } | CoreError::InvalidResourceId(_))) => {
                ErrorDetails::new(codes::BAD_REQUEST, e.to_string())
            }
            _ => ErrorDetails::new(codes::INTERNAL, INTERNAL_MESSAGE),
        };
        ErrorResponse { error: details }
    }

    /// Details recorded on a failed async operation.
    ///
    /// Same rules as [`to_error_response`](Self::to_error_response). The
    /// worker logs the full error.
    pub fn to_operation_error(&self) -> ErrorDetails {
        self.to_error_response().error
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.to_error_response())).into_response()
    }
}

/// ARM error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error.
    pub error: ErrorDetails,
}

/// ARM error details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Stable error code.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// The resource or field the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Nested errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetails>,
}

impl ErrorDetails {
    /// Details without a target.
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            target: None,
            details: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_status_codes() {
        let cases = vec![
            (ClientError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ClientError::invalid_content("x"), StatusCode::BAD_REQUEST),
            (ClientError::not_found("/a"), StatusCode::NOT_FOUND),
            (
                ClientError::precondition_failed("/a", "x"),
                StatusCode::PRECONDITION_FAILED,
            ),
            (ClientError::conflict("x"), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err.code);
        }
    }

    #[test]
    fn test_store_errors_map_to_client_statuses() {
        assert_eq!(
            Error::from(CoreError::not_found("/x")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::from(CoreError::concurrency("/x")).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            Error::from(CoreError::invalid("bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        let db = CoreError::DatabaseError {
            operation: "save".into(),
            details: "disk full".into(),
        };
        assert_eq!(Error::from(db).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = Error::Other("connection to 10.0.0.4 refused".into());
        let body = err.to_error_response();
        assert_eq!(body.error.code, codes::INTERNAL);
        assert!(!body.error.message.contains("10.0.0.4"));

        let op = err.to_operation_error();
        assert_eq!(op.code, codes::INTERNAL);
        assert_eq!(op.message, INTERNAL_MESSAGE);

        let client = Error::from(ClientError::bad_request("environment does not exist"));
        assert_eq!(client.to_operation_error().message, "environment does not exist");
    }

    #[test]
    fn test_error_body_shape() {
        let err = Error::from(ClientError::precondition_failed("/a/b", "etag mismatch"));
        let json = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(json["error"]["code"], "PreconditionFailed");
        assert_eq!(json["error"]["target"], "/a/b");
        assert!(json["error"].get("details").is_none());
    }
}

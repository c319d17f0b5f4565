// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for radius-core.
//!
//! Storage errors carry enough structure for the resource provider to tell
//! a missing document or a lost update apart from an I/O failure.

use thiserror::Error;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned by the document store and the data model helpers.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The requested document does not exist.
    #[error("the resource with id '{id}' was not found")]
    NotFound {
        /// The ID that was looked up.
        id: String,
    },

    /// The ETag presented with a conditional write did not match.
    #[error("the operation failed due to a concurrency conflict on '{id}'")]
    Concurrency {
        /// The ID of the conflicting document.
        id: String,
    },

    /// The request to the store was malformed.
    #[error("{message}")]
    Invalid {
        /// Human readable explanation.
        message: String,
    },

    /// A resource identifier could not be parsed.
    #[error("'{0}' is not a valid resource id")]
    InvalidResourceId(String),

    /// Database operation failed.
    #[error("database error during {operation}: {details}")]
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Shorthand for [`CoreError::Concurrency`].
    pub fn concurrency(id: impl Into<String>) -> Self {
        Self::Concurrency { id: id.into() }
    }

    /// Shorthand for [`CoreError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// True when the document was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when a conditional write lost the race.
    pub fn is_concurrency(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Concurrency { .. } => "CONCURRENCY",
            Self::Invalid { .. } => "INVALID",
            Self::InvalidResourceId(_) => "INVALID_RESOURCE_ID",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

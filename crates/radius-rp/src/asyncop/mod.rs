// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Asynchronous operations.
//!
//! Long-running mutations are accepted by the frontend, recorded as an
//! [`OperationStatus`] and queued. The [`AsyncWorker`] picks them up and runs
//! the [`AsyncController`] registered for the operation type.
//!
//! ```text
//! frontend ──► StatusManager::queue_async_operation ──► status: Accepted
//!                                   │
//!                                   ▼
//!                                 Queue
//!                                   │
//!                                   ▼
//!          AsyncWorker ──► status/resource: Updating | Deleting
//!                 │
//!                 ├─ controller ok      ──► Succeeded
//!                 ├─ controller error   ──► Failed
//!                 ├─ timeout            ──► Canceled
//!                 └─ requeue            ──► back to the queue
//! ```

mod controller;
mod queue;
mod status;
mod worker;

pub use controller::{
    AsyncController, ControllerRegistry, CreateOrUpdateController, DeleteController,
    OperationResult,
};
pub use queue::{DEFAULT_MESSAGE_LOCK, InMemoryQueue, Queue, QueueError, QueueMessage};
pub use status::{
    DEFAULT_RETRY_AFTER_SECS, OperationStatus, StatusManager, operation_result_id,
    operation_status_id,
};
pub use worker::{AsyncWorker, AsyncWorkerConfig};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Method of a request. Only `Put`, `Patch` and `Delete` run asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationMethod {
    /// Read one resource.
    Get,
    /// Read a collection.
    List,
    /// Create or replace.
    Put,
    /// Update.
    Patch,
    /// Delete.
    Delete,
    /// Action such as `listSecrets`.
    Post,
}

impl OperationMethod {
    /// Wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::List => "LIST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Post => "POST",
        }
    }

    /// True for methods that change the resource.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Put | Self::Patch | Self::Delete)
    }
}

/// Resource type and method of an operation, e.g.
/// `APPLICATIONS.DATASTORES/REDISCACHES|PUT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationType {
    /// Resource type, upper-cased.
    pub resource_type: String,
    /// Method.
    pub method: OperationMethod,
}

impl OperationType {
    /// Build an operation type.
    pub fn new(resource_type: &str, method: OperationMethod) -> Self {
        Self {
            resource_type: resource_type.to_ascii_uppercase(),
            method,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.resource_type, self.method.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource_type, method) = s
            .split_once('|')
            .ok_or_else(|| format!("'{s}' is not a valid operation type"))?;
        let method = match method.to_ascii_uppercase().as_str() {
            "GET" => OperationMethod::Get,
            "LIST" => OperationMethod::List,
            "PUT" => OperationMethod::Put,
            "PATCH" => OperationMethod::Patch,
            "DELETE" => OperationMethod::Delete,
            "POST" => OperationMethod::Post,
            _ => return Err(format!("'{s}' is not a valid operation type")),
        };
        Ok(Self::new(resource_type, method))
    }
}

impl Serialize for OperationType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything the worker needs to run an accepted operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Operation ID, also the last segment of the status ID.
    pub operation_id: String,
    /// Operation type.
    pub operation_type: OperationType,
    /// Target resource.
    pub resource_id: String,
    /// API version of the request.
    pub api_version: String,
    /// Time limit.
    pub timeout: Duration,
    /// Secrets sent with the request. They are never persisted, so they
    /// travel with the message.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document store with ETag-based optimistic concurrency.
//!
//! The resource provider keeps every resource and every async operation
//! status as a JSON document keyed by its resource ID. All writers go through
//! [`StorageClient`]; conditional writes compare the caller's ETag with the
//! stored one and fail with [`CoreError::Concurrency`] on mismatch.
//!
//! Two implementations are provided:
//!
//! | Implementation          | Backing                       |
//! |-------------------------|-------------------------------|
//! | [`MemoryStorageClient`] | `RwLock<BTreeMap>` in process |
//! | [`SqliteStorageClient`] | SQLite through sqlx           |

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorageClient;
pub use sqlite::SqliteStorageClient;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::resources::ResourceId;

/// Page size used when a query does not ask for one.
pub const DEFAULT_MAX_ITEM_COUNT: usize = 100;

/// Identity and version of a stored document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Resource ID as supplied by the writer (original casing).
    pub id: String,
    /// Opaque version token, regenerated on every write.
    pub etag: String,
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Identity and ETag.
    pub metadata: Metadata,
    /// Document body.
    pub data: Value,
}

impl Object {
    /// Create an object with no ETag yet.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            metadata: Metadata {
                id: id.into(),
                etag: String::new(),
            },
            data,
        }
    }

    /// Serialize a typed value into a new object.
    pub fn from_model<T: Serialize>(id: impl Into<String>, model: &T) -> Result<Self> {
        Ok(Self::new(id, serde_json::to_value(model)?))
    }

    /// Decode the document body into a typed value.
    pub fn as_model<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Filter for [`StorageClient::query`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Scope the results must live in, e.g. `/planes/radius/local/resourceGroups/rg`.
    pub root_scope: String,
    /// Fully qualified resource type, e.g. `Applications.Dapr/stateStores`.
    pub resource_type: String,
    /// Include resources in nested scopes of `root_scope`.
    pub scope_recursive: bool,
}

/// Paging options for [`StorageClient::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Cursor returned by a previous page.
    pub pagination_token: Option<String>,
    /// Maximum number of items; [`DEFAULT_MAX_ITEM_COUNT`] when unset.
    pub max_item_count: Option<usize>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct ObjectQueryResult {
    /// Items on this page in key order.
    pub items: Vec<Object>,
    /// Cursor for the next page; `None` on the last page.
    pub pagination_token: Option<String>,
}

/// Storage abstraction consumed by controllers and the async worker.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetch a document by ID.
    async fn get(&self, id: &str) -> Result<Object>;

    /// Write a document.
    ///
    /// With `etag` the write only succeeds when the stored document has that
    /// ETag. Without it the document is upserted. On success the new ETag is
    /// written back to `object.metadata.etag`.
    async fn save(&self, object: &mut Object, etag: Option<&str>) -> Result<()>;

    /// Delete a document, optionally guarded by an ETag.
    async fn delete(&self, id: &str, etag: Option<&str>) -> Result<()>;

    /// List documents of one type within a scope.
    async fn query(&self, query: &Query, options: &QueryOptions) -> Result<ObjectQueryResult>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Lower-cased key, root scope and type of a document ID.
#[derive(Debug, Clone)]
pub(crate) struct StorageKey {
    pub key: String,
    pub root_scope: String,
    pub resource_type: String,
}

impl StorageKey {
    pub(crate) fn from_id(id: &str) -> Result<Self> {
        let parsed = ResourceId::parse(id)?;
        if !parsed.is_resource() {
            return Err(CoreError::invalid(format!(
                "'{id}' is a scope and cannot be stored as a resource"
            )));
        }
        Ok(Self {
            key: parsed.storage_key(),
            root_scope: parsed.root_scope().to_ascii_lowercase(),
            resource_type: parsed.resource_type().to_ascii_lowercase(),
        })
    }
}

pub(crate) fn new_etag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn validate_query(query: &Query) -> Result<()> {
    if query.root_scope.is_empty() {
        return Err(CoreError::invalid("root scope must be specified for a query"));
    }
    if query.resource_type.is_empty() {
        return Err(CoreError::invalid(
            "resource type must be specified for a query",
        ));
    }
    Ok(())
}

pub(crate) fn scope_matches(query: &Query, root_scope: &str) -> bool {
    let wanted = query.root_scope.trim_end_matches('/').to_ascii_lowercase();
    if root_scope == wanted {
        return true;
    }
    query.scope_recursive
        && root_scope
            .strip_prefix(&wanted)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn encode_token(last_key: &str) -> String {
    URL_SAFE_NO_PAD.encode(last_key.as_bytes())
}

pub(crate) fn decode_token(token: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| CoreError::invalid("pagination token is malformed"))?;
    String::from_utf8(bytes).map_err(|_| CoreError::invalid("pagination token is malformed"))
}

pub(crate) fn page_size(options: &QueryOptions) -> usize {
    options
        .max_item_count
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_ITEM_COUNT)
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed document store.

use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;

use super::{
    Metadata, Object, ObjectQueryResult, Query, QueryOptions, StorageClient, StorageKey,
    decode_token, encode_token, new_etag, page_size, validate_query,
};
use crate::error::{CoreError, Result};
use crate::migrations;

#[derive(Debug, sqlx::FromRow)]
struct ResourceRow {
    id: String,
    original_id: String,
    etag: String,
    data: String,
}

impl ResourceRow {
    fn into_object(self) -> Result<Object> {
        Ok(Object {
            metadata: Metadata {
                id: self.original_id,
                etag: self.etag,
            },
            data: serde_json::from_str(&self.data)?,
        })
    }
}

/// SQLite-backed storage client.
#[derive(Clone)]
pub struct SqliteStorageClient {
    pool: SqlitePool,
}

impl SqliteStorageClient {
    /// Create a storage client from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite URL (e.g. `sqlite::memory:`) and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        // Each in-memory connection is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Create and initialize a store from a database file path.
    ///
    /// Parent directories and the file itself are created when missing, and
    /// all migrations are applied.
    ///
    /// ```ignore
    /// let store = SqliteStorageClient::from_path(".data/radius.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        migrations::run_sqlite(pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })
    }
}

#[async_trait]
impl StorageClient for SqliteStorageClient {
    async fn get(&self, id: &str) -> Result<Object> {
        let key = StorageKey::from_id(id)?;
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT id, original_id, etag, data
            FROM resources
            WHERE id = ?
            "#,
        )
        .bind(&key.key)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| CoreError::not_found(id))?.into_object()
    }

    async fn save(&self, object: &mut Object, etag: Option<&str>) -> Result<()> {
        let key = StorageKey::from_id(&object.metadata.id)?;
        let data = serde_json::to_string(&object.data)?;
        let next = new_etag();

        if let Some(expected) = etag {
            let result = sqlx::query(
                r#"
                UPDATE resources
                SET original_id = ?, etag = ?, data = ?, updated_at = CURRENT_TIMESTAMP
                WHERE id = ? AND etag = ?
                "#,
            )
            .bind(&object.metadata.id)
            .bind(&next)
            .bind(&data)
            .bind(&key.key)
            .bind(expected)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                debug!(id = %object.metadata.id, "Conditional save lost the race");
                return Err(CoreError::concurrency(&object.metadata.id));
            }
        } else {
            sqlx::query(
                r#"
                INSERT INTO resources (id, original_id, root_scope, resource_type, etag, data)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    original_id = excluded.original_id,
                    etag = excluded.etag,
                    data = excluded.data,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&key.key)
            .bind(&object.metadata.id)
            .bind(&key.root_scope)
            .bind(&key.resource_type)
            .bind(&next)
            .bind(&data)
            .execute(&self.pool)
            .await?;
        }

        object.metadata.etag = next;
        Ok(())
    }

    async fn delete(&self, id: &str, etag: Option<&str>) -> Result<()> {
        let key = StorageKey::from_id(id)?;
        let result = sqlx::query(
            r#"
            DELETE FROM resources
            WHERE id = ? AND (? IS NULL OR etag = ?)
            "#,
        )
        .bind(&key.key)
        .bind(etag)
        .bind(etag)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM resources WHERE id = ?")
            .bind(&key.key)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Err(CoreError::concurrency(id)),
            None => Err(CoreError::not_found(id)),
        }
    }

    async fn query(&self, query: &Query, options: &QueryOptions) -> Result<ObjectQueryResult> {
        validate_query(query)?;
        let limit = page_size(options);
        let after = match &options.pagination_token {
            Some(token) => decode_token(token)?,
            None => String::new(),
        };

        let scope = query.root_scope.trim_end_matches('/').to_ascii_lowercase();
        let nested_prefix = format!("{scope}/");

        let mut rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT id, original_id, etag, data
            FROM resources
            WHERE resource_type = ?
              AND id > ?
              AND (root_scope = ? OR (? AND substr(root_scope, 1, ?) = ?))
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(query.resource_type.to_ascii_lowercase())
        .bind(&after)
        .bind(&scope)
        .bind(query.scope_recursive)
        .bind(nested_prefix.len() as i64)
        .bind(&nested_prefix)
        .bind((limit + 1) as i64)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let pagination_token = if has_more {
            rows.last().map(|r| encode_token(&r.id))
        } else {
            None
        };

        let items = rows
            .into_iter()
            .map(ResourceRow::into_object)
            .collect::<Result<Vec<_>>>()?;

        Ok(ObjectQueryResult {
            items,
            pagination_token,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for radius-core.
//!
//! Embedded migrations for the SQLite document store. Products that bring
//! their own pool can run them before constructing a
//! [`SqliteStorageClient`](crate::store::SqliteStorageClient).
//!
//! # Example
//!
//! ```ignore
//! use sqlx::SqlitePool;
//! use radius_core::migrations;
//!
//! let pool = SqlitePool::connect("sqlite::memory:").await?;
//! migrations::run_sqlite(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// SQLite migrator with all store migrations embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run SQLite migrations.
///
/// Applies all pending migrations to the database. Safe to call multiple times;
/// already-applied migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Radius Core - resource identity, document store and data model
//!
//! This crate holds everything the resource provider persists and how it is
//! addressed. It has no HTTP or deployment logic; `radius-rp` builds the
//! controllers, renderers and async worker on top of it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             radius-rp                                    │
//! │     (HTTP surface, controllers, renderers, deployment, async worker)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                │                       │                      │
//!                ▼                       ▼                      ▼
//! ┌───────────────────────┐  ┌───────────────────────┐  ┌──────────────────┐
//! │      resources        │  │      datamodel        │  │      store       │
//! │  ResourceId parsing   │  │  Resource<P> envelope │  │  StorageClient   │
//! │  scopes, types, names │  │  output resources     │  │  ETag CAS, pages │
//! └───────────────────────┘  └───────────────────────┘  └──────────────────┘
//!                                                               │
//!                                                    ┌──────────┴─────────┐
//!                                                    ▼                    ▼
//!                                             ┌─────────────┐     ┌─────────────┐
//!                                             │   memory    │     │   SQLite    │
//!                                             └─────────────┘     └─────────────┘
//! ```
//!
//! # Resource IDs
//!
//! Two forms are accepted and round-trip through [`resources::ResourceId`]:
//!
//! | Form | Example |
//! |------|---------|
//! | UCP | `/planes/radius/local/resourceGroups/rg/providers/Applications.Dapr/stateStores/s` |
//! | ARM | `/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Cache/Redis/c` |
//!
//! Comparison and storage keys are case-insensitive.
//!
//! # Store Semantics
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | `get` | `NotFound` when absent |
//! | `save` | Upsert; with an ETag, compare-and-swap or `Concurrency` |
//! | `delete` | `NotFound` when absent; ETag mismatch is `Concurrency` |
//! | `query` | One type in a scope (optionally recursive), paged by opaque token |
//!
//! Every successful write produces a fresh ETag.
//!
//! # Modules
//!
//! - [`datamodel`]: Persisted resource types and deployment facts
//! - [`error`]: Error type shared by the store and data model
//! - [`migrations`]: Embedded SQLite schema
//! - [`resources`]: Resource ID parsing and manipulation
//! - [`store`]: Document store trait and implementations

#![deny(missing_docs)]

/// Persisted resource types, output resources and deployment facts.
pub mod datamodel;

/// Error type for store and data model operations.
pub mod error;

/// Embedded database migrations.
pub mod migrations;

/// Resource ID parsing.
pub mod resources;

/// Document store with ETag-based optimistic concurrency.
pub mod store;

pub use error::{CoreError, Result};
pub use resources::ResourceId;

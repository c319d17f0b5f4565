// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Radius Resource Provider
//!
//! This crate serves the ARM-style REST surface for the Radius resource
//! types, validates and converts versioned payloads, renders resources into
//! output resources, deploys them through provider handlers and runs
//! long-running mutations through an async operation worker.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ARM / UCP clients                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ HTTP (port 8080)
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  server ──► frontend controllers ──► api conversion ──► store            │
//! │                 │                                          ▲             │
//! │                 │ inline types              async types    │             │
//! │                 ▼                               │          │             │
//! │          deployment processor ◄── asyncop worker ◄── queue              │
//! │           │           │                                                  │
//! │      renderers     handlers / recipe driver                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                        │                    │
//!                        ▼                    ▼
//!                  ┌────────────┐      ┌────────────┐
//!                  │ Kubernetes │      │    ARM     │
//!                  └────────────┘      └────────────┘
//! ```
//!
//! # Routes
//!
//! All routes require `api-version=2023-10-01-preview`.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `{scope}/providers/{ns}/{type}` | List, paged by `top` and `skipToken` |
//! | `GET` | `{scope}/providers/{ns}/{type}/{name}` | Get |
//! | `PUT` | `{scope}/providers/{ns}/{type}/{name}` | Create or replace |
//! | `PATCH` | `{scope}/providers/{ns}/{type}/{name}` | Update an existing resource |
//! | `DELETE` | `{scope}/providers/{ns}/{type}/{name}` | Delete |
//! | `POST` | `{scope}/providers/{ns}/{type}/{name}/listSecrets` | Secret values |
//! | `GET` | `{scope}/providers/{ns}/locations/{loc}/operationStatuses/{id}` | Operation status |
//! | `GET` | `{scope}/providers/{ns}/locations/{loc}/operationResults/{id}` | Operation result |
//! | `GET` | `/healthz` | Store health |
//!
//! # Resource Types
//!
//! | Type | Mutations |
//! |------|-----------|
//! | `Applications.Core/environments` | inline |
//! | `Applications.Core/applications` | inline |
//! | `Applications.Core/extenders` | inline |
//! | `Applications.Dapr/stateStores`, `pubSubBrokers`, `secretStores` | inline |
//! | `Applications.Datastores/mongoDatabases`, `redisCaches`, `sqlDatabases` | async |
//! | `Applications.Messaging/rabbitMQQueues` | async |
//!
//! # Provisioning State
//!
//! ```text
//!            PUT/PATCH (async)                   worker picks up
//!  ┌──────────┐  ───────────►  ┌──────────┐  ─────────────────►  ┌──────────┐
//!  │ terminal │                │ Accepted │                      │ Updating │
//!  └──────────┘  ◄───────────  └──────────┘                      └────┬─────┘
//!       ▲        enqueue fails: Failed                                │
//!       │                                                              │
//!       └─────────── Succeeded | Failed | Canceled (timeout) ◄─────────┘
//! ```
//!
//! Mutations of a resource in a non-terminal state are rejected with 409.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `RADIUS_DATABASE_URL` | No | `sqlite::memory:` | SQLite URL, or `memory` |
//! | `RADIUS_HTTP_PORT` | No | `8080` | HTTP port |
//! | `RADIUS_MAX_OPERATION_CONCURRENCY` | No | `10` | Worker parallelism |
//! | `RADIUS_MAX_OPERATION_RETRY_COUNT` | No | `3` | Dequeues before an operation fails |
//! | `RADIUS_DEQUEUE_INTERVAL_MS` | No | `200` | Worker poll interval |
//! | `RADIUS_ASYNC_OPERATION_TIMEOUT_SECS` | No | `120` | Per-operation timeout |
//! | `RADIUS_DEFAULT_PAGE_SIZE` | No | `100` | List page size |
//! | `RADIUS_LOCATION` | No | `global` | Operation status location |
//!
//! # Modules
//!
//! - [`api`]: Versioned wire models and conversion
//! - [`asyncop`]: Operation statuses, queue, controllers and worker
//! - [`config`]: Configuration from environment variables
//! - [`deployment`]: Render, deploy, delete and secret fetching
//! - [`error`]: ARM error codes and responses
//! - [`frontend`]: Request controllers
//! - [`handlers`]: Provider handlers and clients
//! - [`model`]: Renderer and handler registry
//! - [`recipes`]: Recipe driver
//! - [`renderers`]: Per-type renderers
//! - [`runtime`]: Embeddable runtime
//! - [`server`]: HTTP routing

#![deny(missing_docs)]

/// Versioned wire models and conversion to the data model.
pub mod api;

/// Async operation statuses, queue, controllers and worker.
pub mod asyncop;

/// Configuration loaded from environment variables.
pub mod config;

/// Deployment processor.
pub mod deployment;

/// Error types and ARM error responses.
pub mod error;

/// Frontend request controllers.
pub mod frontend;

/// Provider handlers and the clients they use.
pub mod handlers;

/// Registry of renderers, handlers and secret transformers.
pub mod model;

/// Recipe execution.
pub mod recipes;

/// Resource renderers.
pub mod renderers;

/// Embeddable runtime wiring the server and the worker.
pub mod runtime;

/// HTTP server.
pub mod server;

pub use error::{Error, Result};

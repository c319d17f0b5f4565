// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Versioned wire models.
//!
//! Each API version lives in its own module and converts between its wire
//! shapes and the data model. Only one version is served today.

pub mod v20231001preview;

/// API versions accepted in the `api-version` query parameter.
pub const SUPPORTED_API_VERSIONS: &[&str] = &[v20231001preview::API_VERSION];

/// True when `api_version` is served.
pub fn is_supported_api_version(api_version: &str) -> bool {
    SUPPORTED_API_VERSIONS.contains(&api_version)
}

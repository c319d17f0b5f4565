// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ARM and UCP resource identifiers.
//!
//! Two root forms are accepted:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{group}/providers/{namespace}/{type}/{name}
//! /planes/{planeType}/{planeName}/resourceGroups/{group}/providers/{namespace}/{type}/{name}
//! ```
//!
//! Nested types add further `{type}/{name}` pairs after the first one. An ID
//! without a `providers` segment is a scope. Comparisons are case-insensitive.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CoreError, Result};

const PLANES: &str = "planes";
const PROVIDERS: &str = "providers";

/// A `{type}/{name}` pair in either the scope or the resource part of an ID.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment type, e.g. `resourceGroups` or `stateStores`.
    pub type_name: String,
    /// Segment name.
    pub name: String,
}

impl Segment {
    fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

/// A parsed resource or scope identifier.
#[derive(Debug, Clone)]
pub struct ResourceId {
    ucp: bool,
    scopes: Vec<Segment>,
    provider_namespace: Option<String>,
    types: Vec<Segment>,
}

impl ResourceId {
    /// Parse an ID in either the ARM or the UCP form.
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidResourceId(id.to_string());

        let trimmed = id.strip_suffix('/').unwrap_or(id);
        let rest = trimmed.strip_prefix('/').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let mut cursor = 0;
        let ucp = parts[0].eq_ignore_ascii_case(PLANES);
        if ucp {
            cursor = 1;
        }

        let providers_at = parts
            .iter()
            .position(|p| p.eq_ignore_ascii_case(PROVIDERS));

        let scope_end = providers_at.unwrap_or(parts.len());
        let scope_parts = &parts[cursor..scope_end];
        if scope_parts.len() % 2 != 0 {
            return Err(invalid());
        }
        let scopes = scope_parts
            .chunks(2)
            .map(|c| Segment::new(c[0], c[1]))
            .collect::<Vec<_>>();

        // `/planes` alone is not meaningful and an ARM ID must start at a subscription.
        if scopes.is_empty() {
            return Err(invalid());
        }

        let Some(providers_at) = providers_at else {
            return Ok(Self {
                ucp,
                scopes,
                provider_namespace: None,
                types: Vec::new(),
            });
        };

        let namespace = parts.get(providers_at + 1).ok_or_else(invalid)?;
        let type_parts = &parts[providers_at + 2..];
        if type_parts.is_empty() || type_parts.len() % 2 != 0 {
            return Err(invalid());
        }
        let types = type_parts
            .chunks(2)
            .map(|c| Segment::new(c[0], c[1]))
            .collect();

        Ok(Self {
            ucp,
            scopes,
            provider_namespace: Some((*namespace).to_string()),
            types,
        })
    }

    /// Build a resource ID from a scope and a provider type path.
    ///
    /// `resource_type` has the form `Namespace/type1/type2` and `names`
    /// holds one name per type segment.
    pub fn from_parts(scope: &str, resource_type: &str, names: &[&str]) -> Result<Self> {
        let mut type_parts = resource_type.split('/');
        let namespace = type_parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::invalid(format!("invalid resource type '{resource_type}'")))?;
        let type_names: Vec<&str> = type_parts.collect();
        if type_names.is_empty() || type_names.len() != names.len() {
            return Err(CoreError::invalid(format!(
                "resource type '{resource_type}' requires {} names",
                type_names.len()
            )));
        }

        let mut id = format!("{}/providers/{}", scope.trim_end_matches('/'), namespace);
        for (t, n) in type_names.iter().zip(names) {
            id.push('/');
            id.push_str(t);
            id.push('/');
            id.push_str(n);
        }
        Self::parse(&id)
    }

    /// True when the ID uses the `/planes/...` form.
    pub fn is_ucp(&self) -> bool {
        self.ucp
    }

    /// True when the ID names a resource rather than a scope.
    pub fn is_resource(&self) -> bool {
        !self.types.is_empty()
    }

    /// True when the ID names a scope such as a resource group.
    pub fn is_scope(&self) -> bool {
        self.types.is_empty()
    }

    /// Scope segments, excluding the `planes` prefix.
    pub fn scope_segments(&self) -> &[Segment] {
        &self.scopes
    }

    /// Type segments after the provider namespace.
    pub fn type_segments(&self) -> &[Segment] {
        &self.types
    }

    /// The provider namespace, e.g. `Applications.Dapr`.
    pub fn provider_namespace(&self) -> Option<&str> {
        self.provider_namespace.as_deref()
    }

    /// The scope part of the ID, e.g. `/planes/radius/local/resourceGroups/rg`.
    pub fn root_scope(&self) -> String {
        let mut out = String::new();
        if self.ucp {
            out.push('/');
            out.push_str(PLANES);
        }
        for s in &self.scopes {
            out.push('/');
            out.push_str(&s.type_name);
            out.push('/');
            out.push_str(&s.name);
        }
        out
    }

    /// The fully qualified resource type, e.g. `Applications.Dapr/stateStores`.
    ///
    /// Empty for scopes.
    pub fn resource_type(&self) -> String {
        match &self.provider_namespace {
            Some(ns) if !self.types.is_empty() => {
                let mut out = ns.clone();
                for t in &self.types {
                    out.push('/');
                    out.push_str(&t.type_name);
                }
                out
            }
            _ => String::new(),
        }
    }

    /// Name of the last segment.
    pub fn name(&self) -> &str {
        self.types
            .last()
            .or_else(|| self.scopes.last())
            .map(|s| s.name.as_str())
            .unwrap_or_default()
    }

    /// Find the name of a scope segment by type, e.g. `resourceGroups`.
    pub fn find_scope(&self, scope_type: &str) -> Option<&str> {
        self.scopes
            .iter()
            .find(|s| s.type_name.eq_ignore_ascii_case(scope_type))
            .map(|s| s.name.as_str())
    }

    /// Drop the last type segment, or the last scope segment for scopes.
    pub fn truncate(&self) -> Self {
        let mut out = self.clone();
        if out.types.len() > 1 {
            out.types.pop();
        } else if !out.types.is_empty() {
            out.types.clear();
            out.provider_namespace = None;
        } else if out.scopes.len() > 1 {
            out.scopes.pop();
        }
        out
    }

    /// Append a nested `{type}/{name}` segment.
    pub fn append(&self, type_name: &str, name: &str) -> Result<Self> {
        if self.provider_namespace.is_none() {
            return Err(CoreError::invalid(
                "cannot append a type segment to a scope without a provider namespace",
            ));
        }
        let mut out = self.clone();
        out.types.push(Segment::new(type_name, name));
        Ok(out)
    }

    /// Case-insensitive key used by the store.
    pub fn storage_key(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root_scope())?;
        if let Some(ns) = &self.provider_namespace {
            write!(f, "/{PROVIDERS}/{ns}")?;
            for t in &self.types {
                write!(f, "/{}/{}", t.type_name, t.name)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for ResourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.storage_key() == other.storage_key()
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.storage_key().hash(state);
    }
}

/// Case-insensitive comparison of two resource type strings.
pub fn is_same_type(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

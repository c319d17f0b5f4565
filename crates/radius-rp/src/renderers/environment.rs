// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Environment and application renderers.

use radius_core::datamodel::{AnyResource, ComputedValueReference};

use super::{RenderOptions, Renderer, RendererOutput, invalid_model};
use crate::error::{ClientError, Result};

/// Computed value holding an application's namespace.
pub const NAMESPACE: &str = "namespace";

/// Renders `Applications.Core/environments`. Environments deploy nothing.
#[derive(Debug, Default)]
pub struct EnvironmentRenderer;

impl Renderer for EnvironmentRenderer {
    fn render(&self, resource: &AnyResource, _options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::Environment(env) = resource else {
            return Err(invalid_model());
        };
        if env.properties.compute.namespace.is_empty() {
            return Err(ClientError::bad_request("compute.namespace must be specified").into());
        }
        Ok(RendererOutput::default())
    }
}

/// Renders `Applications.Core/applications`.
///
/// An application deploys nothing itself but resolves the namespace its
/// resources use: the `kubernetesNamespace` extension when set, otherwise
/// `{environment namespace}-{application name}`.
#[derive(Debug, Default)]
pub struct ApplicationRenderer;

impl Renderer for ApplicationRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::Application(app) = resource else {
            return Err(invalid_model());
        };
        let namespace = match app.properties.kubernetes_namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => format!("{}-{}", options.namespace, app.name()).to_ascii_lowercase(),
        };

        let mut output = RendererOutput::default();
        output
            .computed_values
            .insert(NAMESPACE.to_string(), ComputedValueReference::value(namespace));
        Ok(output)
    }
}

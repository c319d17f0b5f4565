// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RabbitMQ queue and extender renderers.

use radius_core::datamodel::datastores::values;
use radius_core::datamodel::messaging::QUEUE;
use radius_core::datamodel::{AnyResource, ComputedValueReference, ResourceProperties};
use serde_json::Value;

use super::{
    RenderOptions, Renderer, RendererOutput, application_name, invalid_model, recipe_data,
    secret_values,
};
use crate::error::{ClientError, Result};

/// Renders `Applications.Messaging/rabbitMQQueues`.
#[derive(Debug, Default)]
pub struct RabbitMqQueueRenderer;

impl Renderer for RabbitMqQueueRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::RabbitMqQueue(r) = resource else {
            return Err(invalid_model());
        };
        let props = &r.properties;
        application_name(&props.basic.application)?;

        if let Some(recipe) = props.recipe() {
            return Ok(RendererOutput {
                recipe_data: Some(recipe_data(recipe)),
                ..Default::default()
            });
        }

        let queue = props
            .queue
            .as_deref()
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ClientError::bad_request("queue name must be specified"))?;

        let mut output = RendererOutput::default();
        output
            .computed_values
            .insert(QUEUE.to_string(), ComputedValueReference::value(queue));
        let optional: [(&str, Option<Value>); 5] = [
            (values::HOST, props.host.clone().map(Into::into)),
            (values::PORT, props.port.map(Into::into)),
            ("vHost", props.vhost.clone().map(Into::into)),
            (values::USERNAME, props.username.clone().map(Into::into)),
            ("tls", props.tls.map(Into::into)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                output
                    .computed_values
                    .insert(key.to_string(), ComputedValueReference::Value(value));
            }
        }
        secret_values(&r.tracked.resource_type, r.name(), options, &props.secrets, &mut output);
        Ok(output)
    }
}

/// Renders `Applications.Core/extenders`.
///
/// Every additional property becomes a computed value.
#[derive(Debug, Default)]
pub struct ExtenderRenderer;

impl Renderer for ExtenderRenderer {
    fn render(&self, resource: &AnyResource, options: &RenderOptions) -> Result<RendererOutput> {
        let AnyResource::Extender(r) = resource else {
            return Err(invalid_model());
        };
        let props = &r.properties;
        application_name(&props.basic.application)?;

        if let Some(recipe) = props.recipe() {
            return Ok(RendererOutput {
                recipe_data: Some(recipe_data(recipe)),
                ..Default::default()
            });
        }

        let mut output = RendererOutput::default();
        for (key, value) in &props.additional_properties {
            output
                .computed_values
                .insert(key.clone(), ComputedValueReference::Value(value.clone()));
        }
        secret_values(&r.tracked.resource_type, r.name(), options, &props.secrets, &mut output);
        Ok(output)
    }
}

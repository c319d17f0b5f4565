// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource verbs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use radius_core::ResourceId;
use radius_core::datamodel::{AnyResource, ProvisioningState, SystemData};
use radius_core::store::{Object, Query, QueryOptions, StorageClient};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::{
    AZURE_ASYNC_OPERATION, ArmRequestContext, ControllerResponse, check_preconditions,
    ensure_terminal, is_async_type, load_resource,
};
use crate::api::v20231001preview::{
    resource_from_datamodel, resource_to_datamodel, secrets_to_versioned, supports_secrets,
};
use crate::asyncop::{
    DEFAULT_RETRY_AFTER_SECS, OperationMethod, OperationType, StatusManager, operation_result_id,
};
use crate::deployment::{DeploymentProcessor, ResourceData, reconcile};
use crate::error::{ClientError, Result};

/// CreateOrUpdate, Get, Delete, List and ListSecrets for every resource type.
pub struct ResourceController {
    storage: Arc<dyn StorageClient>,
    processor: Arc<dyn DeploymentProcessor>,
    status: Arc<StatusManager>,
    async_operation_timeout: Duration,
    default_page_size: usize,
}

impl ResourceController {
    /// Create the controller.
    pub fn new(
        storage: Arc<dyn StorageClient>,
        processor: Arc<dyn DeploymentProcessor>,
        status: Arc<StatusManager>,
        async_operation_timeout: Duration,
        default_page_size: usize,
    ) -> Self {
        Self {
            storage,
            processor,
            status,
            async_operation_timeout,
            default_page_size,
        }
    }

    /// `GET {type}/{name}`.
    pub async fn get(&self, ctx: &ArmRequestContext) -> Result<ControllerResponse> {
        let (resource, etag) = self.require(ctx).await?;
        Ok(ControllerResponse::json(StatusCode::OK, resource_from_datamodel(&resource)?).with_etag(&etag))
    }

    /// `GET {type}`.
    pub async fn list(&self, ctx: &ArmRequestContext) -> Result<ControllerResponse> {
        let query = Query {
            root_scope: ctx.root_scope.clone(),
            resource_type: ctx.resource_type.clone(),
            scope_recursive: false,
        };
        let options = QueryOptions {
            pagination_token: ctx.skip_token.clone(),
            max_item_count: Some(ctx.page_size(self.default_page_size)),
        };
        let page = self.storage.query(&query, &options).await?;

        let mut value = Vec::with_capacity(page.items.len());
        for object in page.items {
            let resource = AnyResource::from_value(&ctx.resource_type, object.data)?;
            value.push(resource_from_datamodel(&resource)?);
        }

        let has_items = !value.is_empty();
        let mut body = json!({ ("value"): value });
        if has_items
            && let Some(token) = page.pagination_token.as_deref().filter(|t| !t.is_empty())
        {
            body["nextLink"] = json!(ctx.next_link(token));
        }
        Ok(ControllerResponse::json(StatusCode::OK, body))
    }

    /// `PUT` or `PATCH {type}/{name}`.
    #[instrument(skip(self, ctx, body), fields(resource_id = %ctx.resource_id, method = %ctx.operation_type.method.as_str()))]
    pub async fn create_or_update(&self, ctx: &ArmRequestContext, body: Value) -> Result<ControllerResponse> {
        let id = ResourceId::parse(&ctx.resource_id)?;
        let mut resource = resource_to_datamodel(&ctx.resource_type, body)?;

        let old = load_resource(self.storage.as_ref(), &ctx.resource_id, &ctx.resource_type).await?;
        if ctx.operation_type.method == OperationMethod::Patch && old.is_none() {
            return Err(ClientError::not_found(&ctx.resource_id).into());
        }
        check_preconditions(ctx, old.as_ref().map(|(_, etag)| etag.as_str()))?;
        if let Some((old, _)) = &old {
            ensure_terminal(old)?;
            let old_application = &old.basic().application;
            if !old_application.is_empty()
                && !old_application.eq_ignore_ascii_case(&resource.basic().application)
            {
                return Err(ClientError::bad_request(
                    "Updating a resource's application is not allowed",
                )
                .with_target(&ctx.resource_id)
                .into());
            }
        }
        stamp(ctx, &id, &mut resource, old.as_ref().map(|(r, _)| r));

        let old_etag = old.as_ref().map(|(_, etag)| etag.clone());
        if is_async_type(&ctx.resource_type) {
            self.accept_create_or_update(ctx, resource, old_etag).await
        } else {
            self.deploy_inline(ctx, resource, old_etag).await
        }
    }

    async fn deploy_inline(
        &self,
        ctx: &ArmRequestContext,
        mut resource: AnyResource,
        old_etag: Option<String>,
    ) -> Result<ControllerResponse> {
        reconcile(self.processor.as_ref(), &mut resource).await?;
        resource.set_provisioning_state(ProvisioningState::Succeeded);

        let mut object = Object::new(&ctx.resource_id, resource.to_value()?);
        self.storage.save(&mut object, old_etag.as_deref()).await?;
        info!(resource_id = %ctx.resource_id, etag = %object.metadata.etag, "resource saved");

        Ok(ControllerResponse::json(StatusCode::OK, resource_from_datamodel(&resource)?)
            .with_etag(&object.metadata.etag))
    }

    async fn accept_create_or_update(
        &self,
        ctx: &ArmRequestContext,
        mut resource: AnyResource,
        old_etag: Option<String>,
    ) -> Result<ControllerResponse> {
        let secrets = resource.secrets_mut().cloned().unwrap_or_default();
        resource.set_provisioning_state(ProvisioningState::Accepted);

        let mut object = Object::new(&ctx.resource_id, resource.to_value()?);
        self.storage.save(&mut object, old_etag.as_deref()).await?;

        let operation_type = OperationType::new(&ctx.resource_type, ctx.operation_type.method);
        let operation = self.queue(ctx, operation_type, secrets).await;
        let operation = match operation {
            Ok(operation) => operation,
            Err(e) => {
                self.mark_failed(&ctx.resource_id, &ctx.resource_type).await;
                return Err(e);
            }
        };

        let status = if old_etag.is_some() {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        Ok(self
            .accepted_response(ctx, status, Some(resource_from_datamodel(&resource)?), &operation)
            .with_etag(&object.metadata.etag))
    }

    /// `DELETE {type}/{name}`.
    #[instrument(skip(self, ctx), fields(resource_id = %ctx.resource_id))]
    pub async fn delete(&self, ctx: &ArmRequestContext) -> Result<ControllerResponse> {
        let Some((mut resource, etag)) =
            load_resource(self.storage.as_ref(), &ctx.resource_id, &ctx.resource_type).await?
        else {
            debug!(resource_id = %ctx.resource_id, "resource already absent");
            return Ok(ControllerResponse::empty(StatusCode::NO_CONTENT));
        };
        check_preconditions(ctx, Some(&etag))?;
        ensure_terminal(&resource)?;

        if is_async_type(&ctx.resource_type) {
            resource.set_provisioning_state(ProvisioningState::Deleting);
            let mut object = Object::new(&ctx.resource_id, resource.to_value()?);
            self.storage.save(&mut object, Some(&etag)).await?;

            let operation_type = OperationType::new(&ctx.resource_type, OperationMethod::Delete);
            let operation = match self.queue(ctx, operation_type, BTreeMap::new()).await {
                Ok(operation) => operation,
                Err(e) => {
                    self.mark_failed(&ctx.resource_id, &ctx.resource_type).await;
                    return Err(e);
                }
            };
            return Ok(self.accepted_response(ctx, StatusCode::ACCEPTED, None, &operation));
        }

        if let Err(e) = self
            .processor
            .delete(&ResourceData::from_resource(&resource))
            .await
        {
            self.mark_failed(&ctx.resource_id, &ctx.resource_type).await;
            return Err(e);
        }
        match self.storage.delete(&ctx.resource_id, Some(&etag)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                if e.is_concurrency() {
                    warn!(resource_id = %ctx.resource_id, "resource changed during delete, keeping the newer version");
                }
                return Err(e.into());
            }
        }
        info!(resource_id = %ctx.resource_id, "resource deleted");
        Ok(ControllerResponse::empty(StatusCode::OK))
    }

    /// `POST {type}/{name}/listSecrets`.
    ///
    /// Secrets are read from their source on every call.
    pub async fn list_secrets(&self, ctx: &ArmRequestContext) -> Result<ControllerResponse> {
        if !supports_secrets(&ctx.resource_type) {
            return Err(ClientError::not_found(&ctx.resource_id).into());
        }
        let (resource, _) = self.require(ctx).await?;
        let secrets = self
            .processor
            .fetch_secrets(&ResourceData::from_resource(&resource))
            .await?;
        Ok(ControllerResponse::json(
            StatusCode::OK,
            secrets_to_versioned(&ctx.resource_type, secrets)?,
        ))
    }

    async fn require(&self, ctx: &ArmRequestContext) -> Result<(AnyResource, String)> {
        load_resource(self.storage.as_ref(), &ctx.resource_id, &ctx.resource_type)
            .await?
            .ok_or_else(|| ClientError::not_found(&ctx.resource_id).into())
    }

    async fn queue(
        &self,
        ctx: &ArmRequestContext,
        operation_type: OperationType,
        secrets: BTreeMap<String, String>,
    ) -> Result<QueuedOperation> {
        let status = self
            .status
            .queue_async_operation(
                &ctx.resource_id,
                operation_type,
                &ctx.api_version,
                secrets,
                self.async_operation_timeout,
            )
            .await?;
        let result_id = operation_result_id(&ctx.resource_id, self.status.location(), &status.name)?;
        Ok(QueuedOperation {
            status_id: status.id,
            result_id,
        })
    }

    fn accepted_response(
        &self,
        ctx: &ArmRequestContext,
        status: StatusCode,
        body: Option<Value>,
        operation: &QueuedOperation,
    ) -> ControllerResponse {
        let response = match body {
            Some(body) => ControllerResponse::json(status, body),
            None => ControllerResponse::empty(status),
        };
        response
            .with_header(AZURE_ASYNC_OPERATION, &ctx.absolute_url(&operation.status_id))
            .with_header(header::LOCATION, &ctx.absolute_url(&operation.result_id))
            .with_header(header::RETRY_AFTER, &DEFAULT_RETRY_AFTER_SECS.to_string())
    }

    /// Leave a resource whose operation could not start in a terminal state.
    async fn mark_failed(&self, resource_id: &str, resource_type: &str) {
        if let Err(e) = self.try_mark_failed(resource_id, resource_type).await {
            warn!(resource_id = %resource_id, error = %e, "failed to mark resource as failed");
        }
    }

    async fn try_mark_failed(&self, resource_id: &str, resource_type: &str) -> Result<()> {
        let Some((mut resource, etag)) =
            load_resource(self.storage.as_ref(), resource_id, resource_type).await?
        else {
            return Ok(());
        };
        resource.set_provisioning_state(ProvisioningState::Failed);
        let mut object = Object::new(resource_id, resource.to_value()?);
        self.storage.save(&mut object, Some(&etag)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ResourceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceController")
            .field("async_operation_timeout", &self.async_operation_timeout)
            .field("default_page_size", &self.default_page_size)
            .finish_non_exhaustive()
    }
}

struct QueuedOperation {
    status_id: String,
    result_id: String,
}

/// Fill identity, API versions and audit data from the route and the stored
/// document. Deployment facts of the stored document are kept so the next
/// deployment can clean up what it no longer produces.
fn stamp(ctx: &ArmRequestContext, id: &ResourceId, resource: &mut AnyResource, old: Option<&AnyResource>) {
    let tracked = resource.tracked_mut();
    tracked.id = id.to_string();
    tracked.name = id.name().to_string();

    let internal = resource.internal_mut();
    internal.updated_api_version = ctx.api_version.clone();
    internal.created_api_version = old
        .map(|o| o.internal().created_api_version.clone())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| ctx.api_version.clone());

    let incoming = SystemData::modified_now(None);
    *resource.system_data_mut() = match old {
        Some(old) => SystemData::merge(old.system_data(), &incoming),
        None => incoming,
    };

    if let Some(old) = old {
        resource.basic_mut().status = old.basic().status.clone();
        *resource.resource_metadata_mut() = old.resource_metadata().clone();
    }
}

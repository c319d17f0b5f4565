// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation status and result polling.

use std::sync::Arc;

use axum::http::{StatusCode, header};

use super::{ArmRequestContext, ControllerResponse};
use crate::asyncop::StatusManager;
use crate::error::{ClientError, Result};

const STATUSES: &str = "operationStatuses";
const RESULTS: &str = "operationResults";

/// Serves `operationStatuses` and `operationResults`.
pub struct OperationController {
    status: Arc<StatusManager>,
}

impl OperationController {
    /// Create the controller.
    pub fn new(status: Arc<StatusManager>) -> Self {
        Self { status }
    }

    /// `GET .../locations/{location}/operationStatuses/{operationId}`.
    pub async fn get_status(&self, ctx: &ArmRequestContext) -> Result<ControllerResponse> {
        let status = self.lookup(&ctx.resource_id).await?;
        let mut response = ControllerResponse::json(StatusCode::OK, status.to_response());
        if !status.status.is_terminal() {
            response = response.with_header(header::RETRY_AFTER, &status.retry_after.to_string());
        }
        Ok(response)
    }

    /// `GET .../locations/{location}/operationResults/{operationId}`.
    ///
    /// 202 with a `Location` to poll while the operation runs, 204 once it
    /// has finished.
    pub async fn get_result(&self, ctx: &ArmRequestContext) -> Result<ControllerResponse> {
        let status_id = replace_collection(&ctx.resource_id, RESULTS, STATUSES)
            .ok_or_else(|| ClientError::not_found(&ctx.resource_id))?;
        let status = self.lookup(&status_id).await?;
        if status.status.is_terminal() {
            return Ok(ControllerResponse::empty(StatusCode::NO_CONTENT));
        }
        Ok(ControllerResponse::empty(StatusCode::ACCEPTED)
            .with_header(header::LOCATION, &ctx.absolute_url(&ctx.resource_id))
            .with_header(header::RETRY_AFTER, &status.retry_after.to_string()))
    }

    async fn lookup(&self, status_id: &str) -> Result<crate::asyncop::OperationStatus> {
        match self.status.get(status_id).await {
            Ok(status) => Ok(status),
            Err(e) if e.is_not_found() => Err(ClientError::not_found(status_id).into()),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for OperationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationController")
            .field("status", &self.status)
            .finish()
    }
}

/// Swap the `from` collection segment of an operation ID for `to`.
fn replace_collection(id: &str, from: &str, to: &str) -> Option<String> {
    let mut found = false;
    let segments: Vec<&str> = id
        .split('/')
        .map(|segment| {
            if !found && segment.eq_ignore_ascii_case(from) {
                found = true;
                to
            } else {
                segment
            }
        })
        .collect();
    found.then(|| segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asyncop::{InMemoryQueue, OperationMethod, OperationType};
    use chrono::Utc;
    use radius_core::ResourceId;
    use radius_core::datamodel::ProvisioningState;
    use radius_core::store::MemoryStorageClient;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const REDIS_ID: &str =
        "/planes/radius/local/resourceGroups/rg/providers/Applications.Datastores/redisCaches/redis0";

    fn ctx_for(id: &str) -> ArmRequestContext {
        let mut ctx = ArmRequestContext::for_resource(
            &ResourceId::parse(REDIS_ID).unwrap(),
            "2023-10-01-preview",
            OperationMethod::Get,
        );
        ctx.resource_id = id.to_string();
        ctx
    }

    #[test]
    fn test_replace_collection() {
        assert_eq!(
            replace_collection("/x/locations/global/operationresults/op", RESULTS, STATUSES).as_deref(),
            Some("/x/locations/global/operationStatuses/op")
        );
        assert!(replace_collection("/x/locations/global/op", RESULTS, STATUSES).is_none());
    }

    #[tokio::test]
    async fn test_status_and_result_polling() {
        let storage = Arc::new(MemoryStorageClient::new());
        let manager = Arc::new(StatusManager::new(
            storage,
            Arc::new(InMemoryQueue::new()),
            "global",
        ));
        let controller = OperationController::new(manager.clone());
        let status = manager
            .queue_async_operation(
                REDIS_ID,
                OperationType::new("Applications.Datastores/redisCaches", OperationMethod::Put),
                "2023-10-01-preview",
                BTreeMap::new(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let result_id = status.id.replace("operationStatuses", "operationResults");

        let response = controller.get_status(&ctx_for(&status.id)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_ref().unwrap()["status"], "Accepted");
        assert_eq!(response.header("retry-after"), Some("60"));

        let response = controller.get_result(&ctx_for(&result_id)).await.unwrap();
        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert!(response.header("location").unwrap().starts_with(&result_id));

        manager
            .update(&status.id, ProvisioningState::Succeeded, Some(Utc::now()), None)
            .await
            .unwrap();
        let response = controller.get_result(&ctx_for(&result_id)).await.unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);

        let missing = status.id.replace(&status.name, "missing");
        let err = controller.get_status(&ctx_for(&missing)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation status records.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use radius_core::ResourceId;
use radius_core::datamodel::ProvisioningState;
use radius_core::store::{Object, StorageClient};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use super::queue::Queue;
use super::{OperationRequest, OperationType};
use crate::error::{ClientError, ErrorDetails, Result};

/// Seconds a client should wait between polls.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

fn operation_id_for(
    resource_id: &str,
    location: &str,
    collection: &str,
    operation_id: &str,
) -> Result<String> {
    let id = ResourceId::parse(resource_id)?;
    let namespace = id.provider_namespace().ok_or_else(|| {
        ClientError::bad_request(format!("{resource_id} does not name a provider resource"))
    })?;
    Ok(format!(
        "{}/providers/{namespace}/locations/{location}/{collection}/{operation_id}",
        id.root_scope()
    ))
}

/// `{rootScope}/providers/{ns}/locations/{location}/operationStatuses/{operationId}`.
pub fn operation_status_id(resource_id: &str, location: &str, operation_id: &str) -> Result<String> {
    operation_id_for(resource_id, location, "operationStatuses", operation_id)
}

/// `{rootScope}/providers/{ns}/locations/{location}/operationResults/{operationId}`.
pub fn operation_result_id(resource_id: &str, location: &str, operation_id: &str) -> Result<String> {
    operation_id_for(resource_id, location, "operationResults", operation_id)
}

/// State of one async operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    /// Status ID.
    pub id: String,
    /// Operation ID.
    pub name: String,
    /// Current state.
    pub status: ProvisioningState,
    /// When the operation was accepted.
    pub start_time: DateTime<Utc>,
    /// When the operation reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Last change.
    pub last_updated_time: DateTime<Utc>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Operation type.
    pub operation_type: OperationType,
    /// Target resource.
    pub resource_id: String,
    /// Suggested polling interval in seconds.
    pub retry_after: u64,
}

impl OperationStatus {
    /// ARM wire shape.
    pub fn to_response(&self) -> Value {
        let mut body = json!({
            ("id"): self.id,
            ("name"): self.name,
            ("status"): self.status,
            ("startTime"): self.start_time,
        });
        if let Some(end_time) = self.end_time {
            body["endTime"] = json!(end_time);
        }
        if let Some(error) = &self.error {
            body["error"] = json!(error);
        }
        body
    }
}

/// Creates, reads and updates operation statuses.
pub struct StatusManager {
    storage: Arc<dyn StorageClient>,
    queue: Arc<dyn Queue>,
    location: String,
}

impl StatusManager {
    /// Create a status manager writing to `storage` and enqueueing on `queue`.
    pub fn new(storage: Arc<dyn StorageClient>, queue: Arc<dyn Queue>, location: impl Into<String>) -> Self {
        Self {
            storage,
            queue,
            location: location.into(),
        }
    }

    /// Location segment of status IDs.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Status ID of an operation on `resource_id`.
    pub fn status_id(&self, resource_id: &str, operation_id: &str) -> Result<String> {
        operation_status_id(resource_id, &self.location, operation_id)
    }

    /// Record a new operation and queue it.
    ///
    /// The status is removed again when the queue rejects the request.
    pub async fn queue_async_operation(
        &self,
        resource_id: &str,
        operation_type: OperationType,
        api_version: &str,
        secrets: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<OperationStatus> {
        let operation_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = OperationStatus {
            id: self.status_id(resource_id, &operation_id)?,
            name: operation_id.clone(),
            status: ProvisioningState::Accepted,
            start_time: now,
            end_time: None,
            last_updated_time: now,
            error: None,
            operation_type: operation_type.clone(),
            resource_id: resource_id.to_string(),
            retry_after: DEFAULT_RETRY_AFTER_SECS,
        };
        let mut object = Object::from_model(&status.id, &status)?;
        self.storage.save(&mut object, None).await?;

        let request = OperationRequest {
            operation_id,
            operation_type,
            resource_id: resource_id.to_string(),
            api_version: api_version.to_string(),
            timeout,
            secrets,
        };
        if let Err(e) = self.queue.enqueue(request).await {
            warn!(status_id = %status.id, error = %e, "failed to queue operation, removing status");
            if let Err(delete_err) = self.storage.delete(&status.id, None).await {
                warn!(status_id = %status.id, error = %delete_err, "failed to remove operation status");
            }
            return Err(e.into());
        }
        debug!(status_id = %status.id, operation_type = %status.operation_type, "operation queued");
        Ok(status)
    }

    /// Read a status by ID.
    pub async fn get(&self, status_id: &str) -> Result<OperationStatus> {
        Ok(self.storage.get(status_id).await?.as_model()?)
    }

    /// Move a status to `state`.
    pub async fn update(
        &self,
        status_id: &str,
        state: ProvisioningState,
        end_time: Option<DateTime<Utc>>,
        error: Option<ErrorDetails>,
    ) -> Result<()> {
        let object = self.storage.get(status_id).await?;
        let mut status: OperationStatus = object.as_model()?;
        status.status = state;
        status.last_updated_time = Utc::now();
        if end_time.is_some() {
            status.end_time = end_time;
        }
        if error.is_some() {
            status.error = error;
        }
        let mut updated = Object::from_model(status_id, &status)?;
        self.storage
            .save(&mut updated, Some(&object.metadata.etag))
            .await?;
        Ok(())
    }

    /// Remove a status.
    pub async fn delete(&self, status_id: &str) -> Result<()> {
        Ok(self.storage.delete(status_id, None).await?)
    }
}

impl std::fmt::Debug for StatusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusManager")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

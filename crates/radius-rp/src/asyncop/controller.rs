// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Controllers run by the async worker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use radius_core::ResourceId;
use radius_core::datamodel::{AnyResource, ProvisioningState};
use radius_core::store::{Object, StorageClient};
use tracing::{debug, info, instrument};

use super::{OperationMethod, OperationRequest, OperationType};
use crate::deployment::{DeploymentProcessor, ResourceData, reconcile};
use crate::error::Result;

/// Outcome of a controller run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationResult {
    /// Run the operation again later instead of finishing it.
    pub requeue: bool,
}

impl OperationResult {
    /// The operation is done.
    pub fn completed() -> Self {
        Self { requeue: false }
    }

    /// The operation must run again.
    pub fn requeue() -> Self {
        Self { requeue: true }
    }
}

/// Runs one kind of async operation.
#[async_trait]
pub trait AsyncController: Send + Sync {
    /// Run the operation. An error fails the operation.
    async fn run(&self, request: &OperationRequest) -> Result<OperationResult>;
}

async fn load_resource(
    storage: &dyn StorageClient,
    resource_id: &str,
) -> Result<(AnyResource, String)> {
    let object = storage.get(resource_id).await?;
    let resource_type = ResourceId::parse(resource_id)?.resource_type();
    let resource = AnyResource::from_value(&resource_type, object.data)?;
    Ok((resource, object.metadata.etag))
}

/// Deploys a resource and records the deployment on it.
pub struct CreateOrUpdateController {
    storage: Arc<dyn StorageClient>,
    processor: Arc<dyn DeploymentProcessor>,
}

impl CreateOrUpdateController {
    /// Create the controller.
    pub fn new(storage: Arc<dyn StorageClient>, processor: Arc<dyn DeploymentProcessor>) -> Self {
        Self { storage, processor }
    }
}

#[async_trait]
impl AsyncController for CreateOrUpdateController {
    #[instrument(skip(self, request), fields(resource_id = %request.resource_id, operation_id = %request.operation_id))]
    async fn run(&self, request: &OperationRequest) -> Result<OperationResult> {
        let (mut resource, etag) = load_resource(self.storage.as_ref(), &request.resource_id).await?;
        if let Some(secrets) = resource.secrets_mut() {
            secrets.extend(request.secrets.clone());
        }

        reconcile(self.processor.as_ref(), &mut resource).await?;
        resource.set_provisioning_state(ProvisioningState::Succeeded);

        let mut object = Object::new(&request.resource_id, resource.to_value()?);
        match self.storage.save(&mut object, Some(&etag)).await {
            Ok(()) => {
                info!(resource_id = %request.resource_id, "resource deployed");
                Ok(OperationResult::completed())
            }
            // The document changed while deploying; run again on the new version.
            Err(e) if e.is_concurrency() => {
                debug!(resource_id = %request.resource_id, "resource changed during deployment");
                Ok(OperationResult::requeue())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for CreateOrUpdateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateOrUpdateController").finish_non_exhaustive()
    }
}

/// Tears down the output resources of a resource, then removes it.
pub struct DeleteController {
    storage: Arc<dyn StorageClient>,
    processor: Arc<dyn DeploymentProcessor>,
}

impl DeleteController {
    /// Create the controller.
    pub fn new(storage: Arc<dyn StorageClient>, processor: Arc<dyn DeploymentProcessor>) -> Self {
        Self { storage, processor }
    }
}

#[async_trait]
impl AsyncController for DeleteController {
    #[instrument(skip(self, request), fields(resource_id = %request.resource_id, operation_id = %request.operation_id))]
    async fn run(&self, request: &OperationRequest) -> Result<OperationResult> {
        let (resource, etag) = match load_resource(self.storage.as_ref(), &request.resource_id).await {
            Ok(loaded) => loaded,
            Err(crate::error::Error::Store(e)) if e.is_not_found() => {
                debug!(resource_id = %request.resource_id, "resource already deleted");
                return Ok(OperationResult::completed());
            }
            Err(e) => return Err(e),
        };

        self.processor
            .delete(&ResourceData::from_resource(&resource))
            .await?;
        match self.storage.delete(&request.resource_id, Some(&etag)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            // Tear down the newer version on the next run.
            Err(e) if e.is_concurrency() => {
                debug!(resource_id = %request.resource_id, "resource changed during delete");
                return Ok(OperationResult::requeue());
            }
            Err(e) => return Err(e.into()),
        }
        info!(resource_id = %request.resource_id, "resource deleted");
        Ok(OperationResult::completed())
    }
}

impl std::fmt::Debug for DeleteController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteController").finish_non_exhaustive()
    }
}

/// Controllers keyed by operation type.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<OperationType, Arc<dyn AsyncController>>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with create/update and delete controllers for every type in
    /// `resource_types`.
    pub fn with_resource_types(
        resource_types: &[&str],
        storage: Arc<dyn StorageClient>,
        processor: Arc<dyn DeploymentProcessor>,
    ) -> Self {
        let put: Arc<dyn AsyncController> =
            Arc::new(CreateOrUpdateController::new(storage.clone(), processor.clone()));
        let delete: Arc<dyn AsyncController> = Arc::new(DeleteController::new(storage, processor));

        let mut registry = Self::new();
        for resource_type in resource_types {
            registry.register(OperationType::new(resource_type, OperationMethod::Put), put.clone());
            registry.register(OperationType::new(resource_type, OperationMethod::Patch), put.clone());
            registry.register(
                OperationType::new(resource_type, OperationMethod::Delete),
                delete.clone(),
            );
        }
        registry
    }

    /// Register a controller, replacing any previous one for the type.
    pub fn register(&mut self, operation_type: OperationType, controller: Arc<dyn AsyncController>) {
        self.controllers.insert(operation_type, controller);
    }

    /// Controller for an operation type.
    pub fn get(&self, operation_type: &OperationType) -> Option<Arc<dyn AsyncController>> {
        self.controllers.get(operation_type).cloned()
    }

    /// Number of registered operation types.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.controllers.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("ControllerRegistry").field("types", &types).finish()
    }
}

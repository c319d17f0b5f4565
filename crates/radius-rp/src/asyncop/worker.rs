// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Async operation worker.
//!
//! Polls the queue, runs the controller for each message with bounded
//! parallelism and records the outcome on the operation status and on the
//! resource.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use radius_core::ResourceId;
use radius_core::datamodel::{AnyResource, ProvisioningState};
use radius_core::store::{Object, StorageClient};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use super::controller::ControllerRegistry;
use super::queue::{Queue, QueueMessage};
use super::status::StatusManager;
use super::OperationMethod;
use crate::error::{ErrorDetails, Result, codes};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct AsyncWorkerConfig {
    /// Operations processed at once.
    pub max_operation_concurrency: usize,
    /// Dequeue count after which an operation is failed without running.
    pub max_operation_retry_count: u32,
    /// Pause between queue polls.
    pub dequeue_interval: Duration,
}

impl Default for AsyncWorkerConfig {
    fn default() -> Self {
        Self {
            max_operation_concurrency: 10,
            max_operation_retry_count: 3,
            dequeue_interval: Duration::from_millis(200),
        }
    }
}

struct Inner {
    queue: Arc<dyn Queue>,
    status: Arc<StatusManager>,
    storage: Arc<dyn StorageClient>,
    registry: Arc<ControllerRegistry>,
    config: AsyncWorkerConfig,
}

/// Background task running queued operations.
pub struct AsyncWorker {
    inner: Arc<Inner>,
    permits: Arc<Semaphore>,
    shutdown: Arc<Notify>,
}

impl AsyncWorker {
    /// Create a worker.
    pub fn new(
        queue: Arc<dyn Queue>,
        status: Arc<StatusManager>,
        storage: Arc<dyn StorageClient>,
        registry: Arc<ControllerRegistry>,
        config: AsyncWorkerConfig,
    ) -> Self {
        let concurrency = config.max_operation_concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                queue,
                status,
                storage,
                registry,
                config,
            }),
            permits: Arc::new(Semaphore::new(concurrency)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run until shutdown is signalled, then wait for running operations.
    pub async fn run(self) {
        let config = &self.inner.config;
        info!(
            max_operation_concurrency = config.max_operation_concurrency,
            max_operation_retry_count = config.max_operation_retry_count,
            dequeue_interval_ms = config.dequeue_interval.as_millis() as u64,
            "Async worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!("Async worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(config.dequeue_interval) => {
                    self.dispatch().await;
                }
            }
        }

        let concurrency = config.max_operation_concurrency.max(1) as u32;
        if self.permits.acquire_many(concurrency).await.is_err() {
            warn!("Async worker semaphore closed while draining");
        }
        info!("Async worker stopped");
    }

    /// Start operations until the queue is empty or every slot is busy.
    async fn dispatch(&self) {
        loop {
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                debug!("All operation slots busy");
                return;
            };
            let message = match self.inner.queue.dequeue().await {
                Ok(Some(message)) => message,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "Failed to dequeue operation");
                    return;
                }
            };
            let inner = self.inner.clone();
            tokio::spawn(async move {
                inner.process(message).await;
                drop(permit);
            });
        }
    }
}

impl std::fmt::Debug for AsyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWorker")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Inner {
    #[instrument(skip(self, message), fields(message_id = %message.id, operation_type = %message.data.operation_type))]
    async fn process(&self, message: QueueMessage) {
        let request = &message.data;
        let status_id = match self
            .status
            .status_id(&request.resource_id, &request.operation_id)
        {
            Ok(id) => id,
            Err(e) => {
                error!(resource_id = %request.resource_id, error = %e, "Dropping operation for an invalid resource ID");
                self.finish(&message).await;
                return;
            }
        };

        let Some(controller) = self.registry.get(&request.operation_type) else {
            warn!(operation_type = %request.operation_type, "No controller for operation type, dropping message");
            self.finish(&message).await;
            return;
        };

        if message.dequeue_count > self.config.max_operation_retry_count {
            let error = ErrorDetails::new(
                codes::INTERNAL,
                format!(
                    "exceeded max retry count to process async operation message: {}",
                    message.dequeue_count
                ),
            );
            self.complete(&message, &status_id, ProvisioningState::Failed, Some(error))
                .await;
            return;
        }

        match self.status.get(&status_id).await {
            Ok(status) if status.status.is_terminal() => {
                debug!(status_id = %status_id, status = %status.status.as_str(), "Operation already completed");
                self.finish(&message).await;
                return;
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!(status_id = %status_id, "Operation status is gone, dropping message");
                self.finish(&message).await;
                return;
            }
            // Leave the message leased; it is redelivered when the lease runs out.
            Err(e) => {
                error!(status_id = %status_id, error = %e, "Failed to read operation status");
                return;
            }
        }

        let in_progress = match request.operation_type.method {
            OperationMethod::Delete => ProvisioningState::Deleting,
            _ => ProvisioningState::Updating,
        };
        if let Err(e) = self.start(&status_id, &request.resource_id, in_progress).await {
            error!(status_id = %status_id, error = %e, "Failed to mark operation in progress");
            return;
        }

        info!(
            operation_id = %request.operation_id,
            operation_type = %request.operation_type,
            resource_id = %request.resource_id,
            dequeue_count = message.dequeue_count,
            "Running async operation"
        );
        match tokio::time::timeout(request.timeout, controller.run(request)).await {
            Err(_) => {
                let error = ErrorDetails::new(
                    codes::OPERATION_CANCELED,
                    format!(
                        "Operation ({}) has timed out because it was processing longer than {} s.",
                        request.operation_type,
                        request.timeout.as_secs()
                    ),
                );
                warn!(operation_id = %request.operation_id, "Async operation timed out");
                self.complete(&message, &status_id, ProvisioningState::Canceled, Some(error))
                    .await;
            }
            Ok(Err(e)) => {
                warn!(operation_id = %request.operation_id, error = %e, "Async operation failed");
                self.complete(
                    &message,
                    &status_id,
                    ProvisioningState::Failed,
                    Some(e.to_operation_error()),
                )
                .await;
            }
            Ok(Ok(result)) if result.requeue => {
                debug!(operation_id = %request.operation_id, "Requeueing async operation");
                if let Err(e) = self.queue.requeue(&message).await {
                    error!(operation_id = %request.operation_id, error = %e, "Failed to requeue operation");
                }
            }
            Ok(Ok(_)) => {
                self.complete(&message, &status_id, ProvisioningState::Succeeded, None)
                    .await;
            }
        }
    }

    async fn start(&self, status_id: &str, resource_id: &str, state: ProvisioningState) -> Result<()> {
        self.status.update(status_id, state, None, None).await?;
        self.set_resource_state(resource_id, state).await
    }

    /// Record a terminal state and remove the message.
    ///
    /// A failed status write keeps the message leased so it is redelivered.
    async fn complete(
        &self,
        message: &QueueMessage,
        status_id: &str,
        state: ProvisioningState,
        error: Option<ErrorDetails>,
    ) {
        let request = &message.data;
        if state != ProvisioningState::Succeeded
            && let Err(e) = self.set_resource_state(&request.resource_id, state).await
        {
            warn!(resource_id = %request.resource_id, error = %e, "Failed to record resource state");
        }
        if let Err(e) = self
            .status
            .update(status_id, state, Some(Utc::now()), error)
            .await
        {
            error!(status_id = %status_id, error = %e, "Failed to complete operation status");
            return;
        }
        info!(
            operation_id = %request.operation_id,
            status = %state.as_str(),
            "Async operation completed"
        );
        self.finish(message).await;
    }

    /// Set the provisioning state of a stored resource, if it still exists.
    async fn set_resource_state(&self, resource_id: &str, state: ProvisioningState) -> Result<()> {
        let object = match self.storage.get(resource_id).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let resource_type = ResourceId::parse(resource_id)?.resource_type();
        let mut resource = AnyResource::from_value(&resource_type, object.data)?;
        if resource.provisioning_state() == state {
            return Ok(());
        }
        resource.set_provisioning_state(state);
        let mut updated = Object::new(resource_id, resource.to_value()?);
        self.storage
            .save(&mut updated, Some(&object.metadata.etag))
            .await?;
        Ok(())
    }

    async fn finish(&self, message: &QueueMessage) {
        if let Err(e) = self.queue.finish(message).await {
            error!(message_id = %message.id, error = %e, "Failed to finish queue message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asyncop::{
        AsyncController, InMemoryQueue, OperationResult, OperationRequest, OperationStatus,
        OperationType,
    };
    use crate::error::Error;
    use async_trait::async_trait;
    use radius_core::datamodel::{RedisCache, RedisCacheProperties, resource_types};
    use radius_core::store::MemoryStorageClient;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    const REDIS_ID: &str =
        "/planes/radius/local/resourceGroups/rg/providers/Applications.Datastores/redisCaches/redis0";

    enum Behavior {
        Succeed,
        Fail,
        Hang,
        RequeueOnce,
    }

    struct TestController {
        behavior: Behavior,
        runs: AtomicU32,
    }

    #[async_trait]
    impl AsyncController for TestController {
        async fn run(&self, _request: &OperationRequest) -> Result<OperationResult> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(OperationResult::completed()),
                Behavior::Fail => Err(Error::Other("deployment exploded".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(OperationResult::completed())
                }
                Behavior::RequeueOnce if run == 0 => Ok(OperationResult::requeue()),
                Behavior::RequeueOnce => Ok(OperationResult::completed()),
            }
        }
    }

    struct Harness {
        inner: Arc<Inner>,
        queue: Arc<InMemoryQueue>,
        storage: Arc<MemoryStorageClient>,
        controller: Arc<TestController>,
    }

    async fn harness(behavior: Behavior, method: OperationMethod) -> Harness {
        let storage = Arc::new(MemoryStorageClient::new());
        let queue = Arc::new(InMemoryQueue::new());
        let status = Arc::new(StatusManager::new(storage.clone(), queue.clone(), "global"));
        let controller = Arc::new(TestController {
            behavior,
            runs: AtomicU32::new(0),
        });
        let mut registry = ControllerRegistry::new();
        registry.register(
            OperationType::new(resource_types::REDIS_CACHES, method),
            controller.clone(),
        );

        let mut redis = RedisCache::new(
            &ResourceId::parse(REDIS_ID).unwrap(),
            RedisCacheProperties::default(),
        );
        redis.internal.async_provisioning_state = ProvisioningState::Accepted;
        let mut object = Object::from_model(REDIS_ID, &redis).unwrap();
        storage.save(&mut object, None).await.unwrap();

        Harness {
            inner: Arc::new(Inner {
                queue: queue.clone(),
                status,
                storage: storage.clone(),
                registry: Arc::new(registry),
                config: AsyncWorkerConfig {
                    max_operation_concurrency: 2,
                    max_operation_retry_count: 3,
                    dequeue_interval: Duration::from_millis(10),
                },
            }),
            queue,
            storage,
            controller,
        }
    }

    impl Harness {
        async fn accept(&self, method: OperationMethod, timeout: Duration) -> OperationStatus {
            self.inner
                .status
                .queue_async_operation(
                    REDIS_ID,
                    OperationType::new(resource_types::REDIS_CACHES, method),
                    "2023-10-01-preview",
                    BTreeMap::new(),
                    timeout,
                )
                .await
                .unwrap()
        }

        async fn process_next(&self) {
            let message = self.queue.dequeue().await.unwrap().unwrap();
            self.inner.process(message).await;
        }

        async fn status(&self, id: &str) -> OperationStatus {
            self.inner.status.get(id).await.unwrap()
        }

        async fn resource_state(&self) -> ProvisioningState {
            let object = self.storage.get(REDIS_ID).await.unwrap();
            AnyResource::from_value(resource_types::REDIS_CACHES, object.data)
                .unwrap()
                .provisioning_state()
        }
    }

    #[tokio::test]
    async fn test_success() {
        let h = harness(Behavior::Succeed, OperationMethod::Put).await;
        let accepted = h.accept(OperationMethod::Put, Duration::from_secs(60)).await;

        h.process_next().await;

        let status = h.status(&accepted.id).await;
        assert_eq!(status.status, ProvisioningState::Succeeded);
        assert!(status.end_time.is_some());
        assert!(status.error.is_none());
        // The controller owns the final resource write; the worker left it Updating.
        assert_eq!(h.resource_state().await, ProvisioningState::Updating);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_failure_marks_status_and_resource() {
        let h = harness(Behavior::Fail, OperationMethod::Put).await;
        let accepted = h.accept(OperationMethod::Put, Duration::from_secs(60)).await;

        h.process_next().await;

        let status = h.status(&accepted.id).await;
        assert_eq!(status.status, ProvisioningState::Failed);
        let error = status.error.unwrap();
        assert_eq!(error.code, codes::INTERNAL);
        assert!(!error.message.contains("exploded"), "{}", error.message);
        assert_eq!(h.resource_state().await, ProvisioningState::Failed);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_timeout_cancels() {
        let h = harness(Behavior::Hang, OperationMethod::Delete).await;
        let accepted = h
            .accept(OperationMethod::Delete, Duration::from_millis(20))
            .await;

        h.process_next().await;

        let status = h.status(&accepted.id).await;
        assert_eq!(status.status, ProvisioningState::Canceled);
        let error = status.error.unwrap();
        assert_eq!(error.code, codes::OPERATION_CANCELED);
        assert_eq!(
            error.message,
            "Operation (APPLICATIONS.DATASTORES/REDISCACHES|DELETE) has timed out because it was processing longer than 0 s."
        );
        assert_eq!(h.resource_state().await, ProvisioningState::Canceled);
    }

    #[tokio::test]
    async fn test_requeue_runs_again() {
        let h = harness(Behavior::RequeueOnce, OperationMethod::Put).await;
        let accepted = h.accept(OperationMethod::Put, Duration::from_secs(60)).await;

        h.process_next().await;
        assert_eq!(h.queue.len().await, 1);
        assert_eq!(h.status(&accepted.id).await.status, ProvisioningState::Updating);

        h.process_next().await;
        assert_eq!(h.controller.runs.load(Ordering::SeqCst), 2);
        assert_eq!(h.status(&accepted.id).await.status, ProvisioningState::Succeeded);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_exceeded_retry_count() {
        let h = harness(Behavior::Succeed, OperationMethod::Put).await;
        let accepted = h.accept(OperationMethod::Put, Duration::from_secs(60)).await;

        let mut message = h.queue.dequeue().await.unwrap().unwrap();
        message.dequeue_count = 4;
        h.inner.process(message).await;

        let status = h.status(&accepted.id).await;
        assert_eq!(status.status, ProvisioningState::Failed);
        assert_eq!(
            status.error.unwrap().message,
            "exceeded max retry count to process async operation message: 4"
        );
        assert_eq!(h.controller.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_terminal_status_is_not_rerun() {
        let h = harness(Behavior::Succeed, OperationMethod::Put).await;
        let accepted = h.accept(OperationMethod::Put, Duration::from_secs(60)).await;
        h.inner
            .status
            .update(&accepted.id, ProvisioningState::Canceled, Some(Utc::now()), None)
            .await
            .unwrap();

        h.process_next().await;

        assert_eq!(h.controller.runs.load(Ordering::SeqCst), 0);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_operation_type_is_dropped() {
        let h = harness(Behavior::Succeed, OperationMethod::Put).await;
        h.accept(OperationMethod::Patch, Duration::from_secs(60)).await;

        h.process_next().await;

        assert_eq!(h.controller.runs.load(Ordering::SeqCst), 0);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let h = harness(Behavior::Succeed, OperationMethod::Put).await;
        let accepted = h.accept(OperationMethod::Put, Duration::from_secs(60)).await;

        let worker = AsyncWorker {
            inner: h.inner.clone(),
            permits: Arc::new(Semaphore::new(2)),
            shutdown: Arc::new(Notify::new()),
        };
        let shutdown = worker.shutdown_handle();
        let handle = tokio::spawn(worker.run());

        let mut done = false;
        for _ in 0..200 {
            if h.status(&accepted.id).await.status == ProvisioningState::Succeeded {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(done, "operation did not complete");

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

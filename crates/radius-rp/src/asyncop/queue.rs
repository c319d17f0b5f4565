// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation queue.
//!
//! A dequeued message stays leased until it is finished or requeued. A
//! lease that runs out makes the message visible again, so an operation
//! whose worker died is picked up again with a higher dequeue count.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::OperationRequest;

/// Lease granted by [`InMemoryQueue::new`].
pub const DEFAULT_MESSAGE_LOCK: Duration = Duration::from_secs(300);

/// Errors returned by queues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The message is not leased by the caller.
    #[error("message {0} is not leased")]
    NotLeased(String),

    /// The queue backend rejected the call.
    #[error("queue is unavailable: {0}")]
    Unavailable(String),
}

/// Result type using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;

/// A queued operation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    /// Message ID.
    pub id: String,
    /// Times the message has been handed out, this delivery included.
    pub dequeue_count: u32,
    /// When the message was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// The operation to run.
    pub data: OperationRequest,
    #[serde(skip)]
    visible_at: Option<DateTime<Utc>>,
}

impl QueueMessage {
    /// Wrap a request in a fresh message.
    pub fn new(data: OperationRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dequeue_count: 0,
            enqueued_at: Utc::now(),
            data,
            visible_at: None,
        }
    }
}

/// Work queue consumed by the async worker.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Add a request.
    async fn enqueue(&self, request: OperationRequest) -> Result<()>;

    /// Lease the next visible message, if any.
    async fn dequeue(&self) -> Result<Option<QueueMessage>>;

    /// Remove a leased message for good.
    async fn finish(&self, message: &QueueMessage) -> Result<()>;

    /// Return a leased message to the queue, keeping its dequeue count.
    async fn requeue(&self, message: &QueueMessage) -> Result<()>;
}

/// In-process [`Queue`].
#[derive(Debug)]
pub struct InMemoryQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
    message_lock: Duration,
    fail_with: Option<String>,
}

impl InMemoryQueue {
    /// Create a queue with the default lease.
    pub fn new() -> Self {
        Self::with_message_lock(DEFAULT_MESSAGE_LOCK)
    }

    /// Create a queue whose leases last `message_lock`.
    pub fn with_message_lock(message_lock: Duration) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            message_lock,
            fail_with: None,
        }
    }

    /// A queue that rejects every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new()
        }
    }

    /// Number of messages, leased ones included.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// True when the queue holds no messages.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> Result<()> {
        match &self.fail_with {
            Some(message) => Err(QueueError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, request: OperationRequest) -> Result<()> {
        self.check()?;
        self.messages.lock().await.push_back(QueueMessage::new(request));
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>> {
        self.check()?;
        let now = Utc::now();
        let lease = chrono::Duration::from_std(self.message_lock)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        let mut messages = self.messages.lock().await;
        let Some(message) = messages
            .iter_mut()
            .find(|m| m.visible_at.is_none_or(|at| at <= now))
        else {
            return Ok(None);
        };
        message.dequeue_count += 1;
        message.visible_at = Some(now + lease);
        Ok(Some(message.clone()))
    }

    async fn finish(&self, message: &QueueMessage) -> Result<()> {
        self.check()?;
        let mut messages = self.messages.lock().await;
        let index = messages
            .iter()
            .position(|m| m.id == message.id)
            .ok_or_else(|| QueueError::NotLeased(message.id.clone()))?;
        messages.remove(index);
        Ok(())
    }

    async fn requeue(&self, message: &QueueMessage) -> Result<()> {
        self.check()?;
        let mut messages = self.messages.lock().await;
        let index = messages
            .iter()
            .position(|m| m.id == message.id)
            .ok_or_else(|| QueueError::NotLeased(message.id.clone()))?;
        // Move to the back so other operations get a turn first.
        if let Some(mut m) = messages.remove(index) {
            m.visible_at = None;
            messages.push_back(m);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asyncop::{OperationMethod, OperationType};

    fn request(name: &str) -> OperationRequest {
        OperationRequest {
            operation_id: Uuid::new_v4().to_string(),
            operation_type: OperationType::new(
                "Applications.Datastores/redisCaches",
                OperationMethod::Put,
            ),
            resource_id: format!(
                "/planes/radius/local/resourceGroups/rg/providers/Applications.Datastores/redisCaches/{name}"
            ),
            api_version: "2023-10-01-preview".to_string(),
            timeout: Duration::from_secs(60),
            secrets: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_dequeue_leases_in_order() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("a")).await.unwrap();
        queue.enqueue(request("b")).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        assert!(first.data.resource_id.ends_with("/a"));
        assert_eq!(first.dequeue_count, 1);

        let second = queue.dequeue().await.unwrap().unwrap();
        assert!(second.data.resource_id.ends_with("/b"));
        assert!(queue.dequeue().await.unwrap().is_none());

        queue.finish(&first).await.unwrap();
        queue.finish(&second).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_requeue_keeps_dequeue_count() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("a")).await.unwrap();

        let message = queue.dequeue().await.unwrap().unwrap();
        queue.requeue(&message).await.unwrap();
        let again = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(again.id, message.id);
        assert_eq!(again.dequeue_count, 2);
    }

    #[tokio::test]
    async fn test_expired_lease_is_redelivered() {
        let queue = InMemoryQueue::with_message_lock(Duration::ZERO);
        queue.enqueue(request("a")).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.dequeue_count, 2);
    }

    #[tokio::test]
    async fn test_finish_unknown_message() {
        let queue = InMemoryQueue::new();
        let message = QueueMessage::new(request("a"));
        assert!(matches!(
            queue.finish(&message).await,
            Err(QueueError::NotLeased(_))
        ));
    }

    #[tokio::test]
    async fn test_failing_queue() {
        let queue = InMemoryQueue::failing("broker down");
        let err = queue.enqueue(request("a")).await.unwrap_err();
        assert_eq!(err.to_string(), "queue is unavailable: broker down");
    }
}

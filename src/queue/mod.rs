//! The four queue operations the lease workflow needs, behind one trait.
//!
//! `SqsQueue` talks to Amazon SQS (or anything speaking its API);
//! `MemoryQueue` is an in-process stand-in for tests and offline runs.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{LeaseMessage, ReceiptHandle, ReceivedMessage};

pub mod memory;
pub mod sqs;

pub use memory::MemoryQueue;
pub use sqs::SqsQueue;

/// Resolved queue location. Opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueEndpoint(String);

impl QueueEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pass-through queue operations. Implementations never retry and only
/// distinguish success from failure, plus the two cases callers act on:
/// a queue that does not exist and a stale receipt handle.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Fails with `NotFound` for an unknown name and `Queue` on transport errors.
    async fn resolve_queue_url(&self, name: &str) -> Result<QueueEndpoint>;

    async fn send_message(&self, endpoint: &QueueEndpoint, message: &LeaseMessage) -> Result<()>;

    /// Returns up to `max_count` messages. Every returned message stays hidden
    /// from other receivers for `visibility_timeout`.
    async fn receive_messages(
        &self,
        endpoint: &QueueEndpoint,
        max_count: i32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>>;

    /// Fails with `InvalidReceipt` when the handle expired or was already used.
    async fn delete_message(&self, endpoint: &QueueEndpoint, receipt: &ReceiptHandle) -> Result<()>;
}

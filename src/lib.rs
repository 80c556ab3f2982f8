//! Simulated IP address pool backed by a FIFO message queue.
//!
//! Each available address sits on the queue as one message. Leasing an
//! address receives a message and deletes it; seeding publishes the
//! configured addresses.

pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod workflow;

pub use config::{AddressSource, AppConfig};
pub use error::{Error, Result};
pub use message::{IpKind, LeaseMessage, LeaseResult, ReceiptHandle, ReceivedMessage};
pub use queue::{MemoryQueue, QueueClient, QueueEndpoint, SqsQueue};
pub use workflow::{Command, SeedReport, Workflow};

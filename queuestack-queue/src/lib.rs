//! Message queue engine for QueueStack
//!
//! Provides named in-memory queues with:
//! - CreateQueue, DeleteQueue, ListQueues, GetProperties, PurgeQueue
//! - Enqueue, Peek, Receive, UpdateMessage, DeleteMessage
//! - Visibility timeouts with pop-token leases (at-least-once delivery)

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod message;
pub mod registry;
mod storage;

pub use config::{ConfigError, QueueConfig};
pub use engine::{QueueEngine, QueueProperties};
pub use error::QueueError;
pub use handlers::{handle_request, OperationResponse};
pub use message::{Message, MessageId, PopToken, ReceivedMessage, UpdateReceipt};
pub use registry::QueueRegistry;

//! Core types for QueueStack
//!
//! This crate provides the types shared by the queue engine and the layers
//! that expose it: error codes, request ids and the time source.

pub mod clock;
pub mod error;
pub mod request_id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorCode, ServiceError};
pub use request_id::RequestId;

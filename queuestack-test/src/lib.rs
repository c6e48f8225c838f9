//! Test utilities for QueueStack
//!
//! Provides:
//! - One-time tracing setup that writes through the test harness
//! - A registry fixture driven by a manual clock, so lease expiry can be
//!   exercised without sleeping
//!
//! ## Usage
//!
//! ```rust
//! use queuestack_test::TestRegistry;
//!
//! let fixture = TestRegistry::new();
//! let queue = fixture.registry.create_if_not_exists("jobs").unwrap();
//! queue.enqueue("hello").unwrap();
//! let leased = queue.receive(1, 1).unwrap();
//! assert_eq!(leased.len(), 1);
//!
//! fixture.clock.advance_secs(2);
//! assert_eq!(queue.peek(1).unwrap().len(), 1);
//! ```

pub mod fixture;

pub use fixture::{init_tracing, TestRegistry};

/// Visibility timeout used by tests that do not care about expiry
pub const LONG_VISIBILITY_SECS: i64 = 300;

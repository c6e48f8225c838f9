//! Per-queue message state
//!
//! The store and the tracker are always mutated together under the owning
//! engine's lock; neither does any locking of its own.

mod store;
mod visibility;

pub(crate) use store::MessageStore;
pub(crate) use visibility::{Lease, VisibilityTracker};

//! Queue engine: the operations of a single queue
//!
//! Every mutation runs under the queue's write lock, so a message selected by
//! one `receive` is never visible to another until its lease lapses or it is
//! deleted. `peek` and `approximate_count` take the read lock and treat
//! expired leases as absent without clearing them; the next mutation does
//! the clearing.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use queuestack_core::Clock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::message::{Message, MessageId, PopToken, ReceivedMessage, UpdateReceipt};
use crate::storage::{Lease, MessageStore, VisibilityTracker};


struct QueueState {
    store: MessageStore,
    tracker: VisibilityTracker,
    deleted: bool,
}

impl QueueState {
    fn new() -> Self {
        Self {
            store: MessageStore::new(),
            tracker: VisibilityTracker::new(),
            deleted: false,
        }
    }

    /// Lazy expiry: must run before any write path trusts lease state
    fn expire_leases(&mut self, now: DateTime<Utc>) {
        for id in self.tracker.expire(now) {
            debug!(message_id = %id, "Lease expired, message visible again");
        }
    }

    fn visible(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Message> + '_ {
        self.store
            .iter_ordered()
            .filter(move |m| !self.tracker.is_leased(&m.id, now))
    }

    fn visible_count(&self, now: DateTime<Utc>) -> usize {
        self.store.len() - self.tracker.active_count(now)
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.tracker.message_ids().all(|id| self.store.contains(id)),
            "lease held on a message missing from the store"
        );
    }
}

fn lease_expiry(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, QueueError> {
    Duration::try_seconds(secs)
        .and_then(|timeout| now.checked_add_signed(timeout))
        .ok_or_else(|| {
            QueueError::invalid(format!("visibility timeout of {secs} seconds is out of range"))
        })
}

/// Point-in-time queue properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueProperties {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Visible messages at the time of the call; may already be stale
    pub approximate_message_count: usize,
}

/// A single named queue
pub struct QueueEngine {
    name: String,
    created_at: DateTime<Utc>,
    config: Arc<QueueConfig>,
    clock: Arc<dyn Clock>,
    state: RwLock<QueueState>,
}

impl std::fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl QueueEngine {
    pub fn new(name: impl Into<String>, config: Arc<QueueConfig>, clock: Arc<dyn Clock>) -> Self {
        let created_at = clock.now();
        Self {
            name: name.into(),
            created_at,
            config,
            clock,
            state: RwLock::new(QueueState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn ensure_live(&self, state: &QueueState) -> Result<(), QueueError> {
        if state.deleted {
            return Err(QueueError::QueueNotFound(self.name.clone()));
        }
        Ok(())
    }

    pub fn enqueue(&self, body: impl Into<String>) -> Result<MessageId, QueueError> {
        let body = body.into();
        self.config.check_body(&body)?;

        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let now = self.clock.now();
        let id = state.store.insert(body, now).id;
        debug!(queue = %self.name, message_id = %id, "Enqueued message");
        Ok(id)
    }

    /// Up to `max_count` visible messages in delivery order, without leasing them
    pub fn peek(&self, max_count: u32) -> Result<Vec<Message>, QueueError> {
        self.config.check_batch_size(max_count)?;

        let state = self.state.read();
        self.ensure_live(&state)?;

        let now = self.clock.now();
        let messages: Vec<Message> = state
            .visible(now)
            .take(max_count as usize)
            .cloned()
            .collect();
        debug!(queue = %self.name, count = messages.len(), "Peeked messages");
        Ok(messages)
    }

    /// Lease up to `max_count` visible messages for `visibility_timeout_secs`.
    ///
    /// Returns immediately with an empty batch when nothing is visible.
    pub fn receive(
        &self,
        max_count: u32,
        visibility_timeout_secs: i64,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.config.check_batch_size(max_count)?;
        self.config.check_visibility_timeout(visibility_timeout_secs)?;

        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let now = self.clock.now();
        let expires_at = lease_expiry(now, visibility_timeout_secs)?;
        state.expire_leases(now);

        let selected: Vec<MessageId> = state
            .visible(now)
            .take(max_count as usize)
            .map(|m| m.id)
            .collect();

        let mut received = Vec::with_capacity(selected.len());
        for id in selected {
            let Lease {
                pop_token,
                expires_at: next_visible_on,
            } = state.tracker.grant(id, now, expires_at);
            let Some(message) = state.store.get_mut(&id) else {
                unreachable!("selected message {id} vanished under the write lock");
            };
            message.dequeue_count += 1;
            received.push(ReceivedMessage {
                message: message.clone(),
                pop_token,
                next_visible_on,
            });
        }
        state.check_invariants();

        debug!(queue = %self.name, count = received.len(), "Received messages");
        Ok(received)
    }

    /// Extend a lease, optionally replacing the body; the old token is spent
    pub fn update_lease(
        &self,
        message_id: MessageId,
        pop_token: PopToken,
        new_body: Option<String>,
        visibility_timeout_secs: i64,
    ) -> Result<UpdateReceipt, QueueError> {
        self.config.check_visibility_timeout(visibility_timeout_secs)?;
        if let Some(body) = &new_body {
            self.config.check_body(body)?;
        }

        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let now = self.clock.now();
        state.expire_leases(now);

        let expires_at = lease_expiry(now, visibility_timeout_secs)?;
        let Some(lease) = state.tracker.renew(message_id, &pop_token, now, expires_at) else {
            warn!(queue = %self.name, message_id = %message_id, "Rejected lease update");
            return Err(QueueError::LeaseMismatch { message_id });
        };

        let Some(message) = state.store.get_mut(&message_id) else {
            unreachable!("lease held on message {message_id} missing from the store");
        };
        if let Some(body) = new_body {
            message.body = body;
        }

        debug!(
            queue = %self.name,
            message_id = %message_id,
            next_visible_on = %lease.expires_at,
            "Updated lease"
        );
        Ok(UpdateReceipt {
            pop_token: lease.pop_token,
            next_visible_on: lease.expires_at,
        })
    }

    pub fn delete_message(
        &self,
        message_id: MessageId,
        pop_token: PopToken,
    ) -> Result<(), QueueError> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let now = self.clock.now();
        state.expire_leases(now);

        if !state.tracker.verify(&message_id, &pop_token, now) {
            warn!(queue = %self.name, message_id = %message_id, "Rejected delete");
            return Err(QueueError::LeaseMismatch { message_id });
        }

        state.tracker.remove(&message_id);
        let removed = state.store.remove(&message_id);
        assert!(
            removed.is_some(),
            "lease held on message {message_id} missing from the store"
        );
        state.check_invariants();

        debug!(queue = %self.name, message_id = %message_id, "Deleted message");
        Ok(())
    }

    /// Visible messages right now; concurrent operations may change it at once
    pub fn approximate_count(&self) -> Result<usize, QueueError> {
        let state = self.state.read();
        self.ensure_live(&state)?;
        Ok(state.visible_count(self.clock.now()))
    }

    pub fn properties(&self) -> Result<QueueProperties, QueueError> {
        Ok(QueueProperties {
            name: self.name.clone(),
            created_at: self.created_at,
            approximate_message_count: self.approximate_count()?,
        })
    }

    pub fn purge(&self) -> Result<(), QueueError> {
        let mut state = self.state.write();
        self.ensure_live(&state)?;

        let count = state.store.len();
        state.tracker.clear();
        state.store.clear();
        info!(queue = %self.name, count = count, "Purged queue");
        Ok(())
    }

    /// Discard all state and fail every later call with `QueueNotFound`
    pub(crate) fn retire(&self) {
        let mut state = self.state.write();
        state.tracker.clear();
        state.store.clear();
        state.deleted = true;
    }
}

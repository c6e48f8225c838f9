//! Message store: identity to content and metadata

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::message::{Message, MessageId};

struct StoredMessage {
    message: Message,
    seq: u64,
}

/// Messages of one queue, iterable in delivery order.
///
/// Delivery order is `enqueue_time` ascending with ties broken by insertion
/// sequence, which is how two messages enqueued within the same clock tick
/// keep their relative order.
#[derive(Default)]
pub(crate) struct MessageStore {
    messages: HashMap<MessageId, StoredMessage>,
    order: BTreeMap<(DateTime<Utc>, u64), MessageId>,
    next_seq: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, body: String, now: DateTime<Utc>) -> &Message {
        let seq = self.next_seq;
        self.next_seq += 1;

        let message = Message {
            id: MessageId::new(),
            body,
            enqueue_time: now,
            dequeue_count: 0,
        };
        let id = message.id;

        self.order.insert((now, seq), id);
        let stored = self
            .messages
            .entry(id)
            .or_insert(StoredMessage { message, seq });
        &stored.message
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id).map(|s| &s.message)
    }

    pub fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id).map(|s| &mut s.message)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let stored = self.messages.remove(id)?;
        self.order.remove(&(stored.message.enqueue_time, stored.seq));
        Some(stored.message)
    }

    /// All messages in delivery order
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Message> + '_ {
        self.order.values().filter_map(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.order.clear();
    }
}

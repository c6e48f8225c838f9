//! Queue registry: queue names to engines

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use queuestack_core::{Clock, SystemClock};
use std::sync::Arc;
use tracing::info;

use crate::config::QueueConfig;
use crate::engine::QueueEngine;
use crate::error::QueueError;

/// Process-scoped set of queues.
///
/// Create and delete are serialised per name by the map's shard locks;
/// message operations only ever lock the engine they target.
pub struct QueueRegistry {
    queues: DashMap<String, Arc<QueueEngine>>,
    config: Arc<QueueConfig>,
    clock: Arc<dyn Clock>,
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::build(QueueConfig::default(), Arc::new(SystemClock))
    }
}

impl QueueRegistry {
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Rejects a config that fails `QueueConfig::validate`
    pub fn with_clock(config: QueueConfig, clock: Arc<dyn Clock>) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            queues: DashMap::new(),
            config: Arc::new(config),
            clock,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Return the named queue, creating it first if it does not exist
    pub fn create_if_not_exists(&self, name: &str) -> Result<Arc<QueueEngine>, QueueError> {
        validate_queue_name(name)?;

        match self.queues.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let engine = Arc::new(QueueEngine::new(
                    name,
                    self.config.clone(),
                    self.clock.clone(),
                ));
                info!(name = %name, "Creating queue");
                entry.insert(engine.clone());
                Ok(engine)
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<QueueEngine>, QueueError> {
        self.queues
            .get(name)
            .map(|q| q.value().clone())
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    /// Remove the queue with all its messages and leases.
    ///
    /// Handles obtained earlier see `QueueNotFound` from then on.
    pub fn delete(&self, name: &str) -> Result<(), QueueError> {
        let (_, engine) = self
            .queues
            .remove(name)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;

        engine.retire();
        info!(name = %name, "Deleted queue");
        Ok(())
    }

    /// Queue names, sorted, optionally filtered by prefix
    pub fn list(&self, prefix: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .queues
            .iter()
            .filter(|q| prefix.map_or(true, |p| q.key().starts_with(p)))
            .map(|q| q.key().clone())
            .collect();
        names.sort();
        names
    }
}

/// 3-63 characters of lowercase letters, digits and single hyphens,
/// starting and ending with a letter or digit
fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    let len_ok = (3..=63).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let edges_ok = !name.starts_with('-') && !name.ends_with('-');

    if len_ok && chars_ok && edges_ok && !name.contains("--") {
        Ok(())
    } else {
        Err(QueueError::invalid(format!("invalid queue name: {name:?}")))
    }
}

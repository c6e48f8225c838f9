//! Queue limits and their loading

use serde::Deserialize;
use thiserror::Error;

use crate::error::QueueError;

/// Largest accepted `max_visibility_timeout_secs` (10 years)
pub const VISIBILITY_TIMEOUT_CEILING_SECS: i64 = 315_360_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
    #[error(transparent)]
    Invalid(#[from] QueueError),
}

/// Limits applied by every queue in a registry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_visibility_timeout")]
    pub max_visibility_timeout_secs: i64,

    #[serde(default = "default_visibility_timeout")]
    pub default_visibility_timeout_secs: i64,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,

    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_visibility_timeout_secs: default_max_visibility_timeout(),
            default_visibility_timeout_secs: default_visibility_timeout(),
            max_batch_size: default_max_batch_size(),
            max_message_size: default_max_message_size(),
        }
    }
}

fn default_max_visibility_timeout() -> i64 {
    604_800 // 7 days
}

fn default_visibility_timeout() -> i64 {
    30
}

fn default_max_batch_size() -> u32 {
    32
}

fn default_max_message_size() -> usize {
    65_536 // 64KB
}

impl QueueConfig {
    /// Load configuration from `queuestack.*` and `QUEUESTACK_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("queuestack").required(false))
            .add_source(config::Environment::with_prefix("QUEUESTACK").try_parsing(true))
            .build()?
            .try_deserialize::<QueueConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single explicit source
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize::<QueueConfig>()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.max_visibility_timeout_secs <= 0
            || self.max_visibility_timeout_secs > VISIBILITY_TIMEOUT_CEILING_SECS
        {
            return Err(QueueError::invalid(format!(
                "max_visibility_timeout_secs must be between 1 and {}",
                VISIBILITY_TIMEOUT_CEILING_SECS
            )));
        }
        if self.default_visibility_timeout_secs <= 0
            || self.default_visibility_timeout_secs > self.max_visibility_timeout_secs
        {
            return Err(QueueError::invalid(format!(
                "default_visibility_timeout_secs must be between 1 and {}",
                self.max_visibility_timeout_secs
            )));
        }
        if self.max_batch_size == 0 {
            return Err(QueueError::invalid("max_batch_size must be positive"));
        }
        if self.max_message_size == 0 {
            return Err(QueueError::invalid("max_message_size must be positive"));
        }
        Ok(())
    }

    pub(crate) fn check_visibility_timeout(&self, secs: i64) -> Result<(), QueueError> {
        if secs <= 0 || secs > self.max_visibility_timeout_secs {
            return Err(QueueError::invalid(format!(
                "visibility timeout must be between 1 and {} seconds, got {}",
                self.max_visibility_timeout_secs, secs
            )));
        }
        Ok(())
    }

    pub(crate) fn check_batch_size(&self, max_count: u32) -> Result<(), QueueError> {
        if max_count == 0 || max_count > self.max_batch_size {
            return Err(QueueError::invalid(format!(
                "max_count must be between 1 and {}, got {}",
                self.max_batch_size, max_count
            )));
        }
        Ok(())
    }

    pub(crate) fn check_body(&self, body: &str) -> Result<(), QueueError> {
        if body.len() > self.max_message_size {
            return Err(QueueError::invalid(format!(
                "message body is {} bytes, limit is {}",
                body.len(),
                self.max_message_size
            )));
        }
        Ok(())
    }
}

//! Registry fixtures

use once_cell::sync::OnceCell;
use queuestack_core::ManualClock;
use queuestack_queue::{QueueConfig, QueueRegistry};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();

/// Install a test-writer subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `queuestack_queue=debug`.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("queuestack_queue=debug"));
        // Another harness may already have installed a global subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A registry whose clock only moves when the test advances it
pub struct TestRegistry {
    pub registry: Arc<QueueRegistry>,
    pub clock: ManualClock,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// # Panics
    ///
    /// If `config` fails validation.
    pub fn with_config(config: QueueConfig) -> Self {
        init_tracing();
        let clock = ManualClock::starting_now();
        let registry = QueueRegistry::with_clock(config, Arc::new(clock.clone()))
            .unwrap_or_else(|err| panic!("invalid test config: {err}"));
        let registry = Arc::new(registry);
        info!("Created test registry");
        Self { registry, clock }
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

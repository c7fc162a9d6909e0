//! Configuration for the staging store.

use std::time::Duration;

/// Default number of sessions that may be live at once.
///
/// One slot is the admission gate: a single upload batch at a time.
pub const DEFAULT_CAPACITY: usize = 1;

/// Default upload window for a session (one hour). Admission picks the
/// actual TTL per session.
pub const DEFAULT_TTL_SECS: i64 = 60 * 60;

/// Default cadence of the expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default depth of the queue between the sweep tick and the deletion worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration for [`ExpiringSessionStore`](crate::ExpiringSessionStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of live sessions. `try_set` refuses once reached.
    pub capacity: usize,

    /// Tick period of the sweeper. Each tick advances its logical clock by
    /// this many milliseconds and sweeps every second it crosses.
    pub sweep_interval: Duration,

    /// Bound on expired batches waiting for the deletion worker.
    pub queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live sessions.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the deletion queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

//! Engine tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrent recomputes.
pub const DEFAULT_WORKERS: usize = 4;

/// Default period of the time-dependent tick, in seconds.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;

/// Default recompute time budget, in milliseconds.
pub const DEFAULT_RECOMPUTE_TIMEOUT_MS: u64 = 30_000;

/// Default capacity of the install notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Configuration for [`CollectionEngine`](crate::engine::CollectionEngine).
///
/// Every field has a default, so an empty TOML table is a valid config:
///
/// ```
/// use collection_engine_rs::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str("{}").unwrap();
/// assert_eq!(config, EngineConfig::default());
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of recomputes running at once.
    pub workers: usize,

    /// Period of the tick that refreshes time-dependent filters. Zero disables it.
    pub tick_interval_secs: u64,

    /// Time budget for one recompute before the entry is marked degraded.
    pub recompute_timeout_ms: u64,

    /// Buffer size of the install notification channel.
    pub notification_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            recompute_timeout_ms: DEFAULT_RECOMPUTE_TIMEOUT_MS,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// The tick period, or `None` if ticking is disabled.
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_secs > 0).then(|| Duration::from_secs(self.tick_interval_secs))
    }

    /// The recompute time budget.
    pub fn recompute_timeout(&self) -> Duration {
        Duration::from_millis(self.recompute_timeout_ms)
    }

    /// Worker count, never below one.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    /// Notification buffer size, never below one.
    pub fn notification_buffer(&self) -> usize {
        self.notification_capacity.max(1)
    }
}

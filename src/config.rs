//! Configuration Module
//!
//! Handles loading cache tuning parameters from environment variables.

use std::env;
use std::time::Duration;

/// Default pause between two sweep passes, in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

/// Default number of entries removed per exclusive lock acquisition
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 128;

/// Cache tuning parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Pause between background sweep passes
    pub sweep_interval: Duration,
    /// Expired entries removed per write-lock acquisition during a sweep
    pub sweep_batch_size: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: 1000)
    /// - `CACHE_SWEEP_BATCH_SIZE` - Entries removed per lock hold (default: 128)
    ///
    /// Unparseable values fall back to the default. A batch size of zero is
    /// raised to one.
    pub fn from_env() -> Self {
        let interval_ms = env::var("CACHE_SWEEP_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_MS);
        let batch_size = env::var("CACHE_SWEEP_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SWEEP_BATCH_SIZE);

        Self::default()
            .with_sweep_interval(Duration::from_millis(interval_ms))
            .with_sweep_batch_size(batch_size)
    }

    /// Overrides the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Overrides the sweep batch size (clamped to at least 1).
    pub fn with_sweep_batch_size(mut self, batch_size: usize) -> Self {
        self.sweep_batch_size = batch_size.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }
}

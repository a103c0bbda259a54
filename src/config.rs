//! Store Configuration
//!
//! Mechanism-agnostic knobs consumed by the core: GC cadence, full-save
//! cadence, and the incremental-sync thresholds. Invalid thresholds are
//! rejected at construction with a descriptive error, never silently
//! clamped.

use crate::error::{CacheError, Result};
use std::time::Duration;

/// Configuration values for a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between expired-key sweeps. `Duration::ZERO` disables GC.
    pub gc_interval: Duration,

    /// Interval between background persistence syncs. `Duration::ZERO`
    /// disables the sync timer (a final save still happens at close).
    pub save_interval: Duration,

    /// Track per-key changes and sync incrementally instead of rewriting
    /// the whole dataset each time.
    pub save_dirty: bool,

    /// Minimum number of dirty keys before a sync may escalate to a full
    /// rewrite. Must be greater than zero.
    pub dirty_threshold_count: usize,

    /// Dirty keys as a fraction of the live keyspace beyond which a full
    /// rewrite is cheaper than per-key upserts. Must be in `(0, 1]`.
    pub dirty_threshold_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gc_interval: Duration::from_secs(10),
            save_interval: Duration::from_secs(600),
            save_dirty: true,
            dirty_threshold_count: 50,
            dirty_threshold_ratio: 0.2,
        }
    }
}

impl Config {
    /// Validates the incremental-sync thresholds.
    ///
    /// Runs for every store construction, backend or not: a config that
    /// only breaks once persistence is attached later is a config bug now.
    pub(crate) fn validate_thresholds(&self) -> Result<()> {
        if self.dirty_threshold_count == 0 {
            return Err(CacheError::InvalidDirtyThreshold(
                "dirty_threshold_count must be greater than zero".to_string(),
            ));
        }
        if !(self.dirty_threshold_ratio > 0.0 && self.dirty_threshold_ratio <= 1.0) {
            return Err(CacheError::InvalidDirtyThreshold(format!(
                "dirty_threshold_ratio must be in (0, 1], got {}",
                self.dirty_threshold_ratio
            )));
        }
        Ok(())
    }
}

//! Replay configuration.

use std::time::Duration;

/// Configuration for chain replay streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    /// How long a caught-up stream waits before polling the source again.
    pub poll_interval: Duration,

    /// Maximum entries applied per store commit. A larger block is split
    /// into several commits; only the last one advances the cursor.
    pub max_batch_entries: usize,

    /// Retries for a failing source call before the stream faults.
    pub max_retries: u32,

    /// Delay before the first retry. Doubles on every further attempt.
    pub retry_base_delay: Duration,

    /// Upper bound for a single retry delay.
    pub retry_max_delay: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_batch_entries: 500,
            max_retries: 5,
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

impl ReplayConfig {
    /// Batch size, never zero.
    pub(crate) fn batch_size(&self) -> usize {
        self.max_batch_entries.max(1)
    }
}

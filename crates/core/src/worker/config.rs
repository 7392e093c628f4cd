//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the worker pool.
///
/// Slot count and parallel/serial mode come from the runtime settings; these
/// are the knobs that only make sense in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Delay between slot starts (milliseconds). Slot `n` waits `n * stagger`
    /// before taking its first job, so concurrent tool launches are spread out.
    #[serde(default = "default_stagger")]
    pub stagger_start_ms: u64,

    /// Capacity of the per-attempt progress channel between the extractor
    /// and the relay task. Progress is dropped, not awaited, when full.
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,

    /// Capacity of the progress broadcast channel. Subscribers lagging by
    /// more than this are dropped.
    #[serde(default = "default_reporter_capacity")]
    pub reporter_capacity: usize,
}

fn default_stagger() -> u64 {
    2000
}

fn default_progress_buffer() -> usize {
    64
}

fn default_reporter_capacity() -> usize {
    crate::progress::DEFAULT_CAPACITY
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stagger_start_ms: default_stagger(),
            progress_buffer: default_progress_buffer(),
            reporter_capacity: default_reporter_capacity(),
        }
    }
}

impl WorkerConfig {
    pub fn without_stagger(mut self) -> Self {
        self.stagger_start_ms = 0;
        self
    }
}

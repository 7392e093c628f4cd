//! Types for the worker module.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors from the worker pool and its queue.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The queue's receiving side is gone.
    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Worker pool is not running")]
    NotRunning,
}

/// Snapshot of the pool for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub running: bool,
    /// Slots started; fixed until the pool is restarted.
    pub slots: usize,
    pub parallel_mode: bool,
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_retries: u64,
}

/// Counters shared by all slots.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    pub active: AtomicU64,
    pub total_processed: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_retries: AtomicU64,
}

impl PoolStats {
    pub fn to_status(
        &self,
        running: bool,
        slots: usize,
        parallel_mode: bool,
        queued_jobs: usize,
    ) -> PoolStatus {
        PoolStatus {
            running,
            slots,
            parallel_mode,
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            queued_jobs,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
        }
    }
}

//! Worker pool.
//!
//! Slots pull job ids from a shared queue and drive each job through
//! extraction and post-processing, retrying transient failures in place.
//! Parallel mode runs `max_workers` slots; serial mode runs one.

mod config;
mod pool;
mod queue;
mod types;

pub use config::WorkerConfig;
pub use pool::WorkerPool;
pub use queue::{FolderLocks, JobQueue};
pub use types::{PoolError, PoolStatus};

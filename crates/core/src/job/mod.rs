//! Job model and registry.

mod memory_store;
mod store;
mod types;

pub use memory_store::MemoryJobStore;
pub use store::{CreateJobRequest, JobError, JobFilter, JobStore};
pub use types::{
    AudioFormat, FailureKind, Job, JobFailure, JobKind, JobPhase, JobStatus, ProgressSnapshot,
    RetryState,
};

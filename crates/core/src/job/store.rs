//! Job storage trait and request types.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use super::types::{
    AudioFormat, Job, JobFailure, JobKind, JobPhase, JobStatus, ProgressSnapshot,
};

/// Error type for job operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Cannot perform operation due to current status.
    #[error("Cannot {operation} job {job_id}: current status is {current}")]
    InvalidState {
        job_id: String,
        current: JobStatus,
        operation: String,
    },

    /// Request rejected before a job was created.
    #[error("Invalid job request: {0}")]
    InvalidRequest(String),
}

/// Request to create a new job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub kind: JobKind,
    pub locator: String,
    pub destination: PathBuf,
    pub format: AudioFormat,
    pub track_index: Option<u32>,
}

impl CreateJobRequest {
    pub fn new(
        kind: JobKind,
        locator: impl Into<String>,
        destination: impl Into<PathBuf>,
        format: AudioFormat,
    ) -> Self {
        Self {
            kind,
            locator: locator.into(),
            destination: destination.into(),
            format,
            track_index: None,
        }
    }

    pub fn with_track_index(mut self, index: u32) -> Self {
        self.track_index = Some(index);
        self
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    /// Maximum number of results (0 = unlimited).
    pub limit: usize,
    pub offset: usize,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.status.map(|s| s == job.status).unwrap_or(true)
    }
}

/// Registry of jobs. Lookups and listing never block on a job being mutated
/// for longer than a single field update.
pub trait JobStore: Send + Sync {
    /// Create a new job in `queued` status.
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError>;

    /// Get a job by ID.
    fn get(&self, id: &str) -> Result<Option<Job>, JobError>;

    /// List jobs in insertion order.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// Count jobs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<usize, JobError>;

    /// `queued -> running`.
    fn mark_running(&self, id: &str) -> Result<Job, JobError>;

    /// Start another attempt of a running job. Returns the attempt number.
    fn begin_attempt(&self, id: &str) -> Result<u32, JobError>;

    /// Replace the progress snapshot of a running job.
    fn update_progress(&self, id: &str, progress: ProgressSnapshot) -> Result<Job, JobError>;

    /// Set the running phase.
    fn set_phase(&self, id: &str, phase: JobPhase) -> Result<Job, JobError>;

    /// Record a retry: the job waits in `retry_wait` until `next_eligible_at`.
    fn schedule_retry(
        &self,
        id: &str,
        next_eligible_at: DateTime<Utc>,
        last_error: &str,
    ) -> Result<Job, JobError>;

    /// `running -> done`.
    fn mark_done(&self, id: &str, output_path: Option<PathBuf>) -> Result<Job, JobError>;

    /// `running -> failed`.
    fn mark_failed(&self, id: &str, failure: JobFailure) -> Result<Job, JobError>;
}

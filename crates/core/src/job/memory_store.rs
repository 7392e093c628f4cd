//! In-memory job store.
//!
//! Jobs live for the process lifetime. The index is behind a `RwLock` and
//! every job has its own `Mutex`, so one worker mutating its job never blocks
//! readers of other jobs.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use super::store::{CreateJobRequest, JobError, JobFilter, JobStore};
use super::types::{
    Job, JobFailure, JobPhase, JobStatus, ProgressSnapshot, RetryState,
};

#[derive(Default)]
struct Index {
    order: Vec<String>,
    jobs: HashMap<String, Arc<Mutex<Job>>>,
}

/// Thread-safe job registry kept in memory.
#[derive(Default)]
pub struct MemoryJobStore {
    index: RwLock<Index>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<Job>>, JobError> {
        let index = match self.index.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        index
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    fn snapshot(&self) -> Vec<Arc<Mutex<Job>>> {
        let index = match self.index.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        index
            .order
            .iter()
            .filter_map(|id| index.jobs.get(id).cloned())
            .collect()
    }

    /// Run `f` on the job while holding its lock.
    fn mutate<F>(&self, id: &str, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobError>,
    {
        let entry = self.entry(id)?;
        let mut job = lock(&entry);
        f(&mut job)?;
        Ok(job.clone())
    }
}

fn lock(entry: &Mutex<Job>) -> MutexGuard<'_, Job> {
    match entry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn require(job: &Job, expected: JobStatus, operation: &str) -> Result<(), JobError> {
    if job.status != expected {
        return Err(JobError::InvalidState {
            job_id: job.id.clone(),
            current: job.status,
            operation: operation.to_string(),
        });
    }
    Ok(())
}

impl JobStore for MemoryJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        if request.locator.trim().is_empty() {
            return Err(JobError::InvalidRequest("locator is empty".to_string()));
        }
        if request.destination.as_os_str().is_empty() {
            return Err(JobError::InvalidRequest("destination is empty".to_string()));
        }
        if !request.destination.is_absolute() {
            return Err(JobError::InvalidRequest(format!(
                "destination must be absolute: {}",
                request.destination.display()
            )));
        }

        let job = Job {
            id: Uuid::new_v4().to_string(),
            kind: request.kind,
            locator: request.locator,
            destination: request.destination,
            format: request.format,
            status: JobStatus::Queued,
            phase: None,
            progress: ProgressSnapshot::default(),
            error: None,
            retry: RetryState::default(),
            track_index: request.track_index,
            output_path: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let mut index = match self.index.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        index.order.push(job.id.clone());
        index
            .jobs
            .insert(job.id.clone(), Arc::new(Mutex::new(job.clone())));

        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        match self.entry(id) {
            Ok(entry) => Ok(Some(lock(&entry).clone())),
            Err(JobError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };

        Ok(self
            .snapshot()
            .iter()
            .map(|entry| lock(entry).clone())
            .filter(|job| filter.matches(job))
            .skip(filter.offset)
            .take(limit)
            .collect())
    }

    fn count(&self, filter: &JobFilter) -> Result<usize, JobError> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|entry| filter.matches(&lock(entry)))
            .count())
    }

    fn mark_running(&self, id: &str) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            require(job, JobStatus::Queued, "start")?;
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            Ok(())
        })
    }

    fn begin_attempt(&self, id: &str) -> Result<u32, JobError> {
        let job = self.mutate(id, |job| {
            require(job, JobStatus::Running, "begin attempt on")?;
            job.retry.attempts += 1;
            job.retry.next_eligible_at = None;
            job.phase = Some(JobPhase::Extracting);
            job.progress = ProgressSnapshot::default();
            Ok(())
        })?;
        Ok(job.retry.attempts)
    }

    fn update_progress(&self, id: &str, progress: ProgressSnapshot) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            require(job, JobStatus::Running, "update progress of")?;
            job.progress = progress;
            Ok(())
        })
    }

    fn set_phase(&self, id: &str, phase: JobPhase) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            require(job, JobStatus::Running, "set phase of")?;
            job.phase = Some(phase);
            Ok(())
        })
    }

    fn schedule_retry(
        &self,
        id: &str,
        next_eligible_at: DateTime<Utc>,
        last_error: &str,
    ) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            require(job, JobStatus::Running, "schedule retry of")?;
            job.phase = Some(JobPhase::RetryWait);
            job.retry.next_eligible_at = Some(next_eligible_at);
            job.retry.last_error = Some(last_error.to_string());
            Ok(())
        })
    }

    fn mark_done(&self, id: &str, output_path: Option<PathBuf>) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            require(job, JobStatus::Running, "complete")?;
            job.status = JobStatus::Done;
            job.phase = None;
            job.progress.percent = 100.0;
            job.output_path = output_path;
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    fn mark_failed(&self, id: &str, failure: JobFailure) -> Result<Job, JobError> {
        self.mutate(id, |job| {
            require(job, JobStatus::Running, "fail")?;
            job.status = JobStatus::Failed;
            job.phase = None;
            job.retry.next_eligible_at = None;
            job.retry.last_error = Some(failure.message.clone());
            job.error = Some(failure);
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }
}

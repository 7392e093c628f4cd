use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::job::{Job, JobPhase, JobStatus};
use crate::metrics::PROGRESS_SUBSCRIBERS_DROPPED;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Snapshot of one job, as sent to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<JobPhase>,
    pub percent: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub current_file: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub attempt: u32,
}

impl From<&Job> for ProgressEvent {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            phase: job.phase,
            percent: job.progress.percent,
            speed: job.progress.speed.clone(),
            eta: job.progress.eta.clone(),
            current_file: job.progress.current_file.clone(),
            error: job.error.as_ref().map(|e| e.message.clone()),
            hint: job.error.as_ref().map(|e| e.hint.clone()),
            attempt: job.retry.attempts,
        }
    }
}

/// Broadcaster for progress events.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Never blocks; no subscribers is not an error.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    /// Publish the current state of `job`.
    pub fn publish_job(&self, job: &Job) {
        self.publish(ProgressEvent::from(job));
    }

    /// Attach a subscriber. Only events published after this call are delivered.
    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            receiver: self.sender.subscribe(),
            dropped: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One observer's view of the stream.
#[derive(Debug)]
pub struct ProgressSubscription {
    receiver: broadcast::Receiver<ProgressEvent>,
    dropped: bool,
}

impl ProgressSubscription {
    /// Next event in publish order. `None` once the subscriber was dropped for
    /// lagging or the reporter is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        if self.dropped {
            return None;
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Progress subscriber lagged by {} events, dropping it", skipped);
                PROGRESS_SUBSCRIBERS_DROPPED.inc();
                self.dropped = true;
                None
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Progress channel closed");
                None
            }
        }
    }

    /// Whether this subscription was cut off for lagging.
    pub fn is_dropped(&self) -> bool {
        self.dropped
    }
}

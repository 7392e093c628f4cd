//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Request vocabulary
// ============================================================================

/// Audio container produced by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Flac,
    Mp3,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// File extension of the produced audio file.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flac" => Ok(AudioFormat::Flac),
            "mp3" => Ok(AudioFormat::Mp3),
            other => Err(format!("unsupported audio format: {}", other)),
        }
    }
}

/// How a job came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Single,
    PlaylistItem,
    BatchItem,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Single => "single",
            JobKind::PlaylistItem => "playlist_item",
            JobKind::BatchItem => "batch_item",
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Coarse job status. Transitions only `queued -> running -> {done, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained step of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Extracting,
    Tagging,
    Artwork,
    Lyrics,
    Cleanup,
    RetryWait,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Extracting => "extracting",
            JobPhase::Tagging => "tagging",
            JobPhase::Artwork => "artwork",
            JobPhase::Lyrics => "lyrics",
            JobPhase::Cleanup => "cleanup",
            JobPhase::RetryWait => "retry_wait",
        }
    }
}

/// Latest transfer progress of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// 0.0 - 100.0
    pub percent: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
}

// ============================================================================
// Failures and retries
// ============================================================================

/// Classified failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    FileLocked,
    Authorization,
    FormatUnavailable,
    MalformedLocator,
    Tagging,
    ToolMissing,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::FileLocked => "file_locked",
            FailureKind::Authorization => "authorization",
            FailureKind::FormatUnavailable => "format_unavailable",
            FailureKind::MalformedLocator => "malformed_locator",
            FailureKind::Tagging => "tagging",
            FailureKind::ToolMissing => "tool_missing",
            FailureKind::Internal => "internal",
        }
    }

    /// Transient failures are retried within the retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Network | FailureKind::FileLocked)
    }

    /// Remediation hint category shown to the user.
    pub fn hint(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::FileLocked => "file_locked",
            FailureKind::Authorization => "authorization",
            FailureKind::FormatUnavailable => "format",
            FailureKind::MalformedLocator => "locator",
            FailureKind::Tagging => "tagging",
            FailureKind::ToolMissing => "setup",
            FailureKind::Internal => "internal",
        }
    }
}

/// Failure recorded on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    pub hint: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: kind.hint().to_string(),
        }
    }
}

/// Retry bookkeeping for a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryState {
    /// Attempts started so far.
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_eligible_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// ============================================================================
// Job
// ============================================================================

/// A tracked acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    /// Cleaned source URL.
    pub locator: String,
    /// Absolute folder the audio file lands in.
    pub destination: PathBuf,
    pub format: AudioFormat,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<JobPhase>,
    #[serde(default)]
    pub progress: ProgressSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(default)]
    pub retry: RetryState,
    /// 1-based playlist position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Name of the destination folder, used as album fallback.
    pub fn folder_name(&self) -> String {
        self.destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

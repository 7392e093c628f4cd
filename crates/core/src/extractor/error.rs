//! Error types for the extractor module.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::FailureKind;

/// Errors that can occur during extraction.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// yt-dlp binary not found.
    #[error("yt-dlp not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Transient network problem.
    #[error("Network error: {message}")]
    Network { message: String },

    /// A file in the destination is held open by another process.
    #[error("File locked: {message}")]
    FileLocked { message: String },

    /// Source refused access (login, age gate, region, 403).
    #[error("Access denied: {message}")]
    Forbidden { message: String },

    /// Requested audio is not available or was filtered out.
    #[error("Format unavailable: {message}")]
    FormatUnavailable { message: String },

    /// The locator is not something the extractor understands.
    #[error("Malformed locator: {message}")]
    MalformedLocator { message: String },

    /// Extraction timed out.
    #[error("Extraction timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Tool exited with an error that matched no known pattern.
    #[error("Extraction failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// Tool finished but produced no audio file.
    #[error("Extraction produced no audio file")]
    NoOutput,

    /// Playlist has no members.
    #[error("Playlist is empty: {locator}")]
    EmptyPlaylist { locator: String },

    /// I/O error during extraction.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse tool output.
    #[error("Failed to parse extractor output: {reason}")]
    ParseError { reason: String },
}

/// Lowercase fragments of yt-dlp error output, grouped by outcome. Checked in order.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "http error 403",
    "sign in to confirm",
    "private video",
    "members-only",
    "login required",
    "only available for registered users",
    "age-restricted",
];

const FORMAT_PATTERNS: &[&str] = &[
    "requested format is not available",
    "does not match filter",
    "video unavailable",
    "this video is not available",
    "no video formats found",
];

const LOCATOR_PATTERNS: &[&str] = &[
    "unsupported url",
    "is not a valid url",
    "incomplete youtube id",
    "invalid url",
];

const LOCKED_PATTERNS: &[&str] = &[
    "being used by another process",
    "winerror 32",
    "resource busy",
    "text file busy",
];

const NETWORK_PATTERNS: &[&str] = &[
    "unable to download webpage",
    "timed out",
    "connection reset",
    "connection refused",
    "connection aborted",
    "temporary failure in name resolution",
    "name or service not known",
    "network is unreachable",
    "remote end closed connection",
    "incompleteread",
    "http error 500",
    "http error 502",
    "http error 503",
    "http error 504",
    "http error 429",
];

impl ExtractorError {
    /// Creates a failed error with captured stderr.
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a parse error.
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// Classify tool output into a known error, if any pattern matches.
    pub fn classify_output(output: &str) -> Option<Self> {
        let lower = output.to_lowercase();
        let message = first_error_line(output);
        let hit = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if hit(FORBIDDEN_PATTERNS) {
            Some(Self::Forbidden { message })
        } else if hit(FORMAT_PATTERNS) {
            Some(Self::FormatUnavailable { message })
        } else if hit(LOCATOR_PATTERNS) {
            Some(Self::MalformedLocator { message })
        } else if hit(LOCKED_PATTERNS) {
            Some(Self::FileLocked { message })
        } else if hit(NETWORK_PATTERNS) {
            Some(Self::Network { message })
        } else {
            None
        }
    }

    /// Map to the job failure vocabulary.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::ToolNotFound { .. } => FailureKind::ToolMissing,
            Self::Network { .. } | Self::Timeout { .. } => FailureKind::Network,
            Self::FileLocked { .. } => FailureKind::FileLocked,
            Self::Forbidden { .. } => FailureKind::Authorization,
            Self::FormatUnavailable { .. } | Self::NoOutput | Self::EmptyPlaylist { .. } => {
                FailureKind::FormatUnavailable
            }
            Self::MalformedLocator { .. } => FailureKind::MalformedLocator,
            Self::Io(e) if is_lock_error(e) => FailureKind::FileLocked,
            Self::Failed { .. } | Self::Io(_) | Self::ParseError { .. } => FailureKind::Internal,
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_retryable()
    }
}

/// Sharing violations and busy resources are transient.
pub(crate) fn is_lock_error(e: &std::io::Error) -> bool {
    if e.kind() == std::io::ErrorKind::ResourceBusy {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(e.raw_os_error(), Some(32) | Some(33))
}

fn first_error_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| output.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .unwrap_or("")
        .trim_start_matches("ERROR:")
        .trim()
        .to_string()
}

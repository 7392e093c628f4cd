//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job manager (submissions, terminal outcomes, retries)
//! - Worker pool (running jobs, durations)
//! - Post-processing and lyrics lookups
//! - Progress subscribers

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};

// =============================================================================
// Job Manager
// =============================================================================

/// Jobs submitted by kind.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_jobs_submitted_total", "Total jobs submitted"),
        &["kind"], // "single", "playlist_item", "batch_item"
    )
    .unwrap()
});

/// Jobs that reached a terminal state, by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_jobs_finished_total", "Total jobs finished"),
        &["result"], // "done", "failed"
    )
    .unwrap()
});

/// Failures by classified kind.
pub static JOB_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_job_failures_total", "Job attempt failures by kind"),
        &["kind"],
    )
    .unwrap()
});

/// Retries scheduled after a transient failure.
pub static JOB_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_job_retries_total", "Total job retries scheduled"),
        &["kind"], // "network", "file_locked"
    )
    .unwrap()
});

// =============================================================================
// Worker Pool
// =============================================================================

/// Jobs currently running.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("snowsky_jobs_running", "Jobs currently held by a worker").unwrap()
});

/// Time from dequeue to terminal state.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "snowsky_job_duration_seconds",
            "Duration of a job from start to terminal state",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

/// Worker tasks that panicked.
pub static WORKER_PANICS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("snowsky_worker_panics_total", "Job executions that panicked").unwrap()
});

// =============================================================================
// Post-processing
// =============================================================================

/// Post-processing steps by step and result.
pub static POSTPROCESS_STEPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "snowsky_postprocess_steps_total",
            "Post-processing steps by outcome",
        ),
        &["step", "result"], // step: "tags", "artwork", "lyrics"; result: "ok", "skipped", "failed"
    )
    .unwrap()
});

/// Lyrics lookups by result.
pub static LYRICS_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snowsky_lyrics_lookups_total", "Total lyrics lookups"),
        &["result"], // "found", "not_found"
    )
    .unwrap()
});

// =============================================================================
// Progress
// =============================================================================

/// Subscribers dropped for falling behind.
pub static PROGRESS_SUBSCRIBERS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snowsky_progress_subscribers_dropped_total",
        "Progress subscribers dropped for lagging",
    )
    .unwrap()
});

// =============================================================================
// Library
// =============================================================================

/// Library scans.
pub static LIBRARY_SCANS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("snowsky_library_scans_total", "Total library scans").unwrap()
});

/// Tracks in the last library snapshot.
pub static LIBRARY_TRACKS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("snowsky_library_tracks", "Tracks in the current library snapshot").unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Job manager
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_FAILURES.clone()),
        Box::new(JOB_RETRIES.clone()),
        // Worker pool
        Box::new(JOBS_RUNNING.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(WORKER_PANICS.clone()),
        // Post-processing
        Box::new(POSTPROCESS_STEPS.clone()),
        Box::new(LYRICS_LOOKUPS.clone()),
        // Progress
        Box::new(PROGRESS_SUBSCRIBERS_DROPPED.clone()),
        // Library
        Box::new(LIBRARY_SCANS.clone()),
        Box::new(LIBRARY_TRACKS.clone()),
    ]
}

//! Worker pool implementation.
//!
//! A fixed number of slots share one queue. Each slot owns one job at a time
//! from `running` to a terminal state, including retry waits, so the number
//! of running jobs never exceeds the slot count.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::WorkerConfig;
use super::queue::{FolderLocks, JobQueue};
use super::types::{PoolStats, PoolStatus};
use crate::config::{Settings, SettingsHandle};
use crate::extractor::{ExtractProgress, ExtractRequest, Extractor};
use crate::job::{FailureKind, Job, JobFailure, JobStore, ProgressSnapshot};
use crate::lyrics::LyricsProvider;
use crate::manager::RetryPolicy;
use crate::metrics::{
    JOBS_FINISHED, JOBS_RUNNING, JOB_DURATION, JOB_FAILURES, JOB_RETRIES, WORKER_PANICS,
};
use crate::postprocess::{PostProcessContext, PostProcessor, Tagger};
use crate::progress::ProgressReporter;

/// Everything a slot needs, cloned into each slot task.
struct SlotContext<T: Tagger + ?Sized, L: LyricsProvider + ?Sized> {
    store: Arc<dyn JobStore>,
    settings: Arc<SettingsHandle>,
    extractor: Arc<dyn Extractor>,
    postprocessor: PostProcessor<T, L>,
    queue: JobQueue,
    reporter: ProgressReporter,
    folder_locks: FolderLocks,
    retry_policy: RetryPolicy,
    stats: Arc<PoolStats>,
    progress_buffer: usize,
}

impl<T: Tagger + ?Sized, L: LyricsProvider + ?Sized> Clone for SlotContext<T, L> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            extractor: Arc::clone(&self.extractor),
            postprocessor: self.postprocessor.clone(),
            queue: self.queue.clone(),
            reporter: self.reporter.clone(),
            folder_locks: self.folder_locks.clone(),
            retry_policy: self.retry_policy.clone(),
            stats: Arc::clone(&self.stats),
            progress_buffer: self.progress_buffer,
        }
    }
}

/// Bounded pool of job executors.
pub struct WorkerPool<T, L>
where
    T: Tagger + ?Sized + 'static,
    L: LyricsProvider + ?Sized + 'static,
{
    config: WorkerConfig,
    context: SlotContext<T, L>,

    // Runtime state
    running: Arc<AtomicBool>,
    slots: Arc<AtomicUsize>,
    parallel_mode: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<T, L> WorkerPool<T, L>
where
    T: Tagger + ?Sized + 'static,
    L: LyricsProvider + ?Sized + 'static,
{
    /// Create a new pool. Nothing runs until `start`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        settings: Arc<SettingsHandle>,
        extractor: Arc<dyn Extractor>,
        postprocessor: PostProcessor<T, L>,
        queue: JobQueue,
        reporter: ProgressReporter,
        folder_locks: FolderLocks,
        retry_policy: RetryPolicy,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let progress_buffer = config.progress_buffer.max(1);

        Self {
            config,
            context: SlotContext {
                store,
                settings,
                extractor,
                postprocessor,
                queue,
                reporter,
                folder_locks,
                retry_policy,
                stats: Arc::new(PoolStats::default()),
                progress_buffer,
            },
            running: Arc::new(AtomicBool::new(false)),
            slots: Arc::new(AtomicUsize::new(0)),
            parallel_mode: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Start the slots. The slot count is read from the settings now and
    /// stays fixed until the pool is stopped and started again.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        let settings = self.context.settings.snapshot();
        let slots = settings.slot_count();
        self.slots.store(slots, Ordering::SeqCst);
        self.parallel_mode
            .store(settings.parallel_mode, Ordering::SeqCst);

        info!(
            slots,
            parallel = settings.parallel_mode,
            "Starting worker pool"
        );

        let mut handles = self.handles.lock().await;
        for slot in 0..slots {
            let ctx = self.context.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let stagger = Duration::from_millis(self.config.stagger_start_ms * slot as u64);
            handles.push(tokio::spawn(ctx.slot_loop(slot, stagger, shutdown_rx)));
        }
    }

    /// Stop taking new jobs and wait for slots to finish the job they hold.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping worker pool");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker slot ended abnormally: {}", e);
            }
        }
        self.slots.store(0, Ordering::SeqCst);
        info!("Worker pool stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PoolStatus {
        self.context.stats.to_status(
            self.is_running(),
            self.slots.load(Ordering::SeqCst),
            self.parallel_mode.load(Ordering::SeqCst),
            self.context.queue.pending(),
        )
    }

    pub fn folder_locks(&self) -> &FolderLocks {
        &self.context.folder_locks
    }
}

impl<T, L> SlotContext<T, L>
where
    T: Tagger + ?Sized + 'static,
    L: LyricsProvider + ?Sized + 'static,
{
    async fn slot_loop(
        self,
        slot: usize,
        stagger: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        if !stagger.is_zero() {
            tokio::select! {
                _ = shutdown_rx.recv() => return,
                _ = tokio::time::sleep(stagger) => {}
            }
        }
        debug!(slot, "Worker slot ready");

        loop {
            let job_id = tokio::select! {
                _ = shutdown_rx.recv() => break,
                next = self.queue.pop() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            // A job that was dequeued runs to a terminal state.
            self.run_job(slot, job_id).await;
        }

        debug!(slot, "Worker slot stopped");
    }

    /// Own one job from `running` to `done`/`failed`.
    async fn run_job(&self, slot: usize, job_id: String) {
        let job = match self.store.mark_running(&job_id) {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Skipping job that cannot start");
                return;
            }
        };
        self.reporter.publish_job(&job);

        self.stats.active.fetch_add(1, Ordering::Relaxed);
        JOBS_RUNNING.inc();
        let started = Instant::now();
        info!(slot, job_id = %job.id, locator = %job.locator, "Job started");

        // Run in its own task so a panic fails this job only.
        let ctx = self.clone();
        let outcome = match tokio::spawn(async move { ctx.execute(job).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                WORKER_PANICS.inc();
                error!(job_id = %job_id, error = %e, "Job execution panicked");
                Err(JobFailure::new(
                    FailureKind::Internal,
                    format!("worker task failed: {}", e),
                ))
            }
        };

        let (finished, result) = match outcome {
            Ok(output_path) => (self.store.mark_done(&job_id, output_path), "done"),
            Err(failure) => {
                warn!(
                    job_id = %job_id,
                    kind = failure.kind.as_str(),
                    "Job failed: {}",
                    failure.message
                );
                (self.store.mark_failed(&job_id, failure), "failed")
            }
        };

        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        JOBS_RUNNING.dec();
        JOBS_FINISHED.with_label_values(&[result]).inc();
        JOB_DURATION
            .with_label_values(&[result])
            .observe(started.elapsed().as_secs_f64());
        if result == "done" {
            self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        }

        match finished {
            Ok(job) => {
                self.reporter.publish_job(&job);
                info!(
                    slot,
                    job_id = %job.id,
                    status = %job.status,
                    attempts = job.retry.attempts,
                    "Job finished"
                );
            }
            Err(e) => error!(job_id = %job_id, error = %e, "Failed to record job outcome"),
        }
    }

    /// Attempt loop with in-slot retries. Returns the first produced file.
    async fn execute(&self, job: Job) -> Result<Option<PathBuf>, JobFailure> {
        // Settings are frozen for the whole job.
        let settings = self.settings.snapshot();
        let _lease = self.folder_locks.shared(&job.destination).await;

        loop {
            let attempt = self
                .store
                .begin_attempt(&job.id)
                .map_err(|e| JobFailure::new(FailureKind::Internal, e.to_string()))?;
            if let Ok(Some(current)) = self.store.get(&job.id) {
                self.reporter.publish_job(&current);
            }

            let failure = match self.attempt(&job, &settings).await {
                Ok(output) => return Ok(output),
                Err(failure) => failure,
            };
            JOB_FAILURES.with_label_values(&[failure.kind.as_str()]).inc();

            if !self.retry_policy.should_retry(attempt, failure.kind) {
                return Err(failure);
            }

            let delay = self.retry_policy.next_delay(attempt);
            let next_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            match self.store.schedule_retry(&job.id, next_at, &failure.message) {
                Ok(updated) => self.reporter.publish_job(&updated),
                Err(e) => return Err(JobFailure::new(FailureKind::Internal, e.to_string())),
            }

            self.stats.total_retries.fetch_add(1, Ordering::Relaxed);
            JOB_RETRIES.with_label_values(&[failure.kind.as_str()]).inc();
            warn!(
                job_id = %job.id,
                attempt,
                max_attempts = self.retry_policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying: {}",
                failure.message
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One extraction plus post-processing of everything it produced.
    async fn attempt(&self, job: &Job, settings: &Settings) -> Result<Option<PathBuf>, JobFailure> {
        let request = ExtractRequest {
            job_id: job.id.clone(),
            locator: job.locator.clone(),
            destination: job.destination.clone(),
            format: job.format,
            music_only: settings.music_only,
            cookies_file: settings.cookies_file.clone(),
            cookies_browser: settings.cookies_browser.clone(),
            filename_template: settings.filename_template.clone(),
            track_index: job.track_index,
        };

        let (progress_tx, mut progress_rx) =
            mpsc::channel::<ExtractProgress>(self.progress_buffer);
        let relay = {
            let store = Arc::clone(&self.store);
            let reporter = self.reporter.clone();
            let job_id = job.id.clone();
            tokio::spawn(async move {
                while let Some(progress) = progress_rx.recv().await {
                    let snapshot = ProgressSnapshot {
                        percent: progress.percent,
                        speed: progress.speed,
                        eta: progress.eta,
                        current_file: progress.current_file,
                    };
                    match store.update_progress(&job_id, snapshot) {
                        Ok(updated) => reporter.publish_job(&updated),
                        Err(e) => debug!(job_id = %job_id, error = %e, "Dropping progress update"),
                    }
                }
            })
        };

        let result = self.extractor.extract(request, progress_tx).await;
        // The sender went away with the extract future; drain what is left.
        let _ = relay.await;

        let output = result.map_err(|e| JobFailure::new(e.failure_kind(), e.to_string()))?;
        if output.tracks.is_empty() {
            return Err(JobFailure::new(
                FailureKind::FormatUnavailable,
                "extraction produced no audio file",
            ));
        }

        let ctx = PostProcessContext {
            album_fallback: job.folder_name(),
            track_index: job.track_index,
            lyrics_enabled: settings.lyrics_mode,
        };
        let store = Arc::clone(&self.store);
        let reporter = self.reporter.clone();
        let job_id = job.id.clone();
        let on_phase = move |phase| {
            if let Ok(updated) = store.set_phase(&job_id, phase) {
                reporter.publish_job(&updated);
            }
        };

        for track in &output.tracks {
            let report = self
                .postprocessor
                .process(track, &ctx, &on_phase)
                .await
                .map_err(|e| JobFailure::new(e.failure_kind(), e.to_string()))?;
            debug!(
                job_id = %job.id,
                path = %track.audio_path.display(),
                cover = report.cover_embedded,
                lyrics = report.lyrics_written,
                removed = report.removed_files.len(),
                "Track finished"
            );
        }

        Ok(output.tracks.first().map(|t| t.audio_path.clone()))
    }
}

//! Submission API over the job store and the work queue.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::policy::RetryPolicy;
use crate::config::SettingsHandle;
use crate::extractor::{clean_url, Extractor, ExtractorError};
use crate::job::{
    AudioFormat, CreateJobRequest, FailureKind, Job, JobError, JobFailure, JobFilter, JobKind,
    JobStore,
};
use crate::metrics::JOBS_SUBMITTED;
use crate::progress::ProgressReporter;
use crate::worker::{JobQueue, PoolError};

/// Errors returned by the job manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Playlist resolution failed: {0}")]
    Playlist(#[from] ExtractorError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Queue(#[from] PoolError),
}

/// Fully specified submission.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub locator: String,
    /// Absolute destination folder.
    pub destination: PathBuf,
    pub format: AudioFormat,
    pub track_index: Option<u32>,
}

impl SubmitRequest {
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

/// One album of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub album: String,
    pub url: String,
}

/// Check a user-supplied folder name and resolve it under `root`.
///
/// Nested names (`Artist/Album`) are allowed; anything that would leave the
/// root is not.
pub fn resolve_folder(root: &Path, name: &str) -> Result<PathBuf, ManagerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ManagerError::InvalidRequest("folder name is empty".to_string()));
    }

    let relative = Path::new(trimmed);
    let mut parts = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => parts += 1,
            Component::CurDir => {}
            _ => {
                return Err(ManagerError::InvalidRequest(format!(
                    "folder name must stay inside the music folder: {}",
                    name
                )))
            }
        }
    }
    if parts == 0 {
        return Err(ManagerError::InvalidRequest(format!(
            "folder name has no usable component: {}",
            name
        )));
    }

    Ok(root.join(relative))
}

/// Resolve a playlist name to its folder under `playlists_root`.
///
/// Playlists are flat: the name must be a single folder.
pub fn resolve_playlist_folder(
    playlists_root: &Path,
    name: &str,
) -> Result<PathBuf, ManagerError> {
    if name.contains(['/', '\\']) {
        return Err(ManagerError::InvalidRequest(format!(
            "playlist name must not contain path separators: {}",
            name
        )));
    }
    resolve_folder(playlists_root, name)
}

/// Job registry front: validates submissions, creates jobs and enqueues them.
pub struct JobManager {
    store: Arc<dyn JobStore>,
    settings: Arc<SettingsHandle>,
    extractor: Arc<dyn Extractor>,
    queue: JobQueue,
    reporter: ProgressReporter,
    retry_policy: RetryPolicy,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        settings: Arc<SettingsHandle>,
        extractor: Arc<dyn Extractor>,
        queue: JobQueue,
        reporter: ProgressReporter,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            settings,
            extractor,
            queue,
            reporter,
            retry_policy,
        }
    }

    /// Create a queued job and hand it to the pool. Never blocks on work.
    pub fn submit(&self, request: SubmitRequest) -> Result<String, ManagerError> {
        let locator = request.locator.trim();
        if locator.is_empty() {
            return Err(ManagerError::InvalidRequest("locator is empty".to_string()));
        }

        let mut create = CreateJobRequest::new(
            request.kind,
            clean_url(locator),
            request.destination,
            request.format,
        );
        if let Some(index) = request.track_index {
            create = create.with_track_index(index);
        }

        let job = self.store.create(create).map_err(|e| match e {
            JobError::InvalidRequest(msg) => ManagerError::InvalidRequest(msg),
            other => ManagerError::Job(other),
        })?;
        // Observers must see `queued` before any worker can pick the job up.
        self.reporter.publish_job(&job);
        if let Err(e) = self.queue.push(job.id.clone()) {
            self.abandon(&job.id, &e);
            return Err(e.into());
        }

        JOBS_SUBMITTED.with_label_values(&[job.kind.as_str()]).inc();
        debug!(
            job_id = %job.id,
            kind = %job.kind.as_str(),
            destination = %job.destination.display(),
            "Job queued"
        );
        Ok(job.id)
    }

    /// Fail a job that never reached the queue.
    fn abandon(&self, job_id: &str, error: &PoolError) {
        let failure = JobFailure::new(FailureKind::Internal, error.to_string());
        let result = self.store.mark_running(job_id).and_then(|running| {
            self.reporter.publish_job(&running);
            self.store.mark_failed(job_id, failure)
        });
        match result {
            Ok(job) => self.reporter.publish_job(&job),
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to fail unqueued job"),
        }
    }

    /// Single locator into `music_folder/<folder_name>`.
    pub fn submit_single(
        &self,
        locator: &str,
        folder_name: &str,
        format: Option<AudioFormat>,
    ) -> Result<String, ManagerError> {
        let settings = self.settings.snapshot();
        let destination = resolve_folder(&settings.music_folder, folder_name)?;
        let format = format.unwrap_or_else(|| settings.default_format());

        let id = self.submit(SubmitRequest::new(JobKind::Single, locator, destination, format))?;
        info!(job_id = %id, folder = %folder_name, "Single download submitted");
        Ok(id)
    }

    /// Resolve a playlist and queue one job per member into
    /// `music_folder/Playlists/<playlist_name>`.
    ///
    /// Every member is validated before any job is created.
    pub async fn submit_playlist(
        &self,
        locator: &str,
        playlist_name: &str,
        format: Option<AudioFormat>,
    ) -> Result<Vec<String>, ManagerError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(ManagerError::InvalidRequest("locator is empty".to_string()));
        }

        let settings = self.settings.snapshot();
        let destination = resolve_playlist_folder(&settings.playlists_folder(), playlist_name)?;
        let format = format.unwrap_or_else(|| settings.default_format());

        let entries = self.extractor.list_playlist(locator).await?;
        if entries.is_empty() {
            return Err(ExtractorError::EmptyPlaylist {
                locator: locator.to_string(),
            }
            .into());
        }

        let mut requests = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.url.trim().is_empty() {
                return Err(ManagerError::InvalidRequest(format!(
                    "playlist member {} has an empty url",
                    entry.index
                )));
            }
            requests.push(
                SubmitRequest::new(JobKind::PlaylistItem, entry.url, destination.clone(), format)
                    .with_track_index(entry.index),
            );
        }

        let ids = requests
            .into_iter()
            .map(|r| self.submit(r))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            playlist = %playlist_name,
            jobs = ids.len(),
            "Playlist submitted"
        );
        Ok(ids)
    }

    /// One job per album into `music_folder/<artist>/<album>`.
    ///
    /// All items are validated before any job is created.
    pub fn submit_batch(
        &self,
        artist: &str,
        items: &[BatchItem],
        format: Option<AudioFormat>,
    ) -> Result<Vec<String>, ManagerError> {
        if items.is_empty() {
            return Err(ManagerError::InvalidRequest("batch has no items".to_string()));
        }

        let settings = self.settings.snapshot();
        let artist_dir = resolve_folder(&settings.music_folder, artist)?;
        let format = format.unwrap_or_else(|| settings.default_format());

        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            if item.url.trim().is_empty() {
                return Err(ManagerError::InvalidRequest(format!(
                    "album '{}' has an empty url",
                    item.album
                )));
            }
            let destination = resolve_folder(&artist_dir, &item.album)?;
            requests.push(SubmitRequest::new(
                JobKind::BatchItem,
                item.url.as_str(),
                destination,
                format,
            ));
        }

        let ids = requests
            .into_iter()
            .map(|r| self.submit(r))
            .collect::<Result<Vec<_>, _>>()?;
        info!(artist = %artist, jobs = ids.len(), "Batch submitted");
        Ok(ids)
    }

    pub fn get(&self, job_id: &str) -> Result<Job, ManagerError> {
        self.store
            .get(job_id)?
            .ok_or_else(|| ManagerError::NotFound(job_id.to_string()))
    }

    /// All jobs in submission order.
    pub fn list(&self) -> Result<Vec<Job>, ManagerError> {
        Ok(self.store.list(&JobFilter::new())?)
    }

    pub fn list_filtered(&self, filter: &JobFilter) -> Result<Vec<Job>, ManagerError> {
        Ok(self.store.list(filter)?)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::job::{JobStatus, MemoryJobStore};
    use crate::testing::{fixtures, MockExtractor};

    struct Fixture {
        manager: JobManager,
        extractor: MockExtractor,
        queue: JobQueue,
    }

    fn fixture() -> Fixture {
        let settings = Settings {
            music_folder: PathBuf::from("/music"),
            ..Default::default()
        };
        let extractor = MockExtractor::new();
        let queue = JobQueue::new();
        let manager = JobManager::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(SettingsHandle::new(settings)),
            Arc::new(extractor.clone()),
            queue.clone(),
            ProgressReporter::default(),
            RetryPolicy::default(),
        );
        Fixture {
            manager,
            extractor,
            queue,
        }
    }

    #[test]
    fn test_resolve_folder() {
        let root = Path::new("/music");
        assert_eq!(
            resolve_folder(root, "Artist/Album").unwrap(),
            PathBuf::from("/music/Artist/Album")
        );
        assert_eq!(resolve_folder(root, " Test ").unwrap(), PathBuf::from("/music/Test"));
        assert!(resolve_folder(root, "").is_err());
        assert!(resolve_folder(root, "   ").is_err());
        assert!(resolve_folder(root, "../etc").is_err());
        assert!(resolve_folder(root, "A/../../x").is_err());
        assert!(resolve_folder(root, "/abs").is_err());
        assert!(resolve_folder(root, ".").is_err());
    }

    #[test]
    fn test_resolve_playlist_folder_is_flat() {
        let root = Path::new("/music/Playlists");
        assert_eq!(
            resolve_playlist_folder(root, "Road Trip").unwrap(),
            PathBuf::from("/music/Playlists/Road Trip")
        );
        assert!(resolve_playlist_folder(root, "A/B").is_err());
        assert!(resolve_playlist_folder(root, "A\\B").is_err());
        assert!(resolve_playlist_folder(root, "..").is_err());
    }

    #[test]
    fn test_submit_publishes_queued_snapshot() {
        let f = fixture();
        let mut subscription = f.manager.reporter.subscribe();
        let id = f.manager.submit_single("https://x/1", "A", None).unwrap();

        let event = tokio_test::block_on(subscription.recv()).unwrap();
        assert_eq!(event.job_id, id);
        assert_eq!(event.status, JobStatus::Queued);
    }

    #[test]
    fn test_submit_single_queues_job() {
        let f = fixture();
        let id = f
            .manager
            .submit_single("https://youtu.be/x?si=abc", "Test", Some(AudioFormat::Flac))
            .unwrap();

        let job = f.manager.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.kind, JobKind::Single);
        assert_eq!(job.destination, PathBuf::from("/music/Test"));
        assert_eq!(job.format, AudioFormat::Flac);
        assert_eq!(f.queue.pending(), 1);
    }

    #[test]
    fn test_submit_defaults_format_from_settings() {
        let f = fixture();
        let id = f.manager.submit_single("https://x/1", "A", None).unwrap();
        assert_eq!(f.manager.get(&id).unwrap().format, AudioFormat::Flac);
    }

    #[test]
    fn test_submit_rejects_empty_locator() {
        let f = fixture();
        let err = f.manager.submit_single("  ", "Test", None).unwrap_err();
        assert!(matches!(err, ManagerError::InvalidRequest(_)));
        assert_eq!(f.queue.pending(), 0);
        assert!(f.manager.list().unwrap().is_empty());
    }

    #[test]
    fn test_submit_rejects_relative_destination() {
        let f = fixture();
        let err = f
            .manager
            .submit(SubmitRequest::new(
                JobKind::Single,
                "https://x/1",
                "relative/dir",
                AudioFormat::Mp3,
            ))
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidRequest(_)));
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.manager.get("nope"),
            Err(ManagerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_playlist_creates_job_per_member() {
        let f = fixture();
        f.extractor
            .set_playlist("https://x/list", fixtures::playlist_entries("p", 5))
            .await;

        let ids = f
            .manager
            .submit_playlist("https://x/list", "Road Trip", None)
            .await
            .unwrap();
        assert_eq!(ids.len(), 5);

        let jobs = f.manager.list().unwrap();
        assert_eq!(jobs.len(), 5);
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.kind, JobKind::PlaylistItem);
            assert_eq!(job.destination, PathBuf::from("/music/Playlists/Road Trip"));
            assert_eq!(job.track_index, Some(i as u32 + 1));
        }
    }

    #[tokio::test]
    async fn test_submit_empty_playlist_fails() {
        let f = fixture();
        let err = f
            .manager
            .submit_playlist("https://x/empty", "Mix", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Playlist(ExtractorError::EmptyPlaylist { .. })
        ));
        assert!(f.manager.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_playlist_with_bad_member_creates_nothing() {
        let f = fixture();
        let mut entries = fixtures::playlist_entries("p", 4);
        entries[2].url = "  ".to_string();
        f.extractor.set_playlist("https://x/list", entries).await;

        let err = f
            .manager
            .submit_playlist("https://x/list", "Road Trip", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidRequest(_)));
        assert!(f.manager.list().unwrap().is_empty());
        assert_eq!(f.queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_submit_playlist_rejects_nested_name() {
        let f = fixture();
        f.extractor
            .set_playlist("https://x/list", fixtures::playlist_entries("p", 2))
            .await;

        let err = f
            .manager
            .submit_playlist("https://x/list", "Road/Trip", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidRequest(_)));
        assert!(f.manager.list().unwrap().is_empty());
    }

    #[test]
    fn test_submit_batch() {
        let f = fixture();
        let items = vec![
            BatchItem {
                album: "First".to_string(),
                url: "https://x/a".to_string(),
            },
            BatchItem {
                album: "Second".to_string(),
                url: "https://x/b".to_string(),
            },
        ];

        let ids = f
            .manager
            .submit_batch("Band", &items, Some(AudioFormat::Mp3))
            .unwrap();
        assert_eq!(ids.len(), 2);

        let jobs = f.manager.list().unwrap();
        assert_eq!(jobs[0].destination, PathBuf::from("/music/Band/First"));
        assert_eq!(jobs[1].destination, PathBuf::from("/music/Band/Second"));
        assert!(jobs.iter().all(|j| j.kind == JobKind::BatchItem));
    }

    #[test]
    fn test_submit_batch_is_all_or_nothing() {
        let f = fixture();
        let items = vec![
            BatchItem {
                album: "Ok".to_string(),
                url: "https://x/a".to_string(),
            },
            BatchItem {
                album: "../escape".to_string(),
                url: "https://x/b".to_string(),
            },
        ];

        assert!(f.manager.submit_batch("Band", &items, None).is_err());
        assert!(f.manager.list().unwrap().is_empty());
    }
}

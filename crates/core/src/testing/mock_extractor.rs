//! Mock extractor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::extractor::{
    ExtractProgress, ExtractRequest, ExtractedTrack, ExtractionOutput, Extractor, ExtractorError,
    PlaylistEntry, TrackMetadata,
};
use crate::job::FailureKind;

/// Build the extractor error that a real run would classify as `kind`.
pub fn error_for_kind(kind: FailureKind) -> ExtractorError {
    let message = format!("simulated {}", kind.as_str());
    match kind {
        FailureKind::Network => ExtractorError::Network { message },
        FailureKind::FileLocked => ExtractorError::FileLocked { message },
        FailureKind::Authorization => ExtractorError::Forbidden {
            message: "HTTP Error 403: Forbidden".to_string(),
        },
        FailureKind::FormatUnavailable => ExtractorError::FormatUnavailable { message },
        FailureKind::MalformedLocator => ExtractorError::MalformedLocator { message },
        FailureKind::ToolMissing => ExtractorError::ToolNotFound {
            path: PathBuf::from("yt-dlp"),
        },
        FailureKind::Tagging | FailureKind::Internal => ExtractorError::failed(message, None),
    }
}

/// Mock implementation of the Extractor trait.
///
/// Successful calls write a small placeholder audio file, an `.info.json`
/// sidecar and a thumbnail into the request's destination, like a real run.
/// Failures can be queued per locator or for any locator.
///
/// # Example
///
/// ```rust,ignore
/// use snowsky_core::testing::MockExtractor;
///
/// let extractor = MockExtractor::new();
/// extractor.queue_failure(FailureKind::FileLocked).await;
/// extractor.set_playlist("https://x/list", entries).await;
/// ```
#[derive(Debug, Clone)]
pub struct MockExtractor {
    requests: Arc<RwLock<Vec<ExtractRequest>>>,
    /// Failures consumed by the next calls for any locator.
    failures: Arc<RwLock<VecDeque<FailureKind>>>,
    /// Failures consumed by calls for a given locator.
    locator_failures: Arc<RwLock<HashMap<String, VecDeque<FailureKind>>>>,
    playlists: Arc<RwLock<HashMap<String, Vec<PlaylistEntry>>>>,
    metadata: Arc<RwLock<HashMap<String, TrackMetadata>>>,
    delay: Arc<RwLock<Duration>>,
    write_thumbnail: Arc<RwLock<bool>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(VecDeque::new())),
            locator_failures: Arc::new(RwLock::new(HashMap::new())),
            playlists: Arc::new(RwLock::new(HashMap::new())),
            metadata: Arc::new(RwLock::new(HashMap::new())),
            delay: Arc::new(RwLock::new(Duration::from_millis(10))),
            write_thumbnail: Arc::new(RwLock::new(true)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the next call (any locator) with `kind`.
    pub async fn queue_failure(&self, kind: FailureKind) {
        self.failures.write().await.push_back(kind);
    }

    /// Fail the next calls for `locator`, one entry per call.
    pub async fn fail_locator(&self, locator: &str, kinds: Vec<FailureKind>) {
        self.locator_failures
            .write()
            .await
            .entry(locator.to_string())
            .or_default()
            .extend(kinds);
    }

    pub async fn set_playlist(&self, locator: &str, entries: Vec<PlaylistEntry>) {
        self.playlists
            .write()
            .await
            .insert(locator.to_string(), entries);
    }

    /// Sidecar metadata written for `locator`.
    pub async fn set_metadata(&self, locator: &str, metadata: TrackMetadata) {
        self.metadata
            .write()
            .await
            .insert(locator.to_string(), metadata);
    }

    /// Simulated transfer time per call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    pub async fn set_write_thumbnail(&self, write: bool) {
        *self.write_thumbnail.write().await = write;
    }

    /// All requests seen, in call order.
    pub async fn recorded_requests(&self) -> Vec<ExtractRequest> {
        self.requests.read().await.clone()
    }

    /// Number of calls made for `locator`.
    pub async fn attempts_for(&self, locator: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.locator == locator)
            .count()
    }

    /// Highest number of calls that were in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn next_failure(&self, locator: &str) -> Option<FailureKind> {
        if let Some(queue) = self.locator_failures.write().await.get_mut(locator) {
            if let Some(kind) = queue.pop_front() {
                return Some(kind);
            }
        }
        self.failures.write().await.pop_front()
    }

    async fn write_outputs(
        &self,
        request: &ExtractRequest,
    ) -> Result<ExtractedTrack, ExtractorError> {
        let mut metadata = self
            .metadata
            .read()
            .await
            .get(&request.locator)
            .cloned()
            .unwrap_or_default();
        let title = metadata
            .title
            .clone()
            .unwrap_or_else(|| title_from_locator(&request.locator));
        metadata.title.get_or_insert_with(|| title.clone());

        let stem = match request.track_index {
            Some(index) => format!("{:02} - {}", index, title),
            None => title,
        };

        tokio::fs::create_dir_all(&request.destination).await?;
        let audio_path = request
            .destination
            .join(format!("{}.{}", stem, request.format.extension()));
        tokio::fs::write(&audio_path, b"mock audio").await?;

        let sidecar_path = request.destination.join(format!("{}.info.json", stem));
        let sidecar = serde_json::json!({
            "title": metadata.title,
            "artist": metadata.artist,
            "album": metadata.album,
            "track_number": metadata.track_number,
        });
        tokio::fs::write(&sidecar_path, sidecar.to_string()).await?;

        let thumbnail_path = if *self.write_thumbnail.read().await {
            let path = request.destination.join(format!("{}.png", stem));
            super::fixtures::write_test_png(&path, 32, 24)?;
            Some(path)
        } else {
            None
        };

        Ok(ExtractedTrack {
            audio_path,
            sidecar_path: Some(sidecar_path),
            thumbnail_path,
            metadata,
        })
    }
}

/// Last path or query segment of a locator, reduced to safe characters.
fn title_from_locator(locator: &str) -> String {
    let segment = locator
        .rsplit(|c| c == '/' || c == '=')
        .find(|s| !s.is_empty())
        .unwrap_or("track");
    let cleaned: String = segment
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "track".to_string()
    } else {
        cleaned
    }
}

/// Decrements the in-flight counter on drop.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self) -> Result<(), ExtractorError> {
        Ok(())
    }

    async fn list_playlist(&self, locator: &str) -> Result<Vec<PlaylistEntry>, ExtractorError> {
        match self.playlists.read().await.get(locator) {
            Some(entries) if !entries.is_empty() => Ok(entries.clone()),
            _ => Err(ExtractorError::EmptyPlaylist {
                locator: locator.to_string(),
            }),
        }
    }

    async fn extract(
        &self,
        request: ExtractRequest,
        progress_tx: mpsc::Sender<ExtractProgress>,
    ) -> Result<ExtractionOutput, ExtractorError> {
        self.requests.write().await.push(request.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(Arc::clone(&self.active));
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        for percent in [25.0, 50.0, 100.0] {
            let _ = progress_tx.try_send(ExtractProgress {
                job_id: request.job_id.clone(),
                percent,
                total_size: Some("3.00MiB".to_string()),
                speed: Some("1.00MiB/s".to_string()),
                eta: Some("00:01".to_string()),
                current_file: Some(title_from_locator(&request.locator)),
            });
            tokio::time::sleep(delay / 3).await;
        }

        if let Some(kind) = self.next_failure(&request.locator).await {
            return Err(error_for_kind(kind));
        }

        let track = self.write_outputs(&request).await?;
        Ok(ExtractionOutput {
            tracks: vec![track],
        })
    }
}

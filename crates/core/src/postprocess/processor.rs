//! Finishing steps for an extracted track.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::artwork::{ensure_folder_cover, find_cover_source, prepare_cover, resized_cover_path};
use super::cleanup::remove_with_retry;
use super::tagger::{TagSet, Tagger, TaggerError};
use crate::extractor::ExtractedTrack;
use crate::job::{FailureKind, JobPhase};
use crate::lyrics::{title_from_filename, LyricsError, LyricsProvider, LyricsQuery};
use crate::metrics::POSTPROCESS_STEPS;

/// Artist tag used when the sidecar has none.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Post-processing errors. Only tagging is fatal to a job.
#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("Tagging failed: {0}")]
    Tagging(#[from] TaggerError),
}

impl PostProcessError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PostProcessError::Tagging(e) if e.is_lock() => FailureKind::FileLocked,
            PostProcessError::Tagging(_) => FailureKind::Tagging,
        }
    }
}

/// Per-track inputs that are not in the extractor output.
#[derive(Debug, Clone)]
pub struct PostProcessContext {
    /// Album name when the sidecar carries none.
    pub album_fallback: String,
    /// Playlist position, overriding the sidecar's track number.
    pub track_index: Option<u32>,
    pub lyrics_enabled: bool,
}

/// What post-processing did for one track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProcessReport {
    pub tagged: bool,
    pub cover_embedded: bool,
    pub lyrics_written: bool,
    pub removed_files: Vec<PathBuf>,
}

/// Outcome of a lyrics sidecar lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LyricsOutcome {
    Written,
    AlreadyPresent,
    NotFound,
}

/// Path of the lyrics sidecar for an audio file.
pub fn lyrics_path(audio_path: &Path) -> PathBuf {
    audio_path.with_extension("lrc")
}

/// Fetch lyrics for `audio_path` and write the `.lrc` sidecar if a match exists.
pub async fn write_lyrics_sidecar<L: LyricsProvider + ?Sized>(
    provider: &L,
    audio_path: &Path,
    query: &LyricsQuery,
) -> Result<LyricsOutcome, LyricsError> {
    let path = lyrics_path(audio_path);
    if path.exists() {
        return Ok(LyricsOutcome::AlreadyPresent);
    }

    match provider.fetch(query).await? {
        Some(lyrics) => {
            tokio::fs::write(&path, lyrics.text.as_bytes()).await?;
            Ok(LyricsOutcome::Written)
        }
        None => Ok(LyricsOutcome::NotFound),
    }
}

/// Runs tagging, artwork, lyrics and cleanup on extracted tracks.
pub struct PostProcessor<T: Tagger + ?Sized, L: LyricsProvider + ?Sized> {
    tagger: Arc<T>,
    lyrics: Arc<L>,
}

impl<T: Tagger + ?Sized, L: LyricsProvider + ?Sized> Clone for PostProcessor<T, L> {
    fn clone(&self) -> Self {
        Self {
            tagger: Arc::clone(&self.tagger),
            lyrics: Arc::clone(&self.lyrics),
        }
    }
}

impl<T: Tagger + ?Sized, L: LyricsProvider + ?Sized> PostProcessor<T, L> {
    pub fn new(tagger: Arc<T>, lyrics: Arc<L>) -> Self {
        Self { tagger, lyrics }
    }

    pub fn tagger(&self) -> &Arc<T> {
        &self.tagger
    }

    pub fn lyrics(&self) -> &Arc<L> {
        &self.lyrics
    }

    /// Tag values for a track, filling gaps from the file name and context.
    pub fn resolve_tags(track: &ExtractedTrack, ctx: &PostProcessContext) -> TagSet {
        let meta = &track.metadata;
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        TagSet {
            title: non_empty(&meta.title).unwrap_or_else(|| title_from_filename(&track.audio_path)),
            artist: non_empty(&meta.artist).unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: non_empty(&meta.album).unwrap_or_else(|| ctx.album_fallback.clone()),
            track_number: ctx.track_index.or(meta.track_number),
        }
    }

    /// Finish one track. `on_phase` is called as each step starts.
    pub async fn process(
        &self,
        track: &ExtractedTrack,
        ctx: &PostProcessContext,
        on_phase: &(dyn Fn(JobPhase) + Send + Sync),
    ) -> Result<PostProcessReport, PostProcessError> {
        let audio = &track.audio_path;
        let mut report = PostProcessReport::default();

        // 1. Tags (required)
        on_phase(JobPhase::Tagging);
        let tags = Self::resolve_tags(track, ctx);
        if let Err(e) = self.tagger.write_tags(audio, &tags).await {
            POSTPROCESS_STEPS.with_label_values(&["tags", "failed"]).inc();
            return Err(e.into());
        }
        POSTPROCESS_STEPS.with_label_values(&["tags", "ok"]).inc();
        report.tagged = true;
        debug!(path = %audio.display(), title = %tags.title, artist = %tags.artist, "Tags written");

        // 2. Artwork
        on_phase(JobPhase::Artwork);
        let resized = resized_cover_path(audio);
        report.cover_embedded = self.embed_artwork(track, &resized).await;
        POSTPROCESS_STEPS
            .with_label_values(&["artwork", if report.cover_embedded { "ok" } else { "skipped" }])
            .inc();

        // 3. Lyrics
        if ctx.lyrics_enabled {
            on_phase(JobPhase::Lyrics);
            let query = LyricsQuery::new(&tags.artist, &tags.title).with_album(&tags.album);
            match write_lyrics_sidecar(self.lyrics.as_ref(), audio, &query).await {
                Ok(LyricsOutcome::Written) => {
                    POSTPROCESS_STEPS.with_label_values(&["lyrics", "ok"]).inc();
                    report.lyrics_written = true;
                    info!(path = %audio.display(), "Lyrics saved");
                }
                Ok(LyricsOutcome::AlreadyPresent) => {}
                Ok(LyricsOutcome::NotFound) => {
                    debug!(artist = %tags.artist, title = %tags.title, "No lyrics found");
                }
                Err(e) => {
                    POSTPROCESS_STEPS.with_label_values(&["lyrics", "failed"]).inc();
                    warn!(
                        artist = %tags.artist,
                        title = %tags.title,
                        error = %e,
                        "Lyrics lookup failed"
                    );
                }
            }
        }

        // 4. Cleanup
        on_phase(JobPhase::Cleanup);
        let leftovers = track
            .sidecar_path
            .iter()
            .chain(track.thumbnail_path.iter())
            .chain(std::iter::once(&resized));
        for path in leftovers {
            match remove_with_retry(path).await {
                Ok(true) => report.removed_files.push(path.clone()),
                Ok(false) => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not remove intermediate file"
                ),
            }
        }

        Ok(report)
    }

    /// Returns true when a cover was embedded. Failures are logged only.
    async fn embed_artwork(&self, track: &ExtractedTrack, resized: &Path) -> bool {
        let audio = &track.audio_path;
        let Some(source) = find_cover_source(audio, track.thumbnail_path.as_deref()) else {
            debug!(path = %audio.display(), "No artwork available");
            return false;
        };

        let jpeg = match prepare_cover(source.clone(), resized.to_path_buf()).await {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Artwork resize failed");
                return false;
            }
        };

        if let Err(e) = self.tagger.embed_cover(audio, &jpeg).await {
            warn!(path = %audio.display(), error = %e, "Cover embed failed");
            return false;
        }

        if let Some(folder) = audio.parent() {
            if let Err(e) = ensure_folder_cover(folder, &jpeg) {
                warn!(folder = %folder.display(), error = %e, "Could not write folder cover");
            }
        }
        true
    }
}

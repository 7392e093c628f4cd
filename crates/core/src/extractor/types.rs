//! Types for the extractor module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::AudioFormat;

/// Everything the extractor needs for one attempt.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub job_id: String,
    pub locator: String,
    pub destination: PathBuf,
    pub format: AudioFormat,
    /// Skip items that are not tagged as music tracks.
    pub music_only: bool,
    pub cookies_file: Option<PathBuf>,
    pub cookies_browser: Option<String>,
    pub filename_template: String,
    /// Playlist position; the item is fetched on its own and numbered with this.
    pub track_index: Option<u32>,
}

/// Transfer progress reported while extracting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractProgress {
    pub job_id: String,
    /// 0.0 - 100.0
    pub percent: f32,
    pub total_size: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub current_file: Option<String>,
}

/// Metadata read from the sidecar written next to the audio file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
}

/// One finished audio file plus its leftovers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTrack {
    pub audio_path: PathBuf,
    /// `.info.json` metadata sidecar.
    pub sidecar_path: Option<PathBuf>,
    /// Raw thumbnail written by the extractor.
    pub thumbnail_path: Option<PathBuf>,
    pub metadata: TrackMetadata,
}

/// Result of a successful extraction. Album URLs yield several tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutput {
    pub tracks: Vec<ExtractedTrack>,
}

/// A member of a playlist, as listed before any transfer happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub url: String,
    pub title: Option<String>,
    /// 1-based position.
    pub index: u32,
}

/// Availability of an external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

//! Configuration for the extractor module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the yt-dlp based extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path to yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Path to ffmpeg binary (only checked for availability, yt-dlp drives it).
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// JavaScript runtime handed to yt-dlp for signature solving. `None` disables it.
    #[serde(default = "default_js_runtime")]
    pub js_runtime: Option<String>,

    /// Timeout for a single extraction in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for listing playlist members in seconds.
    #[serde(default = "default_playlist_timeout")]
    pub playlist_timeout_secs: u64,

    /// Additional yt-dlp arguments, inserted before the URL.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_js_runtime() -> Option<String> {
    Some("node".to_string())
}

fn default_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_playlist_timeout() -> u64 {
    120
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            js_runtime: default_js_runtime(),
            timeout_secs: default_timeout(),
            playlist_timeout_secs: default_playlist_timeout(),
            extra_args: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    /// Sets the yt-dlp path.
    pub fn with_ytdlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    /// Sets the extraction timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Disables the JavaScript runtime flag.
    pub fn without_js_runtime(mut self) -> Self {
        self.js_runtime = None;
        self
    }
}

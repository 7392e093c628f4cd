//! Extraction/transcode adapter.
//!
//! This module provides the `Extractor` trait and the yt-dlp implementation.
//! yt-dlp transfers the media and drives ffmpeg to produce FLAC or MP3; the
//! adapter turns its output into typed progress, a classified error, or the
//! list of produced audio files with their sidecars.
//!
//! # Example
//!
//! ```ignore
//! use snowsky_core::extractor::{Extractor, ExtractRequest, YtDlpExtractor};
//!
//! let extractor = YtDlpExtractor::with_defaults();
//! extractor.validate().await?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let output = extractor.extract(request, tx).await?;
//! println!("Produced {} file(s)", output.tracks.len());
//! ```

mod config;
mod error;
mod parse;
mod traits;
mod types;
mod ytdlp;

pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub(crate) use error::is_lock_error;
pub use parse::{clean_url, parse_info_json, render_template, LineEvent, LineParser};
pub use traits::Extractor;
pub use types::{
    ExtractProgress, ExtractRequest, ExtractedTrack, ExtractionOutput, PlaylistEntry,
    ToolStatus, TrackMetadata,
};
pub use ytdlp::{probe_tool, YtDlpExtractor, THUMBNAIL_EXTENSIONS};

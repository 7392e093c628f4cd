//! Lyrics lookup.
//!
//! `LyricsProvider` is the narrow contract the post-processor and the library
//! maintenance tasks use; `LrclibClient` talks to the LRCLIB HTTP API.

mod lrclib;
mod matching;

pub use lrclib::{LrclibClient, LyricsConfig};
pub use matching::{artist_candidates, clean_title, title_from_filename};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lyrics lookup errors.
#[derive(Debug, Error)]
pub enum LyricsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lyrics API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid lyrics query: {0}")]
    InvalidQuery(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What to look up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsQuery {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
}

impl LyricsQuery {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }
}

/// Lyrics text as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyrics {
    pub text: String,
    /// `true` when `text` carries LRC timestamps.
    pub synced: bool,
}

/// A source of lyrics.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Returns the provider name.
    fn name(&self) -> &str;

    /// Look up lyrics. `Ok(None)` means no match, which is not an error.
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<Lyrics>, LyricsError>;
}

//! Types for the library module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Library errors.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// One album folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub artist: String,
    pub album: String,
    /// Absolute folder path.
    pub path: PathBuf,
    pub tracks: usize,
    /// Cover image relative to the music folder, `/`-separated.
    pub cover: Option<String>,
    /// Audio file names, sorted.
    pub track_files: Vec<String>,
}

/// Result of a full scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub items: Vec<LibraryEntry>,
    pub total_artists: usize,
    pub total_albums: usize,
    pub total_tracks: usize,
}

impl LibrarySnapshot {
    /// Build a snapshot from entries, sorting them and computing totals.
    pub fn from_entries(mut items: Vec<LibraryEntry>) -> Self {
        items.sort_by(|a, b| {
            (a.artist.to_lowercase(), a.album.to_lowercase())
                .cmp(&(b.artist.to_lowercase(), b.album.to_lowercase()))
        });

        let mut artists: Vec<&str> = items.iter().map(|e| e.artist.as_str()).collect();
        artists.sort_unstable();
        artists.dedup();

        Self {
            total_artists: artists.len(),
            total_albums: items.len(),
            total_tracks: items.iter().map(|e| e.tracks).sum(),
            items,
        }
    }

    /// Nested `artist -> album` view.
    pub fn tree(&self) -> LibraryTree {
        let mut tree = LibraryTree::new();
        for entry in &self.items {
            tree.entry(entry.artist.clone()).or_default().insert(
                entry.album.clone(),
                TreeAlbum {
                    path: entry.path.clone(),
                    tracks: entry.tracks,
                    files: entry.track_files.clone(),
                    cover: entry.cover.clone(),
                },
            );
        }
        tree
    }

    pub fn find(&self, artist: &str, album: &str) -> Option<&LibraryEntry> {
        self.items
            .iter()
            .find(|e| e.artist == artist && e.album == album)
    }
}

/// Album node in the tree view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeAlbum {
    pub path: PathBuf,
    pub tracks: usize,
    pub files: Vec<String>,
    pub cover: Option<String>,
}

pub type LibraryTree = BTreeMap<String, BTreeMap<String, TreeAlbum>>;

/// Outcome of copying tracks into a playlist folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyReport {
    pub playlist_path: PathBuf,
    pub copied: usize,
    /// File names already present in the playlist.
    pub skipped: Vec<String>,
    /// Requested sources that do not exist.
    pub missing: Vec<String>,
    pub lyrics_copied: usize,
}

/// Outcome of sidecar cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

/// Outcome of a lyrics backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsScanReport {
    pub scanned: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl LyricsScanReport {
    pub fn merge(&mut self, other: LyricsScanReport) {
        self.scanned += other.scanned;
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

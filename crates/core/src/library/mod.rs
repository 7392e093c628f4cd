//! Library indexer.
//!
//! Scans the music folder into a cached `LibrarySnapshot` grouped by
//! artist and album, copies tracks into playlist folders, and runs the
//! maintenance tasks (sidecar cleanup, lyrics backfill).

mod indexer;
mod scan;
mod types;

pub use indexer::LibraryIndexer;
pub use scan::{
    folder_identity, is_audio_file, is_cover_file, scan_library, AUDIO_EXTENSIONS,
    COVER_EXTENSIONS, PLAYLIST_ARTIST, SIDECAR_SUFFIX, SINGLES_ALBUM,
};
pub use types::{
    CleanupReport, CopyReport, LibraryEntry, LibraryError, LibrarySnapshot, LibraryTree,
    LyricsScanReport, TreeAlbum,
};

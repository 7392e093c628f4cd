//! Filesystem traversal for the library.
//!
//! All functions here are blocking; the indexer runs them on the blocking pool.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use super::types::{LibraryEntry, LibrarySnapshot};
use crate::config::PLAYLISTS_DIR;

/// Audio file extensions the library recognizes.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "wav", "ogg", "opus"];

/// Image extensions accepted as folder covers.
pub const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Artist name given to playlist folders.
pub const PLAYLIST_ARTIST: &str = "Playlist";

/// Album name for tracks directly inside an artist folder.
pub const SINGLES_ALBUM: &str = "Singles";

/// Metadata sidecar suffix left behind by the extractor.
pub const SIDECAR_SUFFIX: &str = ".info.json";

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub fn is_audio_file(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

pub fn is_cover_file(path: &Path) -> bool {
    has_extension(path, COVER_EXTENSIONS)
}

/// Files under `root`, sorted by name within each directory. Unreadable
/// entries are logged and skipped.
fn walk_files(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable library entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
}

/// Artist and album for an album folder, derived from its position under
/// `root`. `None` for `root` itself or paths outside it.
pub fn folder_identity(root: &Path, dir: &Path) -> Option<(String, String)> {
    let relative = dir.strip_prefix(root).ok()?;
    let names: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let folder = names.last()?.clone();
    match names.len() {
        1 => Some((folder, SINGLES_ALBUM.to_string())),
        n if names[n - 2] == PLAYLISTS_DIR => Some((PLAYLIST_ARTIST.to_string(), folder)),
        n => Some((names[n - 2].clone(), folder)),
    }
}

/// `path` relative to `root`, `/`-separated.
pub fn relative_display(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[derive(Default)]
struct FolderFiles {
    tracks: Vec<String>,
    cover: Option<PathBuf>,
}

/// Walk `root` and group audio files by folder. A missing root yields an
/// empty snapshot.
pub fn scan_library(root: &Path) -> LibrarySnapshot {
    if !root.is_dir() {
        return LibrarySnapshot::default();
    }

    let mut folders: BTreeMap<PathBuf, FolderFiles> = BTreeMap::new();
    for entry in walk_files(root) {
        let path = entry.path();
        let Some(parent) = path.parent() else { continue };
        if parent == root {
            continue;
        }

        if is_audio_file(path) {
            folders
                .entry(parent.to_path_buf())
                .or_default()
                .tracks
                .push(entry.file_name().to_string_lossy().into_owned());
        } else if is_cover_file(path) {
            let folder = folders.entry(parent.to_path_buf()).or_default();
            if folder.cover.is_none() {
                folder.cover = Some(path.to_path_buf());
            }
        }
    }

    let entries = folders
        .into_iter()
        .filter(|(_, files)| !files.tracks.is_empty())
        .filter_map(|(dir, mut files)| {
            let (artist, album) = folder_identity(root, &dir)?;
            files.tracks.sort();
            Some(LibraryEntry {
                artist,
                album,
                tracks: files.tracks.len(),
                cover: files
                    .cover
                    .as_deref()
                    .and_then(|c| relative_display(root, c)),
                track_files: files.tracks,
                path: dir,
            })
        })
        .collect();

    LibrarySnapshot::from_entries(entries)
}

/// Audio files directly inside `dir`, sorted.
pub fn audio_files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_audio_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Every folder under `root` (inclusive) that holds audio files.
pub fn audio_folders(root: &Path) -> Vec<PathBuf> {
    let mut folders: Vec<PathBuf> = walk_files(root)
        .filter(|entry| is_audio_file(entry.path()))
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();
    folders.sort();
    folders.dedup();
    folders
}

/// Extractor metadata sidecars anywhere under `root`, with their sizes.
pub fn sidecar_files(root: &Path) -> Vec<(PathBuf, u64)> {
    walk_files(root)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(SIDECAR_SUFFIX))
        .map(|entry| {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (entry.into_path(), size)
        })
        .collect()
}

//! Cached library view plus the maintenance operations that write into it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::scan::{
    audio_files_in, audio_folders, folder_identity, scan_library, sidecar_files, PLAYLIST_ARTIST,
};
use super::types::{
    CleanupReport, CopyReport, LibraryError, LibrarySnapshot, LibraryTree, LyricsScanReport,
};
use crate::config::SettingsHandle;
use crate::lyrics::{title_from_filename, LyricsProvider, LyricsQuery};
use crate::manager::resolve_playlist_folder;
use crate::metrics::{LIBRARY_SCANS, LIBRARY_TRACKS};
use crate::postprocess::{
    lyrics_path, remove_with_retry, write_lyrics_sidecar, LyricsOutcome, TagSummary, Tagger,
    UNKNOWN_ARTIST,
};
use crate::worker::FolderLocks;

async fn blocking<F, R>(f: F) -> Result<R, LibraryError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LibraryError::Task(e.to_string()))
}

/// Library index over the configured music folder.
///
/// The snapshot is computed on first use and replaced only by `refresh`, so
/// completed jobs show up after the next refresh.
pub struct LibraryIndexer {
    settings: Arc<SettingsHandle>,
    folder_locks: FolderLocks,
    tagger: Arc<dyn Tagger>,
    lyrics: Arc<dyn LyricsProvider>,
    cache: RwLock<Option<Arc<LibrarySnapshot>>>,
}

impl LibraryIndexer {
    pub fn new(
        settings: Arc<SettingsHandle>,
        folder_locks: FolderLocks,
        tagger: Arc<dyn Tagger>,
        lyrics: Arc<dyn LyricsProvider>,
    ) -> Self {
        Self {
            settings,
            folder_locks,
            tagger,
            lyrics,
            cache: RwLock::new(None),
        }
    }

    fn root(&self) -> PathBuf {
        self.settings.snapshot().music_folder
    }

    /// Resolve `path` against the music folder and require it to stay inside.
    fn library_path(&self, root: &Path, path: &Path) -> Result<PathBuf, LibraryError> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let escapes = resolved
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || !resolved.starts_with(root) {
            return Err(LibraryError::InvalidName(format!(
                "{} is outside the music folder",
                path.display()
            )));
        }
        Ok(resolved)
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Cached snapshot, scanning on first use.
    pub async fn snapshot(&self) -> Result<Arc<LibrarySnapshot>, LibraryError> {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }
        self.refresh().await
    }

    /// Rescan the music folder and replace the cached snapshot.
    pub async fn refresh(&self) -> Result<Arc<LibrarySnapshot>, LibraryError> {
        let root = self.root();
        debug!(root = %root.display(), "Scanning library");

        let snapshot = Arc::new(blocking(move || scan_library(&root)).await?);
        LIBRARY_SCANS.inc();
        LIBRARY_TRACKS.set(snapshot.total_tracks as i64);

        *self.cache.write().await = Some(Arc::clone(&snapshot));
        info!(
            artists = snapshot.total_artists,
            albums = snapshot.total_albums,
            tracks = snapshot.total_tracks,
            "Library scanned"
        );
        Ok(snapshot)
    }

    pub async fn tree(&self) -> Result<LibraryTree, LibraryError> {
        Ok(self.snapshot().await?.tree())
    }

    pub async fn find_album_path(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<PathBuf>, LibraryError> {
        Ok(self
            .snapshot()
            .await?
            .find(artist, album)
            .map(|entry| entry.path.clone()))
    }

    // =========================================================================
    // Virtual playlists
    // =========================================================================

    /// Copy tracks (and their `.lrc` sidecars) into `Playlists/<name>`.
    /// Files already present are skipped, so repeating a copy adds nothing.
    pub async fn copy_to_playlist(
        &self,
        tracks: &[PathBuf],
        playlist_name: &str,
    ) -> Result<CopyReport, LibraryError> {
        let settings = self.settings.snapshot();
        let root = settings.music_folder.clone();
        let target = resolve_playlist_folder(&settings.playlists_folder(), playlist_name)
            .map_err(|e| LibraryError::InvalidName(e.to_string()))?;

        let _lease = self.folder_locks.exclusive(&target).await;
        tokio::fs::create_dir_all(&target).await?;

        let mut report = CopyReport {
            playlist_path: target.clone(),
            ..Default::default()
        };

        for track in tracks {
            let source = self.library_path(&root, track)?;
            let is_file = tokio::fs::metadata(&source)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            let Some(name) = source.file_name().filter(|_| is_file) else {
                report.missing.push(track.display().to_string());
                continue;
            };

            let dest = target.join(name);
            if tokio::fs::try_exists(&dest).await? {
                report.skipped.push(name.to_string_lossy().into_owned());
                continue;
            }
            tokio::fs::copy(&source, &dest).await?;
            report.copied += 1;

            let lrc = lyrics_path(&source);
            let lrc_dest = lyrics_path(&dest);
            if tokio::fs::try_exists(&lrc).await? && !tokio::fs::try_exists(&lrc_dest).await? {
                tokio::fs::copy(&lrc, &lrc_dest).await?;
                report.lyrics_copied += 1;
            }
        }

        info!(
            playlist = %playlist_name,
            copied = report.copied,
            skipped = report.skipped.len(),
            missing = report.missing.len(),
            "Playlist updated"
        );
        Ok(report)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove leftover extractor sidecars anywhere in the library.
    pub async fn cleanup_sidecars(&self) -> Result<CleanupReport, LibraryError> {
        let root = self.root();
        let sidecars = blocking(move || sidecar_files(&root)).await?;

        let mut report = CleanupReport::default();
        for (path, size) in sidecars {
            match remove_with_retry(&path).await {
                Ok(true) => {
                    report.files_deleted += 1;
                    report.bytes_freed += size;
                }
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove sidecar"),
            }
        }

        info!(
            files = report.files_deleted,
            bytes = report.bytes_freed,
            "Sidecar cleanup finished"
        );
        Ok(report)
    }

    /// Fetch lyrics for tracks in one folder that have no `.lrc` yet.
    pub async fn fetch_missing_lyrics(
        &self,
        folder: &Path,
    ) -> Result<LyricsScanReport, LibraryError> {
        let root = self.root();
        let dir = self.library_path(&root, folder)?;
        if !dir.is_dir() {
            return Err(LibraryError::NotFound(folder.display().to_string()));
        }
        self.lyrics_for_folder(&root, dir).await
    }

    /// `fetch_missing_lyrics` over every folder holding audio.
    pub async fn fetch_missing_lyrics_all(&self) -> Result<LyricsScanReport, LibraryError> {
        let root = self.root();
        let walk_root = root.clone();
        let folders = blocking(move || audio_folders(&walk_root)).await?;

        let mut total = LyricsScanReport::default();
        for folder in folders {
            total.merge(self.lyrics_for_folder(&root, folder).await?);
        }

        info!(
            scanned = total.scanned,
            fetched = total.fetched,
            skipped = total.skipped,
            failed = total.failed,
            "Library lyrics scan finished"
        );
        Ok(total)
    }

    async fn lyrics_for_folder(
        &self,
        root: &Path,
        dir: PathBuf,
    ) -> Result<LyricsScanReport, LibraryError> {
        let identity = folder_identity(root, &dir);
        let files = blocking(move || audio_files_in(&dir)).await??;

        let mut report = LyricsScanReport::default();
        for file in files {
            report.scanned += 1;
            if lyrics_path(&file).exists() {
                report.skipped += 1;
                continue;
            }

            let Some(query) = self.lyrics_query(&file, identity.as_ref()).await else {
                report.failed += 1;
                continue;
            };

            match write_lyrics_sidecar(self.lyrics.as_ref(), &file, &query).await {
                Ok(LyricsOutcome::Written) => report.fetched += 1,
                Ok(LyricsOutcome::AlreadyPresent) => report.skipped += 1,
                Ok(LyricsOutcome::NotFound) => report.failed += 1,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Lyrics lookup failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Query from the file's tags, falling back to its name and folder.
    async fn lyrics_query(
        &self,
        file: &Path,
        identity: Option<&(String, String)>,
    ) -> Option<LyricsQuery> {
        let tags = match self.tagger.read_tags(file).await {
            Ok(tags) => Some(tags),
            Err(e) => {
                debug!(path = %file.display(), error = %e, "Could not read tags");
                None
            }
        };
        let tag = |pick: fn(&TagSummary) -> Option<&String>| {
            tags.as_ref()
                .and_then(pick)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let title = tag(|t| t.title.as_ref()).unwrap_or_else(|| title_from_filename(file));
        if title.is_empty() {
            return None;
        }

        let artist = tag(|t| t.artist.as_ref())
            .or_else(|| {
                identity
                    .map(|(artist, _)| artist.clone())
                    .filter(|artist| artist != PLAYLIST_ARTIST)
            })
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        let query = LyricsQuery::new(artist, title);
        match tag(|t| t.album.as_ref()).or_else(|| identity.map(|(_, album)| album.clone())) {
            Some(album) => Some(query.with_album(album)),
            None => Some(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::lyrics::Lyrics;
    use crate::testing::fixtures::make_album;
    use crate::testing::{MockLyricsProvider, MockTagger};
    use tempfile::TempDir;

    fn lyrics(text: &str) -> Lyrics {
        Lyrics {
            text: text.to_string(),
            synced: false,
        }
    }

    fn indexer_with(dir: &TempDir, lyrics: MockLyricsProvider) -> LibraryIndexer {
        let settings = Settings {
            music_folder: dir.path().to_path_buf(),
            ..Default::default()
        };
        LibraryIndexer::new(
            Arc::new(SettingsHandle::new(settings)),
            FolderLocks::new(),
            Arc::new(MockTagger::new()),
            Arc::new(lyrics),
        )
    }

    fn indexer(dir: &TempDir) -> LibraryIndexer {
        indexer_with(dir, MockLyricsProvider::new())
    }

    #[tokio::test]
    async fn test_snapshot_is_cached_until_refresh() {
        let dir = TempDir::new().unwrap();
        make_album(dir.path(), "Band", "One", 2, "mp3").unwrap();
        let indexer = indexer(&dir);

        let first = indexer.snapshot().await.unwrap();
        assert_eq!(first.total_tracks, 2);

        make_album(dir.path(), "Band", "Two", 3, "mp3").unwrap();
        assert_eq!(indexer.snapshot().await.unwrap().total_tracks, 2);

        let refreshed = indexer.refresh().await.unwrap();
        assert_eq!(refreshed.total_tracks, 5);
        assert_eq!(refreshed.total_albums, 2);
        assert_eq!(*indexer.refresh().await.unwrap(), *refreshed);
    }

    #[tokio::test]
    async fn test_tree_and_find_album_path() {
        let dir = TempDir::new().unwrap();
        let album = make_album(dir.path(), "Band", "One", 1, "flac").unwrap();
        let indexer = indexer(&dir);

        let tree = indexer.tree().await.unwrap();
        assert_eq!(tree["Band"]["One"].files, vec!["01 Track 1.flac"]);
        assert_eq!(
            indexer.find_album_path("Band", "One").await.unwrap(),
            Some(album)
        );
        assert_eq!(indexer.find_album_path("Band", "Nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_copy_to_playlist() {
        let dir = TempDir::new().unwrap();
        let album = make_album(dir.path(), "Band", "One", 2, "mp3").unwrap();
        std::fs::write(album.join("01 Track 1.lrc"), "la").unwrap();
        let indexer = indexer(&dir);

        let tracks = vec![
            album.join("01 Track 1.mp3"),
            PathBuf::from("Band/One/02 Track 2.mp3"),
            album.join("99 Ghost.mp3"),
        ];

        let report = indexer.copy_to_playlist(&tracks, "Mix").await.unwrap();
        assert_eq!(report.copied, 2);
        assert_eq!(report.lyrics_copied, 1);
        assert_eq!(report.missing.len(), 1);
        assert!(report.skipped.is_empty());

        let playlist = dir.path().join("Playlists").join("Mix");
        assert_eq!(report.playlist_path, playlist);
        assert!(playlist.join("01 Track 1.lrc").exists());
        // Sources stay in place.
        assert!(album.join("01 Track 1.mp3").exists());

        let again = indexer.copy_to_playlist(&tracks, "Mix").await.unwrap();
        assert_eq!(again.copied, 0);
        assert_eq!(again.skipped.len(), 2);
        assert_eq!(std::fs::read_dir(&playlist).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_copy_rejects_bad_names_and_outside_paths() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(&dir);

        assert!(matches!(
            indexer.copy_to_playlist(&[], "../escape").await,
            Err(LibraryError::InvalidName(_))
        ));
        assert!(matches!(
            indexer.copy_to_playlist(&[], "Road/Trip").await,
            Err(LibraryError::InvalidName(_))
        ));
        assert!(matches!(
            indexer
                .copy_to_playlist(&[PathBuf::from("/etc/passwd")], "Mix")
                .await,
            Err(LibraryError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_sidecars() {
        let dir = TempDir::new().unwrap();
        let album = make_album(dir.path(), "Band", "One", 1, "mp3").unwrap();
        std::fs::write(album.join("01 Track 1.info.json"), "{}").unwrap();
        std::fs::write(dir.path().join("Band").join("x.info.json"), "1234").unwrap();
        let indexer = indexer(&dir);

        let report = indexer.cleanup_sidecars().await.unwrap();
        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.bytes_freed, 6);
        assert!(album.join("01 Track 1.mp3").exists());

        let again = indexer.cleanup_sidecars().await.unwrap();
        assert_eq!(again, CleanupReport::default());
    }

    #[tokio::test]
    async fn test_fetch_missing_lyrics() {
        let dir = TempDir::new().unwrap();
        let album = make_album(dir.path(), "Band", "One", 3, "mp3").unwrap();
        std::fs::write(album.join("01 Track 1.lrc"), "old").unwrap();
        let provider = MockLyricsProvider::new().with_lyrics("Band", "Track 2", lyrics("two"));
        let indexer = indexer_with(&dir, provider);

        let report = indexer.fetch_missing_lyrics(&album).await.unwrap();
        assert_eq!(
            report,
            LyricsScanReport {
                scanned: 3,
                fetched: 1,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(
            std::fs::read_to_string(album.join("02 Track 2.lrc")).unwrap(),
            "two"
        );
        assert_eq!(
            std::fs::read_to_string(album.join("01 Track 1.lrc")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn test_fetch_missing_lyrics_errors() {
        let dir = TempDir::new().unwrap();
        let indexer = indexer(&dir);

        assert!(matches!(
            indexer.fetch_missing_lyrics(Path::new("Nope")).await,
            Err(LibraryError::NotFound(_))
        ));
        assert!(matches!(
            indexer.fetch_missing_lyrics(Path::new("/tmp")).await,
            Err(LibraryError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_missing_lyrics_all() {
        let dir = TempDir::new().unwrap();
        make_album(dir.path(), "Band", "One", 2, "mp3").unwrap();
        make_album(dir.path(), "Other", "Two", 1, "flac").unwrap();
        let provider = MockLyricsProvider::new()
            .with_lyrics("Band", "Track 1", lyrics("a"))
            .with_lyrics("Other", "Track 1", lyrics("b"));
        let indexer = indexer_with(&dir, provider);

        let report = indexer.fetch_missing_lyrics_all().await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.failed, 1);

        let again = indexer.fetch_missing_lyrics_all().await.unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(again.fetched, 0);
    }

    #[tokio::test]
    async fn test_failing_provider_counts_failures() {
        let dir = TempDir::new().unwrap();
        let album = make_album(dir.path(), "Band", "One", 2, "mp3").unwrap();
        let indexer = indexer_with(&dir, MockLyricsProvider::new().failing());

        let report = indexer.fetch_missing_lyrics(&album).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 2);
        assert!(!album.join("01 Track 1.lrc").exists());
    }
}

//! Audio tag writing.

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::error::{ErrorKind as LoftyErrorKind, LoftyError};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::extractor::is_lock_error;

/// Tag writing errors.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// The file format has no writable tag.
    #[error("No writable tag for {path}")]
    Unsupported { path: PathBuf },

    /// File is held open by another process.
    #[error("File locked: {0}")]
    FileLocked(String),

    /// Tag library failure.
    #[error("Tag error: {0}")]
    Tag(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task was cancelled or panicked.
    #[error("Tagging task failed: {0}")]
    Task(String),
}

impl From<LoftyError> for TaggerError {
    fn from(e: LoftyError) -> Self {
        if let LoftyErrorKind::Io(io) = e.kind() {
            if is_lock_error(io) {
                return TaggerError::FileLocked(e.to_string());
            }
        }
        TaggerError::Tag(e.to_string())
    }
}

impl TaggerError {
    pub fn is_lock(&self) -> bool {
        match self {
            TaggerError::FileLocked(_) => true,
            TaggerError::Io(e) => is_lock_error(e),
            _ => false,
        }
    }
}

/// Text tags to write. Previous values are overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: Option<u32>,
}

/// What is currently stored in a file's primary tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSummary {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    /// Number of front cover pictures.
    pub front_covers: usize,
    /// Number of tags (of any type) in the file.
    pub tag_count: usize,
}

/// Reads and writes audio tags.
#[async_trait]
pub trait Tagger: Send + Sync {
    fn name(&self) -> &str;

    /// Overwrite title/artist/album/track in the primary tag, creating it if needed.
    async fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<(), TaggerError>;

    /// Replace any front cover with `jpeg`.
    async fn embed_cover(&self, path: &Path, jpeg: &[u8]) -> Result<(), TaggerError>;

    async fn read_tags(&self, path: &Path) -> Result<TagSummary, TaggerError>;
}

/// lofty-backed tagger. File work runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LoftyTagger;

impl LoftyTagger {
    pub fn new() -> Self {
        Self
    }

    fn with_primary_tag<F>(path: &Path, f: F) -> Result<(), TaggerError>
    where
        F: FnOnce(&mut Tag),
    {
        let mut tagged = Probe::open(path)?.read()?;
        let tag_type = tagged.primary_tag_type();
        if tagged.tag(tag_type).is_none() {
            tagged.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged
            .tag_mut(tag_type)
            .ok_or_else(|| TaggerError::Unsupported {
                path: path.to_path_buf(),
            })?;
        f(tag);

        tagged.save_to_path(path, WriteOptions::default())?;
        Ok(())
    }

    fn write_blocking(path: &Path, tags: &TagSet) -> Result<(), TaggerError> {
        Self::with_primary_tag(path, |tag| {
            tag.set_title(tags.title.clone());
            tag.set_artist(tags.artist.clone());
            tag.set_album(tags.album.clone());
            match tags.track_number {
                Some(n) => tag.set_track(n),
                None => tag.remove_track(),
            }
        })
    }

    fn embed_blocking(path: &Path, jpeg: Vec<u8>) -> Result<(), TaggerError> {
        Self::with_primary_tag(path, |tag| {
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(MimeType::Jpeg),
                None,
                jpeg,
            ));
        })
    }

    fn read_blocking(path: &Path) -> Result<TagSummary, TaggerError> {
        let tagged = Probe::open(path)?.read()?;
        let tag = tagged.primary_tag().or_else(|| tagged.first_tag());

        Ok(TagSummary {
            title: tag.and_then(|t| t.title().map(|s| s.into_owned())),
            artist: tag.and_then(|t| t.artist().map(|s| s.into_owned())),
            album: tag.and_then(|t| t.album().map(|s| s.into_owned())),
            track_number: tag.and_then(|t| t.track()),
            front_covers: tag
                .map(|t| {
                    t.pictures()
                        .iter()
                        .filter(|p| p.pic_type() == PictureType::CoverFront)
                        .count()
                })
                .unwrap_or(0),
            tag_count: tagged.tags().len(),
        })
    }
}

async fn blocking<F, R>(f: F) -> Result<R, TaggerError>
where
    F: FnOnce() -> Result<R, TaggerError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TaggerError::Task(e.to_string()))?
}

#[async_trait]
impl Tagger for LoftyTagger {
    fn name(&self) -> &str {
        "lofty"
    }

    async fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<(), TaggerError> {
        let path = path.to_path_buf();
        let tags = tags.clone();
        blocking(move || Self::write_blocking(&path, &tags)).await
    }

    async fn embed_cover(&self, path: &Path, jpeg: &[u8]) -> Result<(), TaggerError> {
        let path = path.to_path_buf();
        let jpeg = jpeg.to_vec();
        blocking(move || Self::embed_blocking(&path, jpeg)).await
    }

    async fn read_tags(&self, path: &Path) -> Result<TagSummary, TaggerError> {
        let path = path.to_path_buf();
        blocking(move || Self::read_blocking(&path)).await
    }
}

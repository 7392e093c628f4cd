//! Mock tagger for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::lock;
use crate::postprocess::{TagSet, TagSummary, Tagger, TaggerError};

/// In-memory tagger. Records what would have been written, keyed by path.
///
/// Writes fail with `NotFound` if the file does not exist, like a real tagger.
#[derive(Debug, Clone, Default)]
pub struct MockTagger {
    tags: Arc<Mutex<HashMap<PathBuf, TagSet>>>,
    covers: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail: bool,
}

impl MockTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails with a tag error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Tags last written to `path`.
    pub fn written(&self, path: &Path) -> Option<TagSet> {
        lock(&self.tags).get(path).cloned()
    }

    /// Number of front covers `path` carries (0 or 1).
    pub fn cover_count(&self, path: &Path) -> usize {
        usize::from(lock(&self.covers).contains_key(path))
    }

    /// Number of files tagged.
    pub fn tagged_count(&self) -> usize {
        lock(&self.tags).len()
    }

    fn check(&self, path: &Path) -> Result<(), TaggerError> {
        if self.fail {
            return Err(TaggerError::Tag("simulated tag failure".to_string()));
        }
        if !path.is_file() {
            return Err(TaggerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Tagger for MockTagger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<(), TaggerError> {
        self.check(path)?;
        lock(&self.tags).insert(path.to_path_buf(), tags.clone());
        Ok(())
    }

    async fn embed_cover(&self, path: &Path, jpeg: &[u8]) -> Result<(), TaggerError> {
        self.check(path)?;
        lock(&self.covers).insert(path.to_path_buf(), jpeg.to_vec());
        Ok(())
    }

    async fn read_tags(&self, path: &Path) -> Result<TagSummary, TaggerError> {
        if !path.is_file() {
            return Err(TaggerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        let tags = self.written(path);
        Ok(TagSummary {
            title: tags.as_ref().map(|t| t.title.clone()),
            artist: tags.as_ref().map(|t| t.artist.clone()),
            album: tags.as_ref().map(|t| t.album.clone()),
            track_number: tags.as_ref().and_then(|t| t.track_number),
            front_covers: self.cover_count(path),
            tag_count: usize::from(tags.is_some()),
        })
    }
}

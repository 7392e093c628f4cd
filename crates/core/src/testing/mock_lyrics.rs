//! Mock lyrics provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::lock;
use crate::lyrics::{Lyrics, LyricsError, LyricsProvider, LyricsQuery};

/// Lyrics provider answering from a fixed table keyed by artist and title
/// (case-insensitive). Anything else is "no match".
#[derive(Debug, Clone, Default)]
pub struct MockLyricsProvider {
    entries: Arc<Mutex<HashMap<(String, String), Lyrics>>>,
    queries: Arc<Mutex<Vec<LyricsQuery>>>,
    lookups: Arc<AtomicUsize>,
    fail: bool,
}

fn key(artist: &str, title: &str) -> (String, String) {
    (artist.trim().to_lowercase(), title.trim().to_lowercase())
}

impl MockLyricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lyrics(self, artist: &str, title: &str, lyrics: Lyrics) -> Self {
        lock(&self.entries).insert(key(artist, title), lyrics);
        self
    }

    /// Every lookup fails with an API error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn recorded_queries(&self) -> Vec<LyricsQuery> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl LyricsProvider for MockLyricsProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<Lyrics>, LyricsError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        lock(&self.queries).push(query.clone());

        if self.fail {
            return Err(LyricsError::Api {
                status: 503,
                message: "simulated outage".to_string(),
            });
        }

        Ok(lock(&self.entries)
            .get(&key(&query.artist, &query.title))
            .cloned())
    }
}

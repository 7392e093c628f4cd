//! LRCLIB API client.
//!
//! Exact lookups go through `/get`; when none of the artist/title variants
//! match, `/search` is tried once with the cleaned title.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::matching::{artist_candidates, clean_title};
use super::{Lyrics, LyricsError, LyricsProvider, LyricsQuery};
use crate::metrics::LYRICS_LOOKUPS;

/// LRCLIB client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Base URL (default: https://lrclib.net/api).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://lrclib.net/api".to_string()
}

fn default_timeout() -> u64 {
    8
}

fn default_user_agent() -> String {
    format!("snowsky/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LrclibRecord {
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
}

impl LrclibRecord {
    /// Synced lyrics when present, plain otherwise.
    fn into_lyrics(self) -> Option<Lyrics> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        if let Some(text) = non_empty(self.synced_lyrics) {
            return Some(Lyrics { text, synced: true });
        }
        non_empty(self.plain_lyrics).map(|text| Lyrics {
            text,
            synced: false,
        })
    }
}

/// LRCLIB API client.
pub struct LrclibClient {
    client: Client,
    base_url: String,
}

impl LrclibClient {
    /// Create a new LRCLIB client.
    pub fn new(config: LyricsConfig) -> Result<Self, LyricsError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_exact(
        &self,
        artist: &str,
        title: &str,
        album: Option<&str>,
    ) -> Result<Option<Lyrics>, LyricsError> {
        let url = format!("{}/get", self.base_url);
        let mut params = vec![("artist_name", artist), ("track_name", title)];
        if let Some(album) = album {
            params.push(("album_name", album));
        }

        debug!("LRCLIB get: artist='{}', title='{}'", artist, title);
        let response = self.client.get(&url).query(&params).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let record: LrclibRecord = response.json().await?;
                Ok(record.into_lyrics())
            }
            status => Err(LyricsError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn search(&self, artist: &str, title: &str) -> Result<Option<Lyrics>, LyricsError> {
        let url = format!("{}/search", self.base_url);

        debug!("LRCLIB search: artist='{}', title='{}'", artist, title);
        let response = self
            .client
            .get(&url)
            .query(&[("track_name", title), ("artist_name", artist)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LyricsError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let records: Vec<LrclibRecord> = response.json().await?;
        Ok(records.into_iter().find_map(LrclibRecord::into_lyrics))
    }
}

#[async_trait]
impl LyricsProvider for LrclibClient {
    fn name(&self) -> &str {
        "lrclib"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<Lyrics>, LyricsError> {
        if query.title.trim().is_empty() {
            return Err(LyricsError::InvalidQuery("title is empty".to_string()));
        }

        let cleaned = clean_title(&query.title);
        let mut titles = vec![query.title.trim().to_string()];
        if !cleaned.is_empty() && cleaned != titles[0] {
            titles.push(cleaned.clone());
        }
        let artists = artist_candidates(&query.artist);

        for artist in &artists {
            for title in &titles {
                if let Some(lyrics) = self
                    .get_exact(artist, title, query.album.as_deref())
                    .await?
                {
                    LYRICS_LOOKUPS.with_label_values(&["found"]).inc();
                    return Ok(Some(lyrics));
                }
            }
        }

        let primary = artists.last().map(String::as_str).unwrap_or(&query.artist);
        let title = if cleaned.is_empty() { &query.title } else { &cleaned };
        let result = self.search(primary, title).await?;

        LYRICS_LOOKUPS
            .with_label_values(&[if result.is_some() { "found" } else { "not_found" }])
            .inc();
        Ok(result)
    }
}

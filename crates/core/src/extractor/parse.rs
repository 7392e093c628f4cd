//! Parsing of yt-dlp output, sidecars and locators.

use regex_lite::Regex;
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::error::ExtractorError;
use super::types::{PlaylistEntry, TrackMetadata};

/// Prefix of the line yt-dlp prints with the final file path.
pub const OUTPUT_MARKER: &str = "[snowsky-output] ";

/// Query parameters that survive `clean_url`.
const KEPT_PARAMS: &[&str] = &["v", "list", "index"];

/// One interesting line of yt-dlp output.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Progress {
        percent: f32,
        total_size: Option<String>,
        speed: Option<String>,
        eta: Option<String>,
    },
    Destination(String),
    Output(PathBuf),
    Error(String),
}

/// Line parser for yt-dlp's `--newline` output.
pub struct LineParser {
    full: Option<Regex>,
    simple: Option<Regex>,
    destination: Option<Regex>,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            full: Regex::new(
                r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\S+)\s+at\s+(\S+)\s+ETA\s+(\S+)",
            )
            .ok(),
            simple: Regex::new(r"\[download\]\s+(\d+\.?\d*)%").ok(),
            destination: Regex::new(r"\[(?:download|ExtractAudio)\]\s+Destination:\s+(.+)").ok(),
        }
    }

    pub fn parse(&self, line: &str) -> Option<LineEvent> {
        let line = line.trim_end();

        if let Some(path) = line.strip_prefix(OUTPUT_MARKER) {
            return Some(LineEvent::Output(PathBuf::from(path.trim())));
        }

        if let Some(message) = line.strip_prefix("ERROR:") {
            return Some(LineEvent::Error(message.trim().to_string()));
        }

        if let Some(caps) = self.full.as_ref().and_then(|re| re.captures(line)) {
            let percent = caps.get(1)?.as_str().parse::<f32>().ok()?;
            let optional = |i: usize| {
                caps.get(i)
                    .map(|m| m.as_str().to_string())
                    .filter(|s| s != "Unknown")
            };
            return Some(LineEvent::Progress {
                percent: percent.min(100.0),
                total_size: optional(2),
                speed: optional(3),
                eta: optional(4),
            });
        }

        if let Some(caps) = self.simple.as_ref().and_then(|re| re.captures(line)) {
            let percent = caps.get(1)?.as_str().parse::<f32>().ok()?;
            return Some(LineEvent::Progress {
                percent: percent.min(100.0),
                total_size: None,
                speed: None,
                eta: None,
            });
        }

        if let Some(caps) = self.destination.as_ref().and_then(|re| re.captures(line)) {
            let path = caps.get(1)?.as_str().trim();
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string());
            return Some(LineEvent::Destination(name));
        }

        None
    }
}

/// Strip tracking parameters, keeping only `v`, `list` and `index`.
pub fn clean_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| KEPT_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);

    url.to_string()
}

/// Fill the playlist index field of an output template for a single member.
///
/// With no index the template is returned unchanged so the tool numbers
/// album downloads itself.
pub fn render_template(template: &str, track_index: Option<u32>) -> String {
    let Some(index) = track_index else {
        return template.to_string();
    };
    let Ok(re) = Regex::new(r"%\(playlist_index[^)]*\)s") else {
        return template.to_string();
    };
    let rendered = re.replace_all(template, format!("{:02}", index).as_str());
    rendered.into_owned()
}

/// Read title/artist/album from an `.info.json` sidecar.
pub fn parse_info_json(raw: &str) -> Result<TrackMetadata, ExtractorError> {
    #[derive(Deserialize)]
    struct Info {
        track: Option<String>,
        title: Option<String>,
        artist: Option<String>,
        creator: Option<String>,
        uploader: Option<String>,
        channel: Option<String>,
        album: Option<String>,
        playlist_title: Option<String>,
        track_number: Option<u32>,
        playlist_index: Option<u32>,
    }

    let info: Info = serde_json::from_str(raw)
        .map_err(|e| ExtractorError::parse_error(format!("invalid info json: {}", e)))?;

    let non_empty = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let artist = non_empty(info.artist)
        .or_else(|| non_empty(info.creator))
        .or_else(|| non_empty(info.uploader))
        .or_else(|| non_empty(info.channel))
        .map(|a| a.trim_end_matches(" - Topic").to_string());

    Ok(TrackMetadata {
        title: non_empty(info.track).or_else(|| non_empty(info.title)),
        artist,
        album: non_empty(info.album).or_else(|| non_empty(info.playlist_title)),
        track_number: info.track_number.or(info.playlist_index),
    })
}

/// Parse `--flat-playlist --dump-single-json` output.
pub fn parse_playlist_json(raw: &str) -> Result<Vec<PlaylistEntry>, ExtractorError> {
    #[derive(Deserialize)]
    struct Playlist {
        #[serde(default)]
        entries: Option<Vec<Entry>>,
        webpage_url: Option<String>,
        title: Option<String>,
    }

    #[derive(Deserialize)]
    struct Entry {
        url: Option<String>,
        id: Option<String>,
        title: Option<String>,
    }

    let playlist: Playlist = serde_json::from_str(raw)
        .map_err(|e| ExtractorError::parse_error(format!("invalid playlist json: {}", e)))?;

    // A plain video URL dumps a single object without entries.
    let Some(entries) = playlist.entries else {
        return Ok(playlist
            .webpage_url
            .map(|url| {
                vec![PlaylistEntry {
                    url,
                    title: playlist.title,
                    index: 1,
                }]
            })
            .unwrap_or_default());
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let url = match entry.url {
                Some(url) if url.starts_with("http") => url,
                _ => format!("https://www.youtube.com/watch?v={}", entry.id?),
            };
            Some((url, entry.title))
        })
        .enumerate()
        .map(|(i, (url, title))| PlaylistEntry {
            url,
            title,
            index: i as u32 + 1,
        })
        .collect())
}

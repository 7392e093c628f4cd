//! User-facing settings and their validated, atomically swapped store.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

use super::validate::validate_settings;
use super::ConfigError;
use crate::job::AudioFormat;

/// Upper bound for `max_workers`.
pub const MAX_WORKERS_LIMIT: usize = 16;

/// Folder under `music_folder` holding playlists.
pub const PLAYLISTS_DIR: &str = "Playlists";

/// Browsers the extractor can import cookies from.
pub const KNOWN_BROWSERS: &[&str] = &[
    "brave", "chrome", "chromium", "edge", "firefox", "opera", "safari", "vivaldi", "whale",
];

/// The recognized options. Unknown keys are rejected on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Library root. Must be absolute.
    #[serde(default = "default_music_folder")]
    pub music_folder: PathBuf,

    /// Extract MP3 instead of FLAC when a request does not name a format.
    #[serde(default)]
    pub mp3_mode: bool,

    /// Only accept items the site marks as music tracks.
    #[serde(default)]
    pub music_only: bool,

    /// Fetch synced lyrics after tagging.
    #[serde(default = "default_true")]
    pub lyrics_mode: bool,

    /// Browser to borrow cookies from when no cookies file is set.
    #[serde(default)]
    pub cookies_browser: Option<String>,

    /// Netscape cookies file. Takes precedence over `cookies_browser`.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Run `max_workers` slots when true, a single slot otherwise.
    #[serde(default = "default_true")]
    pub parallel_mode: bool,

    /// yt-dlp output template relative to the job destination.
    #[serde(default = "default_filename_template")]
    pub filename_template: String,
}

fn default_music_folder() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    home.join("Music").join("snowsky")
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    2
}

fn default_filename_template() -> String {
    "%(playlist_index|00|)s %(title)s.%(ext)s".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            music_folder: default_music_folder(),
            mp3_mode: false,
            music_only: false,
            lyrics_mode: true,
            cookies_browser: None,
            cookies_file: None,
            max_workers: default_max_workers(),
            parallel_mode: true,
            filename_template: default_filename_template(),
        }
    }
}

impl Settings {
    /// Format used when a request leaves it unspecified.
    pub fn default_format(&self) -> AudioFormat {
        if self.mp3_mode {
            AudioFormat::Mp3
        } else {
            AudioFormat::Flac
        }
    }

    /// Number of worker slots these settings ask for.
    pub fn slot_count(&self) -> usize {
        if self.parallel_mode {
            self.max_workers.max(1)
        } else {
            1
        }
    }

    /// Folder holding playlist copies and playlist downloads.
    pub fn playlists_folder(&self) -> PathBuf {
        self.music_folder.join(PLAYLISTS_DIR)
    }

    /// Apply a partial update, producing a candidate that still needs validation.
    pub fn merged(&self, update: SettingsUpdate) -> Settings {
        let mut next = self.clone();
        if let Some(v) = update.music_folder {
            next.music_folder = v;
        }
        if let Some(v) = update.mp3_mode {
            next.mp3_mode = v;
        }
        if let Some(v) = update.music_only {
            next.music_only = v;
        }
        if let Some(v) = update.lyrics_mode {
            next.lyrics_mode = v;
        }
        if let Some(v) = update.cookies_browser {
            next.cookies_browser = v;
        }
        if let Some(v) = update.cookies_file {
            next.cookies_file = v;
        }
        if let Some(v) = update.max_workers {
            next.max_workers = v;
        }
        if let Some(v) = update.parallel_mode {
            next.parallel_mode = v;
        }
        if let Some(v) = update.filename_template {
            next.filename_template = v;
        }
        next
    }

    /// Use `cookies.txt` next to the settings file when nothing else is configured.
    pub fn with_detected_cookies(mut self, dir: &Path) -> Self {
        if self.cookies_file.is_none() {
            let candidate = dir.join("cookies.txt");
            if candidate.is_file() {
                info!("Using detected cookies file {:?}", candidate);
                self.cookies_file = Some(candidate);
            }
        }
        self
    }
}

/// Partial settings update. `null` clears the nullable fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub music_folder: Option<PathBuf>,
    #[serde(default)]
    pub mp3_mode: Option<bool>,
    #[serde(default)]
    pub music_only: Option<bool>,
    #[serde(default)]
    pub lyrics_mode: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub cookies_browser: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cookies_file: Option<Option<PathBuf>>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub parallel_mode: Option<bool>,
    #[serde(default)]
    pub filename_template: Option<String>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Shared, validated settings. Readers take a copy; updates replace the whole value.
#[derive(Debug)]
pub struct SettingsHandle {
    current: RwLock<Settings>,
    persist_path: Option<PathBuf>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
            persist_path: None,
        }
    }

    /// Write every accepted update to `path` as TOML.
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    /// Load previously persisted settings from `path`, falling back to `initial`.
    pub fn load_or(initial: Settings, path: &Path) -> Result<Self, ConfigError> {
        let settings = if path.is_file() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
            let persisted: Settings =
                toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
            validate_settings(&persisted)?;
            info!("Loaded persisted settings from {:?}", path);
            persisted
        } else {
            initial
        };
        Ok(Self::new(settings).with_persist_path(path))
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Validate and apply a partial update. On error the previous settings stay in place.
    pub fn update(&self, update: SettingsUpdate) -> Result<Settings, ConfigError> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let candidate = guard.merged(update);
        validate_settings(&candidate)?;

        if let Some(path) = &self.persist_path {
            persist(path, &candidate)?;
        }

        *guard = candidate.clone();
        info!("Settings updated");
        Ok(candidate)
    }
}

fn persist(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let body =
        toml::to_string_pretty(settings).map_err(|e| ConfigError::PersistError(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::PersistError(e.to_string()))?;
    }
    std::fs::write(path, body).map_err(|e| {
        warn!("Failed to write settings to {:?}: {}", path, e);
        ConfigError::PersistError(e.to_string())
    })
}

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use super::settings::Settings;
use crate::extractor::ExtractorConfig;
use crate::lyrics::LyricsConfig;
use crate::manager::RetryPolicy;
use crate::worker::WorkerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Initial user settings. Overridden by the persisted settings file when present.
    #[serde(default)]
    pub settings: Settings,
    /// Where settings updates are written back.
    #[serde(default = "default_settings_path")]
    pub settings_path: Option<PathBuf>,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            settings: Settings::default(),
            settings_path: default_settings_path(),
            extractor: ExtractorConfig::default(),
            lyrics: LyricsConfig::default(),
            worker: WorkerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

fn default_settings_path() -> Option<PathBuf> {
    Some(PathBuf::from("settings.toml"))
}

/// Config view returned by the API. Only the user-facing settings and a few
/// runtime facts are exposed.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub settings: Settings,
    pub server: ServerConfig,
    pub cookies_file_present: bool,
    pub retry_max_attempts: u32,
}

impl SanitizedConfig {
    pub fn new(config: &Config, settings: Settings) -> Self {
        let cookies_file_present = settings
            .cookies_file
            .as_ref()
            .map(|p| p.is_file())
            .unwrap_or(false);

        Self {
            settings,
            server: config.server.clone(),
            cookies_file_present,
            retry_max_attempts: config.retry.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
settings_path = "/var/lib/snowsky/settings.toml"

[server]
host = "127.0.0.1"
port = 9000

[settings]
music_folder = "/srv/music"
mp3_mode = true
max_workers = 4

[extractor]
ytdlp_path = "/usr/local/bin/yt-dlp"
timeout_secs = 120

[retry]
max_attempts = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.settings.music_folder, PathBuf::from("/srv/music"));
        assert!(config.settings.mp3_mode);
        assert_eq!(config.settings.max_workers, 4);
        assert!(config.settings.lyrics_mode);
        assert_eq!(config.extractor.timeout_secs, 120);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.settings_path,
            Some(PathBuf::from("/var/lib/snowsky/settings.toml"))
        );
    }

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.settings.max_workers, 2);
        assert!(config.settings.parallel_mode);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_sanitized_config_reports_missing_cookies_file() {
        let config = Config::default();
        let mut settings = config.settings.clone();
        settings.cookies_file = Some(PathBuf::from("/nonexistent/cookies.txt"));

        let sanitized = SanitizedConfig::new(&config, settings);
        assert!(!sanitized.cookies_file_present);
        assert_eq!(sanitized.retry_max_attempts, 3);
    }
}

mod loader;
mod settings;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str, load_config_or_default};
pub use settings::{
    Settings, SettingsHandle, SettingsUpdate, KNOWN_BROWSERS, MAX_WORKERS_LIMIT, PLAYLISTS_DIR,
};
pub use types::*;
pub use validate::{validate_config, validate_settings};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to persist settings: {0}")]
    PersistError(String),
}

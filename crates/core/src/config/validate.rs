use super::settings::{Settings, KNOWN_BROWSERS, MAX_WORKERS_LIMIT};
use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Initial settings pass `validate_settings`
/// - Retry policy has at least one attempt
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "retry.backoff_multiplier must be >= 1.0".to_string(),
        ));
    }

    if config.worker.progress_buffer == 0 || config.worker.reporter_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "worker buffers must be non-zero".to_string(),
        ));
    }

    validate_settings(&config.settings)
}

/// Validate a complete settings value.
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if !settings.music_folder.is_absolute() {
        return Err(ConfigError::ValidationError(format!(
            "music_folder must be an absolute path, got {:?}",
            settings.music_folder
        )));
    }

    if settings.max_workers == 0 || settings.max_workers > MAX_WORKERS_LIMIT {
        return Err(ConfigError::ValidationError(format!(
            "max_workers must be between 1 and {}",
            MAX_WORKERS_LIMIT
        )));
    }

    if let Some(browser) = &settings.cookies_browser {
        if !KNOWN_BROWSERS.contains(&browser.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown cookies_browser '{}', expected one of: {}",
                browser,
                KNOWN_BROWSERS.join(", ")
            )));
        }
    }

    if let Some(path) = &settings.cookies_file {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "cookies_file cannot be empty".to_string(),
            ));
        }
    }

    let template = settings.filename_template.trim();
    if template.is_empty() {
        return Err(ConfigError::ValidationError(
            "filename_template cannot be empty".to_string(),
        ));
    }
    if !template.contains("%(ext)s") {
        return Err(ConfigError::ValidationError(
            "filename_template must contain %(ext)s".to_string(),
        ));
    }
    if template.starts_with('/') || template.split(['/', '\\']).any(|part| part == "..") {
        return Err(ConfigError::ValidationError(
            "filename_template must stay inside the destination folder".to_string(),
        ));
    }

    Ok(())
}

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use snowsky_core::{
    extractor::{probe_tool, ToolStatus},
    ConfigError, PoolStatus, SanitizedConfig, SettingsUpdate,
};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Shared error body for every API handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// `(status, {error})` pair handlers return on failure.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(error)))
}

#[derive(Serialize)]
pub struct CookiesStatus {
    pub configured: bool,
    pub present: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tools: Vec<ToolStatus>,
    pub cookies: CookiesStatus,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let extractor = &state.config().extractor;
    let mut tools = vec![
        probe_tool("yt-dlp", &extractor.ytdlp_path, "--version").await,
        probe_tool("ffmpeg", &extractor.ffmpeg_path, "-version").await,
    ];
    if let Some(runtime) = &extractor.js_runtime {
        tools.push(probe_tool(runtime, Path::new(runtime), "--version").await);
    }

    let settings = state.settings().snapshot();
    let cookies = CookiesStatus {
        configured: settings.cookies_file.is_some(),
        present: settings
            .cookies_file
            .as_ref()
            .map(|p| p.is_file())
            .unwrap_or(false),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tools,
        cookies,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Partial settings update. Invalid updates leave the current settings untouched.
///
/// The body is decoded by hand so unknown keys and bad types answer 400 like
/// any other invalid value.
pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SanitizedConfig>, ApiError> {
    let update: SettingsUpdate = serde_json::from_value(body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid settings: {}", e)))?;

    match state.settings().update(update) {
        Ok(_) => Ok(Json(state.sanitized_config())),
        Err(ConfigError::PersistError(e)) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to persist settings: {}", e),
        )),
        Err(e) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub async fn pool_status(State(state): State<Arc<AppState>>) -> Json<PoolStatus> {
    Json(state.pool().status())
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

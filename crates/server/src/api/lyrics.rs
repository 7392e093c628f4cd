use axum::{extract::State, Json};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use snowsky_core::library::LyricsScanReport;

use super::handlers::ApiError;
use super::library::library_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LyricsScanBody {
    /// Folder to backfill, absolute or relative to the music folder.
    pub folder_path: PathBuf,
}

/// Fetch lyrics for tracks in one folder that lack a `.lrc`.
pub async fn scan_folder(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LyricsScanBody>,
) -> Result<Json<LyricsScanReport>, ApiError> {
    state
        .library()
        .fetch_missing_lyrics(&body.folder_path)
        .await
        .map(Json)
        .map_err(library_error)
}

pub async fn scan_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LyricsScanReport>, ApiError> {
    state
        .library()
        .fetch_missing_lyrics_all()
        .await
        .map(Json)
        .map_err(library_error)
}

//! Library browsing, playlist copy and maintenance handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use snowsky_core::library::{CleanupReport, CopyReport, LibraryTree};
use snowsky_core::{LibraryError, LibrarySnapshot};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaylistCopyBody {
    pub playlist_name: String,
    /// Track paths, absolute or relative to the music folder.
    pub tracks: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct AlbumLookupParams {
    pub artist: String,
    pub album: String,
}

#[derive(Debug, Serialize)]
pub struct AlbumLookupResponse {
    pub artist: String,
    pub album: String,
    pub path: PathBuf,
}

pub(super) fn library_error(e: LibraryError) -> ApiError {
    let status = match &e {
        LibraryError::InvalidName(_) => StatusCode::BAD_REQUEST,
        LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
        LibraryError::Io(_) | LibraryError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

/// Cached library snapshot (scanned on first request).
pub async fn get_library(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibrarySnapshot>, ApiError> {
    let snapshot = state.library().snapshot().await.map_err(library_error)?;
    Ok(Json((*snapshot).clone()))
}

pub async fn get_tree(State(state): State<Arc<AppState>>) -> Result<Json<LibraryTree>, ApiError> {
    state.library().tree().await.map(Json).map_err(library_error)
}

pub async fn find_album(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlbumLookupParams>,
) -> Result<Json<AlbumLookupResponse>, ApiError> {
    match state
        .library()
        .find_album_path(&params.artist, &params.album)
        .await
        .map_err(library_error)?
    {
        Some(path) => Ok(Json(AlbumLookupResponse {
            artist: params.artist,
            album: params.album,
            path,
        })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Album not found: {}/{}", params.artist, params.album),
        )),
    }
}

/// Rescan the music folder.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibrarySnapshot>, ApiError> {
    let snapshot = state.library().refresh().await.map_err(library_error)?;
    Ok(Json((*snapshot).clone()))
}

pub async fn copy_to_playlist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlaylistCopyBody>,
) -> Result<Json<CopyReport>, ApiError> {
    if body.tracks.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No tracks given"));
    }

    state
        .library()
        .copy_to_playlist(&body.tracks, &body.playlist_name)
        .await
        .map(Json)
        .map_err(library_error)
}

/// Delete leftover sidecar files.
pub async fn cleanup(State(state): State<Arc<AppState>>) -> Result<Json<CleanupReport>, ApiError> {
    state
        .library()
        .cleanup_sidecars()
        .await
        .map(Json)
        .map_err(library_error)
}

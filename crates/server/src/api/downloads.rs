//! Download submission and job query handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use snowsky_core::{
    job::JobFilter, AudioFormat, BatchItem, ExtractorError, Job, JobStatus, ManagerError,
};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: usize = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: usize = 200;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a single download
#[derive(Debug, Deserialize)]
pub struct SingleDownloadBody {
    pub url: String,
    /// Folder under the music folder, `Artist/Album` style.
    pub folder_name: String,
    pub format: Option<AudioFormat>,
}

/// Request body for a playlist download
#[derive(Debug, Deserialize)]
pub struct PlaylistDownloadBody {
    pub url: String,
    pub playlist_name: String,
    pub format: Option<AudioFormat>,
}

/// Request body for a multi-album download
#[derive(Debug, Deserialize)]
pub struct BatchDownloadBody {
    pub artist: String,
    pub items: Vec<BatchItem>,
    pub format: Option<AudioFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct SubmitManyResponse {
    pub job_ids: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

fn manager_error(e: ManagerError) -> ApiError {
    let status = match &e {
        ManagerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
        ManagerError::Playlist(ExtractorError::EmptyPlaylist { .. })
        | ManagerError::Playlist(ExtractorError::MalformedLocator { .. }) => {
            StatusCode::BAD_REQUEST
        }
        ManagerError::Playlist(_) => StatusCode::BAD_GATEWAY,
        ManagerError::Job(_) | ManagerError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Queue one locator into `music_folder/<folder_name>`
pub async fn submit_single(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SingleDownloadBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let job_id = state
        .manager()
        .submit_single(&body.url, &body.folder_name, body.format)
        .map_err(manager_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// Resolve a playlist and queue one job per member
pub async fn submit_playlist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlaylistDownloadBody>,
) -> Result<(StatusCode, Json<SubmitManyResponse>), ApiError> {
    let job_ids = state
        .manager()
        .submit_playlist(&body.url, &body.playlist_name, body.format)
        .await
        .map_err(manager_error)?;

    let count = job_ids.len();
    Ok((StatusCode::ACCEPTED, Json(SubmitManyResponse { job_ids, count })))
}

/// Queue one job per album for an artist
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchDownloadBody>,
) -> Result<(StatusCode, Json<SubmitManyResponse>), ApiError> {
    let job_ids = state
        .manager()
        .submit_batch(&body.artist, &body.items, body.format)
        .map_err(manager_error)?;

    let count = job_ids.len();
    Ok((StatusCode::ACCEPTED, Json(SubmitManyResponse { job_ids, count })))
}

/// List jobs in submission order
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let mut filter = JobFilter::new();
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }

    let total = state
        .manager()
        .store()
        .count(&filter)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let jobs = state
        .manager()
        .list_filtered(&filter.with_limit(limit).with_offset(offset))
        .map_err(manager_error)?;

    Ok(Json(ListJobsResponse {
        jobs,
        total,
        limit,
        offset,
    }))
}

/// Get one job by id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state.manager().get(&id).map(Json).map_err(manager_error)
}

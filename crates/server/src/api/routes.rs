use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::{downloads, handlers, library, lyrics, middleware::metrics_middleware, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Covers are served from the music folder as it was at startup
    let music_folder = state.settings().snapshot().music_folder;

    // API routes
    let api_routes = Router::new()
        // Health, config and pool
        .route("/health", get(handlers::health))
        .route(
            "/config",
            get(handlers::get_config).patch(handlers::patch_config),
        )
        .route("/pool/status", get(handlers::pool_status))
        // Downloads
        .route("/download/single", post(downloads::submit_single))
        .route("/download/playlist", post(downloads::submit_playlist))
        .route("/download/batch", post(downloads::submit_batch))
        .route("/download/jobs", get(downloads::list_jobs))
        .route("/download/jobs/{id}", get(downloads::get_job))
        .route("/download/ws/progress", get(ws::ws_handler))
        // Library
        .route("/library", get(library::get_library))
        .route("/library/tree", get(library::get_tree))
        .route("/library/album", get(library::find_album))
        .route("/library/refresh", post(library::refresh))
        .route("/library/playlist", post(library::copy_to_playlist))
        .route("/library/cleanup", post(library::cleanup))
        // Lyrics backfill
        .route("/lyrics/scan", post(lyrics::scan_folder))
        .route("/lyrics/scan-all", post(lyrics::scan_all))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics).with_state(state))
        .nest_service("/covers", ServeDir::new(music_folder))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

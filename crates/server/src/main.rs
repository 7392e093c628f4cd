use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snowsky_core::{
    load_config_or_default, validate_config, Extractor, LoftyTagger, LrclibClient,
    LyricsProvider, SettingsHandle, Tagger, YtDlpExtractor,
};
use snowsky_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SNOWSKY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; a missing file means defaults
    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");

    // Settings: persisted file wins over the [settings] table
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let initial = config.settings.clone().with_detected_cookies(config_dir);
    let settings = match &config.settings_path {
        Some(path) => SettingsHandle::load_or(initial, path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => SettingsHandle::new(initial),
    };
    let settings = Arc::new(settings);
    info!(
        "Music folder: {:?}",
        settings.snapshot().music_folder
    );

    // Extraction adapter
    let extractor: Arc<dyn Extractor> = Arc::new(YtDlpExtractor::new(config.extractor.clone()));
    match extractor.validate().await {
        Ok(()) => info!("Extractor '{}' ready", extractor.name()),
        Err(e) => warn!("Extractor not ready, downloads will fail until fixed: {}", e),
    }

    // Post-processing collaborators
    let tagger: Arc<dyn Tagger> = Arc::new(LoftyTagger::new());
    let lyrics: Arc<dyn LyricsProvider> = Arc::new(
        LrclibClient::new(config.lyrics.clone()).context("Failed to create lyrics client")?,
    );

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        settings,
        extractor,
        tagger,
        lyrics,
    ));

    state.pool().start().await;
    info!("Worker pool started");

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    state.pool().stop().await;
    info!("Worker pool stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

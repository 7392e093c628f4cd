//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without yt-dlp,
//! real media files or network access.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use snowsky_core::{
    testing::{MockExtractor, MockLyricsProvider, MockTagger},
    Config, Extractor, LyricsProvider, RetryPolicy, Settings, SettingsHandle, Tagger,
    WorkerConfig,
};
use snowsky_server::state::AppState;

/// Re-export fixtures for test convenience
pub use snowsky_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Extraction (MockExtractor)
/// - Tag writing (MockTagger)
/// - Lyrics lookups (MockLyricsProvider)
///
/// The worker pool is started, so submitted jobs actually run.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_single_download() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/download/single", json!({
///         "url": "https://example.com/watch?v=abc",
///         "folder_name": "Band/Album"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state behind the router
    pub state: Arc<AppState>,
    /// Mock extractor - script failures and playlists
    pub extractor: Arc<MockExtractor>,
    /// Mock tagger - inspect written tags
    pub tagger: Arc<MockTagger>,
    /// Mock lyrics provider
    pub lyrics: Arc<MockLyricsProvider>,
    /// Temporary directory holding the music folder and settings file
    pub temp_dir: TempDir,
    /// Library root used by the server
    pub music_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_lyrics(MockLyricsProvider::new()).await
    }

    /// Create a test fixture answering lyrics lookups from `lyrics`.
    pub async fn with_lyrics(lyrics: MockLyricsProvider) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let music_dir = temp_dir.path().join("music");
        std::fs::create_dir_all(&music_dir).expect("Failed to create music dir");

        let extractor = Arc::new(MockExtractor::new());
        let tagger = Arc::new(MockTagger::new());
        let lyrics = Arc::new(lyrics);

        let mut config = Config::default();
        config.settings = Settings {
            music_folder: music_dir.clone(),
            ..Default::default()
        };
        config.settings_path = Some(temp_dir.path().join("settings.toml"));
        config.worker = WorkerConfig::default().without_stagger();
        config.retry = RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(20));

        let settings = SettingsHandle::new(config.settings.clone())
            .with_persist_path(temp_dir.path().join("settings.toml"));

        let state = Arc::new(AppState::new(
            config,
            Arc::new(settings),
            Arc::clone(&extractor) as Arc<dyn Extractor>,
            Arc::clone(&tagger) as Arc<dyn Tagger>,
            Arc::clone(&lyrics) as Arc<dyn LyricsProvider>,
        ));
        state.pool().start().await;

        let router = snowsky_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            extractor,
            tagger,
            lyrics,
            temp_dir,
            music_dir,
        }
    }

    /// Serve the router on an ephemeral local port, for clients that need a
    /// real connection (WebSocket).
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        addr
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Poll a job until it is done or failed.
    pub async fn wait_for_job(&self, job_id: &str, timeout: Duration) -> Option<Value> {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            let response = self.get(&format!("/api/v1/download/jobs/{}", job_id)).await;
            if response.status == StatusCode::OK {
                let status = response.body["status"].as_str().unwrap_or_default();
                if status == "done" || status == "failed" {
                    return Some(response.body);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Send a request to the test server and return status and raw body.
    pub async fn request_text(&self, method: &str, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}

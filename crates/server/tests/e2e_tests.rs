//! End-to-end tests with mocked external dependencies.
//!
//! These tests run the full server stack in-process with mock implementations
//! for the extraction tool, the tag writer and the lyrics service.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use snowsky_core::lyrics::Lyrics;
use snowsky_core::testing::MockLyricsProvider;

use common::{fixtures, TestFixture};

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Health and Config
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
    assert!(response.body["version"].is_string());

    let tools = response.body["tools"].as_array().unwrap();
    let names: Vec<_> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"yt-dlp"));
    assert!(names.contains(&"ffmpeg"));

    assert_eq!(response.body["cookies"]["configured"], false);
    assert_eq!(response.body["cookies"]["present"], false);
}

#[tokio::test]
async fn test_get_config_reports_settings() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["settings"]["music_folder"],
        json!(fixture.music_dir.to_string_lossy())
    );
    assert_eq!(response.body["settings"]["max_workers"], 2);
    assert_eq!(response.body["cookies_file_present"], false);
}

#[tokio::test]
async fn test_patch_config_applies_and_persists() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .patch(
            "/api/v1/config",
            json!({ "max_workers": 4, "mp3_mode": true }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["settings"]["max_workers"], 4);
    assert_eq!(response.body["settings"]["mp3_mode"], true);

    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.body["settings"]["max_workers"], 4);

    let persisted =
        std::fs::read_to_string(fixture.temp_dir.path().join("settings.toml")).unwrap();
    assert!(persisted.contains("max_workers = 4"));
}

#[tokio::test]
async fn test_patch_config_invalid_keeps_previous() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .patch("/api/v1/config", json!({ "max_workers": 99 }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());

    let response = fixture
        .patch("/api/v1/config", json!({ "music_folder": "relative/path" }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .patch("/api/v1/config", json!({ "not_a_setting": true }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.body["settings"]["max_workers"], 2);
    assert_eq!(
        response.body["settings"]["music_folder"],
        json!(fixture.music_dir.to_string_lossy())
    );
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn test_single_download_runs_to_done() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/download/single",
            json!({
                "url": "https://example.com/watch?v=abc123",
                "folder_name": "Band/Album"
            }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_json_path!(response.body, "status", json!("queued"));
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    let job = fixture
        .wait_for_job(&job_id, WAIT)
        .await
        .expect("job did not finish");
    assert_eq!(job["status"], "done");
    assert_eq!(job["format"], "flac");

    let album_dir = fixture.music_dir.join("Band").join("Album");
    let flac_files = std::fs::read_dir(&album_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "flac"))
        .count();
    assert_eq!(flac_files, 1);
    assert_eq!(fixture.tagger.tagged_count(), 1);
}

#[tokio::test]
async fn test_single_download_rejects_bad_input() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/download/single",
            json!({ "url": "https://example.com/watch?v=x", "folder_name": "../outside" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .post(
            "/api/v1/download/single",
            json!({ "url": "   ", "folder_name": "Band/Album" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    // Nothing was queued
    let response = fixture.get("/api/v1/download/jobs").await;
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_playlist_download_numbers_tracks() {
    let fixture = TestFixture::new().await;
    let locator = "https://example.com/playlist?list=PL1";
    fixture
        .extractor
        .set_playlist(locator, fixtures::playlist_entries("p", 3))
        .await;

    let response = fixture
        .post(
            "/api/v1/download/playlist",
            json!({ "url": locator, "playlist_name": "Road Trip", "format": "mp3" }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["count"], 3);

    for id in response.body["job_ids"].as_array().unwrap() {
        let job = fixture
            .wait_for_job(id.as_str().unwrap(), WAIT)
            .await
            .expect("job did not finish");
        assert_eq!(job["status"], "done");
        assert_eq!(job["kind"], "playlist_item");
        assert!(job["track_index"].as_u64().is_some());
    }

    let playlist_dir = fixture.music_dir.join("Playlists").join("Road Trip");
    let mp3_files = std::fs::read_dir(&playlist_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "mp3"))
        .count();
    assert_eq!(mp3_files, 3);
}

#[tokio::test]
async fn test_empty_playlist_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/download/playlist",
            json!({ "url": "https://example.com/playlist?list=none", "playlist_name": "Nothing" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_batch_download_creates_album_folders() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/download/batch",
            json!({
                "artist": "Band",
                "items": [
                    { "album": "First", "url": "https://example.com/playlist?list=A" },
                    { "album": "Second", "url": "https://example.com/playlist?list=B" }
                ]
            }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["count"], 2);

    for id in response.body["job_ids"].as_array().unwrap() {
        let job = fixture
            .wait_for_job(id.as_str().unwrap(), WAIT)
            .await
            .expect("job did not finish");
        assert_eq!(job["status"], "done");
    }

    assert!(fixture.music_dir.join("Band").join("First").is_dir());
    assert!(fixture.music_dir.join("Band").join("Second").is_dir());
}

#[tokio::test]
async fn test_batch_without_items_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/download/batch",
            json!({ "artist": "Band", "items": [] }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/download/jobs/does-not-exist").await;

    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_list_jobs_in_submission_order() {
    let fixture = TestFixture::new().await;

    let mut ids = Vec::new();
    for n in 0..3 {
        let response = fixture
            .post(
                "/api/v1/download/single",
                json!({
                    "url": format!("https://example.com/watch?v=track{}", n),
                    "folder_name": "Band/Album"
                }),
            )
            .await;
        ids.push(response.body["job_id"].as_str().unwrap().to_string());
    }

    let response = fixture.get("/api/v1/download/jobs").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 3);

    let listed: Vec<_> = response.body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(listed, ids);
}

// =============================================================================
// Library
// =============================================================================

#[tokio::test]
async fn test_library_refresh_and_tree() {
    let fixture = TestFixture::new().await;
    fixtures::make_album(&fixture.music_dir, "Band", "Record", 3, "mp3").unwrap();
    fixtures::make_album(&fixture.music_dir, "Other", "Live", 2, "flac").unwrap();

    let response = fixture.post_empty("/api/v1/library/refresh").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total_artists"], 2);
    assert_eq!(response.body["total_albums"], 2);
    assert_eq!(response.body["total_tracks"], 5);

    let response = fixture.get("/api/v1/library/tree").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["Band"]["Record"]["tracks"], 3);
    assert_eq!(response.body["Other"]["Live"]["tracks"], 2);

    let response = fixture
        .get("/api/v1/library/album?artist=Band&album=Record")
        .await;
    assert_status!(response, StatusCode::OK);
    assert!(response.body["path"]
        .as_str()
        .unwrap()
        .ends_with("Record"));

    let response = fixture
        .get("/api/v1/library/album?artist=Band&album=Missing")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_library_playlist_copy() {
    let fixture = TestFixture::new().await;
    fixtures::make_album(&fixture.music_dir, "Band", "Record", 2, "mp3").unwrap();

    let body = json!({
        "playlist_name": "Favourites",
        "tracks": [
            "Band/Record/01 Track 1.mp3",
            "Band/Record/02 Track 2.mp3",
            "Band/Record/nope.mp3"
        ]
    });

    let response = fixture.post("/api/v1/library/playlist", body.clone()).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["copied"], 2);
    assert_eq!(response.body["missing"].as_array().unwrap().len(), 1);

    // Copying again adds nothing
    let response = fixture.post("/api/v1/library/playlist", body).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["copied"], 0);
    assert_eq!(response.body["skipped"].as_array().unwrap().len(), 2);

    let response = fixture
        .post(
            "/api/v1/library/playlist",
            json!({ "playlist_name": "../escape", "tracks": ["Band/Record/01 Track 1.mp3"] }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .post(
            "/api/v1/library/playlist",
            json!({ "playlist_name": "Favourites", "tracks": ["../../etc/passwd"] }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_library_cleanup_removes_sidecars() {
    let fixture = TestFixture::new().await;
    let album = fixtures::make_album(&fixture.music_dir, "Band", "Record", 1, "mp3").unwrap();
    std::fs::write(album.join("01 Track 1.info.json"), b"{}").unwrap();

    let response = fixture.post_empty("/api/v1/library/cleanup").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["files_deleted"], 1);
    assert_eq!(response.body["bytes_freed"], 2);
    assert!(!album.join("01 Track 1.info.json").exists());
    assert!(album.join("01 Track 1.mp3").exists());
}

#[tokio::test]
async fn test_covers_are_served_from_music_folder() {
    let fixture = TestFixture::new().await;
    let album = fixtures::make_album(&fixture.music_dir, "Band", "Record", 1, "mp3").unwrap();
    std::fs::write(album.join("cover.jpg"), fixtures::tiny_jpeg()).unwrap();

    let (status, _) = fixture
        .request_text("GET", "/covers/Band/Record/cover.jpg")
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = fixture
        .request_text("GET", "/covers/Band/Record/missing.jpg")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Lyrics
// =============================================================================

#[tokio::test]
async fn test_lyrics_scan_folder() {
    let provider = MockLyricsProvider::new().with_lyrics(
        "Band",
        "Track 1",
        Lyrics {
            text: "[00:01.00] hello".to_string(),
            synced: true,
        },
    );
    let fixture = TestFixture::with_lyrics(provider).await;
    let album = fixtures::make_album(&fixture.music_dir, "Band", "Record", 2, "mp3").unwrap();

    let response = fixture
        .post("/api/v1/lyrics/scan", json!({ "folder_path": "Band/Record" }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["scanned"], 2);
    assert_eq!(response.body["fetched"], 1);
    assert_eq!(response.body["failed"], 1);
    assert!(album.join("01 Track 1.lrc").exists());

    // Second pass skips the track that now has lyrics
    let response = fixture.post_empty("/api/v1/lyrics/scan-all").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["skipped"], 1);
    assert_eq!(response.body["fetched"], 0);
}

#[tokio::test]
async fn test_lyrics_scan_missing_folder() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/lyrics/scan", json!({ "folder_path": "Nobody/Nothing" }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture
        .post("/api/v1/lyrics/scan", json!({ "folder_path": "../.." }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Pool and Metrics
// =============================================================================

#[tokio::test]
async fn test_progress_websocket_streams_job_events() {
    let fixture = TestFixture::new().await;
    let addr = fixture.serve().await;

    let (mut socket, _) = connect_async(format!("ws://{}/api/v1/download/ws/progress", addr))
        .await
        .expect("WebSocket handshake failed");

    // The subscription is taken once the upgrade completes.
    let start = std::time::Instant::now();
    while fixture.state.reporter().subscriber_count() == 0 && start.elapsed() < WAIT {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let response = fixture
        .post(
            "/api/v1/download/single",
            json!({
                "url": "https://example.com/watch?v=ws",
                "folder_name": "Live"
            }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    let job_id = response.body["job_id"].as_str().unwrap().to_string();

    let event: Value = loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("no progress event received")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            break serde_json::from_str(text.as_str()).unwrap();
        }
    };

    assert_eq!(event["job_id"], job_id.as_str());
    assert_eq!(event["status"], "queued");
    assert!(event["percent"].is_number());
    assert_eq!(event["attempt"], 0);
}

#[tokio::test]
async fn test_pool_status() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/pool/status").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["running"], true);
    assert_eq!(response.body["slots"], 2);
    assert_eq!(response.body["parallel_mode"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.request_text("GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("snowsky_http_requests_total"));
    assert!(body.contains("snowsky_jobs_by_status"));
    assert!(body.contains("snowsky_pool_slots"));
}

//! yt-dlp based extractor implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::config::ExtractorConfig;
use super::error::ExtractorError;
use super::parse::{
    parse_info_json, parse_playlist_json, render_template, LineEvent, LineParser, OUTPUT_MARKER,
};
use super::traits::Extractor;
use super::types::{
    ExtractProgress, ExtractRequest, ExtractedTrack, ExtractionOutput, PlaylistEntry,
    TrackMetadata, ToolStatus,
};

/// Thumbnail extensions yt-dlp may leave next to the audio file.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "webp", "png"];

/// yt-dlp based extractor.
pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    /// Creates a new extractor with the given configuration.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Creates an extractor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ExtractorConfig::default())
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Builds yt-dlp arguments for one extraction.
    pub fn build_args(&self, request: &ExtractRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-warnings",
            "--no-cache-dir",
            "--newline",
            "--progress",
            "--extract-audio",
            "--write-info-json",
            "--add-metadata",
            "--windows-filenames",
            "--write-thumbnail",
            "--convert-thumbnails",
            "jpg",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.extend([
            "--audio-format".to_string(),
            request.format.as_str().to_string(),
            "--audio-quality".to_string(),
            "0".to_string(),
        ]);

        if let Some(runtime) = &self.config.js_runtime {
            args.extend(["--js-runtimes".to_string(), runtime.clone()]);
        }

        // Cookies file wins over browser cookies
        if let Some(file) = &request.cookies_file {
            args.extend(["--cookies".to_string(), file.to_string_lossy().to_string()]);
        } else if let Some(browser) = &request.cookies_browser {
            args.extend(["--cookies-from-browser".to_string(), browser.to_lowercase()]);
        }

        if request.music_only {
            args.extend(["--match-filter".to_string(), "track".to_string()]);
        }

        // Playlist members are fetched one at a time
        if request.track_index.is_some() {
            args.push("--no-playlist".to_string());
        }

        args.extend([
            "--no-simulate".to_string(),
            "--print".to_string(),
            format!("after_move:{}%(filepath)s", OUTPUT_MARKER),
        ]);

        let template = render_template(&request.filename_template, request.track_index);
        args.extend([
            "--output".to_string(),
            request
                .destination
                .join(template)
                .to_string_lossy()
                .to_string(),
        ]);

        args.extend(self.config.extra_args.iter().cloned());
        args.push(request.locator.clone());

        args
    }

    fn spawn_error(&self, e: std::io::Error) -> ExtractorError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractorError::ToolNotFound {
                path: self.config.ytdlp_path.clone(),
            }
        } else {
            ExtractorError::Io(e)
        }
    }

    /// Collect sidecar, thumbnail and metadata for a finished audio file.
    async fn collect_track(audio_path: PathBuf) -> ExtractedTrack {
        let sidecar = audio_path.with_extension("info.json");
        let sidecar_path = tokio::fs::try_exists(&sidecar)
            .await
            .unwrap_or(false)
            .then_some(sidecar);

        let metadata = match &sidecar_path {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(raw) => parse_info_json(&raw).unwrap_or_else(|e| {
                    warn!("Ignoring unreadable sidecar {:?}: {}", path, e);
                    TrackMetadata::default()
                }),
                Err(e) => {
                    warn!("Failed to read sidecar {:?}: {}", path, e);
                    TrackMetadata::default()
                }
            },
            None => TrackMetadata::default(),
        };

        let mut thumbnail_path = None;
        for ext in THUMBNAIL_EXTENSIONS {
            let candidate = audio_path.with_extension(ext);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                thumbnail_path = Some(candidate);
                break;
            }
        }

        ExtractedTrack {
            audio_path,
            sidecar_path,
            thumbnail_path,
            metadata,
        }
    }

    /// Runs one extraction, forwarding progress.
    async fn run_extraction(
        &self,
        request: &ExtractRequest,
        progress_tx: mpsc::Sender<ExtractProgress>,
    ) -> Result<ExtractionOutput, ExtractorError> {
        tokio::fs::create_dir_all(&request.destination).await?;

        let args = self.build_args(request);
        debug!("Running {:?} {:?}", self.config.ytdlp_path, args);

        let mut child = Command::new(&self.config.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractorError::failed("stdout not captured", None))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::failed("stderr not captured", None))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let parser = LineParser::new();
        let mut reader = BufReader::new(stdout).lines();
        let mut outputs: Vec<PathBuf> = Vec::new();
        let mut error_lines = String::new();
        let mut current_file: Option<String> = None;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            while let Some(line) = reader.next_line().await? {
                match parser.parse(&line) {
                    Some(LineEvent::Progress {
                        percent,
                        total_size,
                        speed,
                        eta,
                    }) => {
                        let progress = ExtractProgress {
                            job_id: request.job_id.clone(),
                            percent,
                            total_size,
                            speed,
                            eta,
                            current_file: current_file.clone(),
                        };
                        // Non-blocking send
                        let _ = progress_tx.try_send(progress);
                    }
                    Some(LineEvent::Destination(name)) => {
                        current_file = Some(name);
                    }
                    Some(LineEvent::Output(path)) => {
                        outputs.push(path);
                    }
                    Some(LineEvent::Error(message)) => {
                        error_lines.push_str(&message);
                        error_lines.push('\n');
                    }
                    None => {
                        // Skip notices such as "does not match filter" land on stdout
                        if line.contains("does not match filter") {
                            error_lines.push_str(&line);
                            error_lines.push('\n');
                        }
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<std::process::ExitStatus, std::io::Error>(status)
        })
        .await;

        let status = match result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(ExtractorError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                return Err(ExtractorError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        let stderr_output = stderr_task.await.unwrap_or_default();
        let diagnostics = format!("{}{}", error_lines, stderr_output);

        let mut tracks = Vec::new();
        for path in outputs {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracks.push(Self::collect_track(path).await);
            } else {
                warn!("yt-dlp reported {:?} but the file does not exist", path);
            }
        }

        if tracks.is_empty() {
            if let Some(err) = ExtractorError::classify_output(&diagnostics) {
                return Err(err);
            }
            if !status.success() {
                return Err(ExtractorError::failed(
                    format!("yt-dlp exited with code: {:?}", status.code()),
                    (!diagnostics.trim().is_empty()).then_some(diagnostics),
                ));
            }
            return Err(ExtractorError::NoOutput);
        }

        if !status.success() {
            // Partial playlist errors still leave usable audio
            warn!(
                "yt-dlp exited with {:?} for job {} but produced {} file(s)",
                status.code(),
                request.job_id,
                tracks.len()
            );
        }

        Ok(ExtractionOutput { tracks })
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn validate(&self) -> Result<(), ExtractorError> {
        let status = probe_tool("yt-dlp", &self.config.ytdlp_path, "--version").await;
        if !status.available {
            return Err(ExtractorError::ToolNotFound {
                path: self.config.ytdlp_path.clone(),
            });
        }
        info!(
            "yt-dlp available (version {})",
            status.version.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    async fn list_playlist(&self, locator: &str) -> Result<Vec<PlaylistEntry>, ExtractorError> {
        let mut command = Command::new(&self.config.ytdlp_path);
        command
            .args(["--flat-playlist", "--dump-single-json", "--no-warnings"])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(runtime) = &self.config.js_runtime {
            command.args(["--js-runtimes", runtime.as_str()]);
        }
        command.arg(locator);

        let output = timeout(
            Duration::from_secs(self.config.playlist_timeout_secs),
            command.output(),
        )
        .await
        .map_err(|_| ExtractorError::Timeout {
            timeout_secs: self.config.playlist_timeout_secs,
        })?
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ExtractorError::classify_output(&stderr).unwrap_or_else(|| {
                ExtractorError::failed("failed to list playlist", Some(stderr))
            }));
        }

        let entries = parse_playlist_json(&String::from_utf8_lossy(&output.stdout))?;
        if entries.is_empty() {
            return Err(ExtractorError::EmptyPlaylist {
                locator: locator.to_string(),
            });
        }

        info!("Playlist {} has {} entries", locator, entries.len());
        Ok(entries)
    }

    async fn extract(
        &self,
        request: ExtractRequest,
        progress_tx: mpsc::Sender<ExtractProgress>,
    ) -> Result<ExtractionOutput, ExtractorError> {
        self.run_extraction(&request, progress_tx).await
    }
}

/// Check whether a tool runs and report its version line.
pub async fn probe_tool(name: &str, path: &Path, version_arg: &str) -> ToolStatus {
    let result = timeout(
        Duration::from_secs(10),
        Command::new(path)
            .arg(version_arg)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => ToolStatus {
            name: name.to_string(),
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        },
        _ => ToolStatus {
            name: name.to_string(),
            available: false,
            version: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AudioFormat;

    fn request() -> ExtractRequest {
        ExtractRequest {
            job_id: "job-1".to_string(),
            locator: "https://www.youtube.com/watch?v=abc".to_string(),
            destination: PathBuf::from("/srv/music/Artist/Album"),
            format: AudioFormat::Flac,
            music_only: false,
            cookies_file: None,
            cookies_browser: None,
            filename_template: "%(playlist_index|00|)s %(title)s.%(ext)s".to_string(),
            track_index: None,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_build_args_basic() {
        let extractor = YtDlpExtractor::with_defaults();
        let args = extractor.build_args(&request());

        assert_eq!(value_after(&args, "--audio-format"), Some("flac"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("0"));
        assert_eq!(value_after(&args, "--js-runtimes"), Some("node"));
        assert_eq!(value_after(&args, "--convert-thumbnails"), Some("jpg"));
        assert_eq!(
            value_after(&args, "--output"),
            Some("/srv/music/Artist/Album/%(playlist_index|00|)s %(title)s.%(ext)s")
        );
        assert!(args.contains(&"--newline".to_string()));
        assert!(!args.contains(&"--match-filter".to_string()));
        assert!(!args.contains(&"--no-playlist".to_string()));
        assert_eq!(
            args.last().map(|s| s.as_str()),
            Some("https://www.youtube.com/watch?v=abc")
        );
    }

    #[test]
    fn test_cookies_file_takes_precedence() {
        let extractor = YtDlpExtractor::with_defaults();
        let mut req = request();
        req.cookies_file = Some(PathBuf::from("/etc/snowsky/cookies.txt"));
        req.cookies_browser = Some("Firefox".to_string());

        let args = extractor.build_args(&req);
        assert_eq!(value_after(&args, "--cookies"), Some("/etc/snowsky/cookies.txt"));
        assert!(!args.contains(&"--cookies-from-browser".to_string()));

        req.cookies_file = None;
        let args = extractor.build_args(&req);
        assert_eq!(value_after(&args, "--cookies-from-browser"), Some("firefox"));
    }

    #[test]
    fn test_playlist_member_args() {
        let extractor = YtDlpExtractor::new(ExtractorConfig::default().without_js_runtime());
        let mut req = request();
        req.track_index = Some(4);
        req.music_only = true;
        req.format = AudioFormat::Mp3;

        let args = extractor.build_args(&req);
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--match-filter"), Some("track"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--js-runtimes".to_string()));
        assert_eq!(
            value_after(&args, "--output"),
            Some("/srv/music/Artist/Album/04 %(title)s.%(ext)s")
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let extractor = YtDlpExtractor::new(
            ExtractorConfig::default().with_ytdlp_path("/nonexistent/yt-dlp-binary"),
        );
        let dir = tempfile::TempDir::new().unwrap();
        let mut req = request();
        req.destination = dir.path().to_path_buf();

        let (tx, _rx) = mpsc::channel(8);
        let err = extractor.extract(req, tx).await.unwrap_err();
        assert!(matches!(err, ExtractorError::ToolNotFound { .. }));

        assert!(extractor.validate().await.is_err());
    }

    #[tokio::test]
    async fn test_probe_missing_tool() {
        let status = probe_tool("ghost", Path::new("/nonexistent/ghost"), "--version").await;
        assert!(!status.available);
        assert!(status.version.is_none());
    }

    #[tokio::test]
    async fn test_collect_track_finds_leftovers() {
        let dir = tempfile::TempDir::new().unwrap();
        let audio = dir.path().join("01 Song.flac");
        std::fs::write(&audio, b"audio").unwrap();
        std::fs::write(
            dir.path().join("01 Song.info.json"),
            r#"{"title": "Song", "artist": "Band", "album": "Record"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("01 Song.webp"), b"img").unwrap();

        let track = YtDlpExtractor::collect_track(audio.clone()).await;
        assert_eq!(track.audio_path, audio);
        assert_eq!(track.sidecar_path, Some(dir.path().join("01 Song.info.json")));
        assert_eq!(track.thumbnail_path, Some(dir.path().join("01 Song.webp")));
        assert_eq!(track.metadata.artist.as_deref(), Some("Band"));
    }
}

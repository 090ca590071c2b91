//! FFmpeg-backed media engine.
//!
//! Buffers live as files in a private scratch directory created on load and
//! removed on terminate. `exec` runs the ffmpeg binary inside that directory
//! and turns its `-progress` output into progress ratios.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::capabilities::EncoderCapabilities;
use super::config::EngineConfig;
use super::error::ConverterError;
use super::traits::MediaEngine;
use super::types::{is_valid_buffer_name, EngineLoadState};

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

static OUT_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time_(?:ms|us)=(\d+)").unwrap());

/// FFmpeg engine implementation.
pub struct FfmpegEngine {
    config: EngineConfig,
    scratch: Mutex<Option<TempDir>>,
    capabilities: RwLock<EncoderCapabilities>,
    progress_tx: broadcast::Sender<f64>,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(config.progress_capacity.max(1));
        Self {
            config,
            scratch: Mutex::new(None),
            capabilities: RwLock::new(EncoderCapabilities::default()),
            progress_tx,
        }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Encoders detected during the last load.
    pub async fn capabilities(&self) -> EncoderCapabilities {
        self.capabilities.read().await.clone()
    }

    async fn scratch_dir(&self) -> Result<PathBuf, ConverterError> {
        self.scratch
            .lock()
            .await
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or(ConverterError::EngineNotReady {
                state: EngineLoadState::NotRequested,
            })
    }

    async fn buffer_path(&self, name: &str) -> Result<PathBuf, ConverterError> {
        if !is_valid_buffer_name(name) {
            return Err(ConverterError::InvalidBufferName {
                name: name.to_string(),
            });
        }
        Ok(self.scratch_dir().await?.join(name))
    }

    fn create_scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("uniconv-");
        match &self.config.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    fn not_found_or_io(&self, e: std::io::Error) -> ConverterError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConverterError::EngineNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            ConverterError::Io(e)
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self) -> Result<(), ConverterError> {
        let mut scratch = self.scratch.lock().await;
        if scratch.is_some() {
            return Ok(());
        }

        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.not_found_or_io(e))?;

        if !output.status.success() {
            return Err(ConverterError::load_failed(format!(
                "ffmpeg -version exited with code {:?}",
                output.status.code()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();

        let capabilities = EncoderCapabilities::detect(&self.config).await;
        if !capabilities.supports_video() {
            warn!(
                libx264 = capabilities.libx264,
                aac = capabilities.aac,
                "FFmpeg build lacks encoders needed for video conversions"
            );
        }
        *self.capabilities.write().await = capabilities;

        let dir = self
            .create_scratch()
            .map_err(|e| ConverterError::load_failed(format!("cannot create scratch dir: {}", e)))?;
        info!(version = %version, scratch = ?dir.path(), "FFmpeg engine loaded");
        *scratch = Some(dir);

        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), ConverterError> {
        let path = self.buffer_path(name).await?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<(), ConverterError> {
        let dir = self.scratch_dir().await?;
        let start = Instant::now();

        let mut full_args: Vec<String> = vec![
            "-y".to_string(),
            "-nostdin".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];
        full_args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        full_args.extend(args.iter().cloned());

        debug!(args = ?full_args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&full_args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.not_found_or_io(e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::transcode_failed("ffmpeg stderr not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();
        let mut tracker = ProgressTracker::default();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let Some(ratio) = tracker.observe(&line) {
                    // No subscribers is fine.
                    let _ = self.progress_tx.send(ratio);
                } else {
                    debug!(target: "uniconv::ffmpeg", "{}", line);
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(ConverterError::transcode_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
            }
            Ok(Err(e)) => return Err(ConverterError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                return Err(ConverterError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "FFmpeg finished");
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, ConverterError> {
        let path = self.buffer_path(name).await?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConverterError::BufferNotFound {
                    name: name.to_string(),
                }
            } else {
                ConverterError::Io(e)
            }
        })
    }

    async fn delete_file(&self, name: &str) -> Result<(), ConverterError> {
        let path = self.buffer_path(name).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConverterError::Io(e)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<f64> {
        self.progress_tx.subscribe()
    }

    async fn terminate(&self) {
        if let Some(dir) = self.scratch.lock().await.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(scratch = ?path, "Failed to remove scratch dir: {}", e);
            } else {
                info!("FFmpeg engine terminated");
            }
        }
    }
}

/// Turns ffmpeg `-progress` output into completion ratios.
#[derive(Debug, Default)]
struct ProgressTracker {
    duration_secs: Option<f64>,
}

impl ProgressTracker {
    /// Feeds one stderr line; returns a ratio when the line reports progress.
    fn observe(&mut self, line: &str) -> Option<f64> {
        if let Some(caps) = DURATION_RE.captures(line) {
            if self.duration_secs.is_none() {
                let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
                let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
                let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
                self.duration_secs = Some(hours * 3600.0 + minutes * 60.0 + seconds);
            }
            return None;
        }

        let line = line.trim();
        if line == "progress=end" {
            return Some(1.0);
        }

        let caps = OUT_TIME_RE.captures(line)?;
        let micros: f64 = caps.get(1)?.as_str().parse().ok()?;
        let duration = self.duration_secs.filter(|d| *d > 0.0)?;
        Some((micros / 1_000_000.0 / duration).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_needs_duration() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.observe("out_time_ms=1000000"), None);
    }

    #[test]
    fn test_tracker_ratio() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(
            tracker.observe("  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s"),
            None
        );
        assert_eq!(tracker.observe("out_time_ms=2500000"), Some(0.25));
        assert_eq!(tracker.observe("out_time_us=10000000"), Some(1.0));
        assert_eq!(tracker.observe("out_time_ms=99000000"), Some(1.0));
        assert_eq!(tracker.observe("progress=end"), Some(1.0));
    }

    #[test]
    fn test_tracker_keeps_first_duration() {
        let mut tracker = ProgressTracker::default();
        tracker.observe("Duration: 00:01:00.00, start: 0.0");
        tracker.observe("Duration: 00:00:01.00, start: 0.0");
        assert_eq!(tracker.observe("out_time_ms=30000000"), Some(0.5));
    }

    #[test]
    fn test_tracker_ignores_na_duration() {
        let mut tracker = ProgressTracker::default();
        tracker.observe("Duration: N/A, start: 0.000000, bitrate: N/A");
        assert_eq!(tracker.observe("out_time_ms=40000"), None);
        assert_eq!(tracker.observe("progress=continue"), None);
    }

    #[tokio::test]
    async fn test_buffers_require_load() {
        let engine = FfmpegEngine::with_defaults();
        let err = engine.write_file("input.png", b"data").await.unwrap_err();
        assert!(matches!(err, ConverterError::EngineNotReady { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_load() {
        let engine = FfmpegEngine::new(EngineConfig::with_ffmpeg_path(PathBuf::from(
            "/nonexistent/ffmpeg-binary",
        )));
        let err = engine.load().await.unwrap_err();
        assert!(matches!(err, ConverterError::EngineNotFound { .. }));
    }

    #[tokio::test]
    async fn test_terminate_without_load_is_noop() {
        let engine = FfmpegEngine::with_defaults();
        engine.terminate().await;
        assert!(engine.scratch_dir().await.is_err());
    }
}

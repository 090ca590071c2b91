//! Encoder capability detection.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use super::config::EngineConfig;
use super::types::{VIDEO_AUDIO_CODEC, VIDEO_CODEC};

/// Encoders of interest reported by the local ffmpeg build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// x264 H.264 encoder (required for video conversions)
    pub libx264: bool,
    /// Native AAC encoder (audio track of video conversions)
    pub aac: bool,
    /// LAME MP3 encoder
    pub libmp3lame: bool,
    /// Vorbis encoder
    pub libvorbis: bool,
    /// Opus encoder
    pub libopus: bool,
    /// WebP image encoder
    pub libwebp: bool,
}

impl EncoderCapabilities {
    /// Detect available encoders by probing ffmpeg.
    pub async fn detect(config: &EngineConfig) -> Self {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Self::from_listing(&String::from_utf8_lossy(&o.stdout)),
            _ => Self::default(),
        }
    }

    /// Parses the output of `ffmpeg -encoders`.
    pub fn from_listing(listing: &str) -> Self {
        let names: Vec<&str> = listing
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        let has = |encoder: &str| names.contains(&encoder);

        Self {
            libx264: has(VIDEO_CODEC),
            aac: has(VIDEO_AUDIO_CODEC),
            libmp3lame: has("libmp3lame"),
            libvorbis: has("libvorbis"),
            libopus: has("libopus"),
            libwebp: has("libwebp"),
        }
    }

    /// Whether the fixed video command can run.
    pub fn supports_video(&self) -> bool {
        self.libx264 && self.aac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D libwebp              libwebp WebP image (codec webp)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3) (codec mp3)
";

    #[test]
    fn test_default_capabilities() {
        let caps = EncoderCapabilities::default();
        assert!(!caps.libx264);
        assert!(!caps.supports_video());
    }

    #[test]
    fn test_from_listing() {
        let caps = EncoderCapabilities::from_listing(LISTING);
        assert!(caps.libx264);
        assert!(caps.aac);
        assert!(caps.libmp3lame);
        assert!(caps.libwebp);
        assert!(!caps.libopus);
        assert!(caps.supports_video());
    }

    #[test]
    fn test_description_text_is_not_an_encoder_name() {
        let caps = EncoderCapabilities::from_listing(" A....D flac   FLAC (libx264 mentioned)\n");
        assert!(!caps.libx264);
    }
}

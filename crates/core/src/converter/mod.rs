//! Converter module for transcoding media files.
//!
//! This module provides the [`MediaEngine`] trait, an FFmpeg-backed
//! implementation, and [`MediaTranscoder`], the adapter that loads an engine
//! once per session and runs image, audio and video conversions against it.
//!
//! # Features
//!
//! - Idempotent, de-duplicated engine loading
//! - Fixed per-category commands (image re-encode, best VBR audio, x264/AAC video)
//! - Progress reporting as whole percentages
//! - Encoder capability detection
//!
//! # Example
//!
//! ```ignore
//! use uniconv_core::converter::{FfmpegEngine, MediaTranscoder, TranscodeJob};
//! use uniconv_core::catalog::ConversionCategory;
//!
//! let transcoder = MediaTranscoder::new(FfmpegEngine::with_defaults());
//! transcoder.load().await?;
//!
//! let job = TranscodeJob {
//!     job_id: "job-1".to_string(),
//!     source_name: "song.flac".to_string(),
//!     input: tokio::fs::read("song.flac").await?,
//!     category: ConversionCategory::Audio,
//!     target_format: "mp3".to_string(),
//! };
//!
//! let output = transcoder.transcode(job).await?;
//! println!("Converted in {} ms", output.duration_ms);
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod transcoder;
mod types;

pub use capabilities::EncoderCapabilities;
pub use config::EngineConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegEngine;
pub use traits::MediaEngine;
pub use transcoder::MediaTranscoder;
pub use types::{
    build_args, input_name, is_valid_buffer_name, output_name, ConversionProgress,
    EngineLoadState, TranscodeJob, TranscodeOutput, AUDIO_VBR_QUALITY, VIDEO_AUDIO_CODEC,
    VIDEO_CODEC, VIDEO_CRF, VIDEO_PRESET,
};

//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::{extension_of, ConversionCategory};

use super::error::ConverterError;

/// Lifecycle of the media engine within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineLoadState {
    NotRequested,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for EngineLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotRequested => "not_requested",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Video codec forced for every video conversion.
pub const VIDEO_CODEC: &str = "libx264";
/// Speed/quality preset passed to the video codec.
pub const VIDEO_PRESET: &str = "fast";
/// Constant rate factor passed to the video codec.
pub const VIDEO_CRF: &str = "22";
/// Audio codec paired with [`VIDEO_CODEC`].
pub const VIDEO_AUDIO_CODEC: &str = "aac";
/// Variable bitrate quality for audio conversions (0 = best).
pub const AUDIO_VBR_QUALITY: &str = "0";

/// Builds the engine argument list for a media conversion.
///
/// The settings are fixed per category and do not depend on the input.
pub fn build_args(
    category: ConversionCategory,
    input_name: &str,
    output_name: &str,
) -> Result<Vec<String>, ConverterError> {
    let mut args = vec!["-i".to_string(), input_name.to_string()];

    match category {
        ConversionCategory::Image => {}
        ConversionCategory::Audio => {
            args.extend(["-q:a".to_string(), AUDIO_VBR_QUALITY.to_string()]);
        }
        ConversionCategory::Video => {
            args.extend([
                "-c:v".to_string(),
                VIDEO_CODEC.to_string(),
                "-preset".to_string(),
                VIDEO_PRESET.to_string(),
                "-crf".to_string(),
                VIDEO_CRF.to_string(),
                "-c:a".to_string(),
                VIDEO_AUDIO_CODEC.to_string(),
            ]);
        }
        ConversionCategory::Model3D | ConversionCategory::Subtitle | ConversionCategory::Generic => {
            return Err(ConverterError::UnsupportedCategory { category });
        }
    }

    args.push(output_name.to_string());
    Ok(args)
}

/// Engine buffer name for the converted output.
pub fn output_name(target_format: &str) -> String {
    format!("output.{}", target_format)
}

/// Engine buffer name for the source file.
///
/// The file's own name is used when it is a plain file name distinct from
/// the output buffer; otherwise a neutral `input.<ext>` name is chosen.
pub fn input_name(source_name: &str, target_format: &str) -> String {
    let base = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if is_valid_buffer_name(base) && base != output_name(target_format) {
        base.to_string()
    } else {
        format!("input.{}", extension_of(source_name))
    }
}

/// Whether `name` is usable as an engine buffer name.
pub fn is_valid_buffer_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// A media transcode request.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Unique job ID, used for logs and progress updates.
    pub job_id: String,
    /// Name of the source file.
    pub source_name: String,
    /// Source file contents.
    pub input: Vec<u8>,
    /// Category deciding the engine command.
    pub category: ConversionCategory,
    /// Target format token, e.g. `"webm"`.
    pub target_format: String,
}

/// Result of a successful transcode.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    /// Job ID.
    pub job_id: String,
    /// Converted bytes.
    pub data: Vec<u8>,
    /// Time spent inside the engine, in milliseconds.
    pub duration_ms: u64,
}

/// Progress update during a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Percentage complete, 0 - 100.
    pub percent: u8,
}

impl ConversionProgress {
    /// Rescales an engine ratio in `[0, 1]` to a whole percentage.
    ///
    /// Out of range and NaN ratios are clamped.
    pub fn from_ratio(ratio: f64) -> Self {
        let percent = if ratio.is_nan() {
            0
        } else {
            (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
        };
        Self { percent }
    }
}

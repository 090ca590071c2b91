//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::ConversionCategory;

use super::types::EngineLoadState;

/// Errors that can occur while loading or driving the media engine.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// The engine failed to initialize.
    #[error("Failed to load media engine: {reason}")]
    EngineLoadFailed { reason: String },

    /// A transcode was requested before the engine finished loading.
    #[error("Media engine is not ready (state: {state})")]
    EngineNotReady { state: EngineLoadState },

    /// The category has no media command.
    #[error("Category '{category}' is not handled by the media engine")]
    UnsupportedCategory { category: ConversionCategory },

    /// Engine execution failed.
    #[error("Transcode failed: {reason}")]
    TranscodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Engine execution timed out.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Buffer names must be plain file names.
    #[error("Invalid buffer name: {name}")]
    InvalidBufferName { name: String },

    /// A named buffer was read before being written.
    #[error("Buffer not found: {name}")]
    BufferNotFound { name: String },

    /// I/O error while moving bytes in or out of the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new transcode failed error with stderr output.
    pub fn transcode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::TranscodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new load failed error.
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::EngineLoadFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error happened while loading the engine.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::EngineNotFound { .. } | Self::EngineLoadFailed { .. })
    }
}

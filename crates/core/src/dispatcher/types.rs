//! Types for the dispatcher module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::catalog::ConversionCategory;
use crate::converter::EngineLoadState;

/// Where a dispatcher is in its conversion lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// No file selected.
    Idle,
    /// A file is selected but no target format.
    FileSelected,
    /// File and target format selected; conversion can start.
    Ready,
    /// A conversion is running.
    Converting,
    /// The last conversion succeeded and its result is available.
    Done,
    /// The last conversion failed.
    Error,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::FileSelected => "file_selected",
            Self::Ready => "ready",
            Self::Converting => "converting",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A converted file, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    /// Converted bytes.
    pub data: Vec<u8>,
    /// Content type of `data`.
    pub mime_type: &'static str,
    /// Suggested file name, `converted.<target>`.
    pub file_name: String,
    /// Target format token.
    pub target_format: String,
    /// Wall time of the conversion in milliseconds.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// Wraps converted bytes, resolving the MIME type and file name from
    /// the target format.
    pub fn new(data: Vec<u8>, target_format: &str, elapsed: Duration) -> Self {
        Self {
            data,
            mime_type: crate::mime::resolve(target_format),
            file_name: suggested_file_name(target_format),
            target_format: target_format.to_string(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// File name offered for a converted file.
pub fn suggested_file_name(target_format: &str) -> String {
    format!("converted.{}", target_format)
}

/// Serializable view of a dispatcher, for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub category: ConversionCategory,
    pub state: DispatchState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    /// Formats that may be selected for the current file.
    pub available_targets: Vec<String>,
    /// Last reported progress, 0 - 100.
    pub progress: u8,
    /// Load state of the media engine; `None` for non-media categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineLoadState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size: Option<u64>,
}

/// Human readable byte count, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

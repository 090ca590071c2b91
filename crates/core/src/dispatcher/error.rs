//! Error types for the dispatcher module.

use thiserror::Error;

use crate::catalog::ConversionCategory;
use crate::converter::{ConverterError, EngineLoadState};

use super::types::DispatchState;

/// Errors returned by dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The operation is not allowed in the current state.
    #[error("Expected state {expected}, but dispatcher is {actual}")]
    InvalidState {
        expected: DispatchState,
        actual: DispatchState,
    },

    /// A conversion is already running.
    #[error("A conversion is already in progress")]
    Busy,

    /// The target format equals the source file's format.
    #[error("File is already in '{format}' format")]
    SameFormat { format: String },

    /// The target format is not offered by the category.
    #[error("Format '{format}' is not offered for category '{category}'")]
    UnsupportedFormat {
        format: String,
        category: ConversionCategory,
    },

    /// The catalog has no entry for the category.
    #[error("Category '{category}' is not in the catalog")]
    UnknownCategory { category: ConversionCategory },

    /// A media conversion was requested before the engine finished loading.
    #[error("Media engine is not ready (state: {state})")]
    EngineNotReady { state: EngineLoadState },

    /// Reading the source file failed.
    #[error("Failed to read source file: {0}")]
    SourceRead(#[source] std::io::Error),

    /// The media engine failed.
    #[error(transparent)]
    Conversion(#[from] ConverterError),
}

impl DispatchError {
    /// Whether the call was refused without changing dispatcher state.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::SourceRead(_) | Self::Conversion(_))
    }
}

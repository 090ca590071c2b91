//! Conversion dispatch.
//!
//! A [`ConversionDispatcher`] holds the lifecycle of one category's
//! conversion: a file is selected, then a target format, then the
//! conversion runs on the engine matching the category.
//!
//! ```text
//! Idle -> FileSelected -> Ready -> Converting -> Done
//!                           ^                  \-> Error
//!                           \--- select_format ---/
//! ```
//!
//! Image, audio and video go through the shared [`MediaTranscoder`]
//! (which must be loaded first, see [`ConversionDispatcher::prepare`]).
//! Subtitles and 3D models use the in-process text converters and
//! anything else is copied through unchanged.
//!
//! [`MediaTranscoder`]: crate::converter::MediaTranscoder

mod error;
mod runner;
mod session;
mod source;
mod types;

pub use error::DispatchError;
pub use runner::ConversionDispatcher;
pub use session::ConversionSession;
pub use source::{DiskFile, MemoryFile, SourceFile};
pub use types::{
    format_bytes, suggested_file_name, ConversionResult, DispatchSnapshot, DispatchState,
};

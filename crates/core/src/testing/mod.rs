//! Testing utilities and mock implementations.
//!
//! This module provides a mock [`MediaEngine`](crate::converter::MediaEngine)
//! and sample inputs, allowing the dispatcher to be tested end to end
//! without an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use uniconv_core::testing::{fixtures, MockEngine};
//!
//! let engine = MockEngine::new();
//! engine.set_progress_steps(vec![0.5, 1.0]).await;
//!
//! let session = ConversionSession::new(FormatCatalog::builtin(), engine.clone());
//! let dispatcher = session.dispatcher(ConversionCategory::Subtitle)?;
//! dispatcher.select_file(fixtures::srt_file()).await?;
//! ```

mod mock_engine;

pub use mock_engine::MockEngine;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::dispatcher::MemoryFile;

    /// Two-cue SubRip document.
    pub const SAMPLE_SRT: &str = "1\n00:00:01,000 --> 00:00:04,000\nHello there\n\n2\n00:00:05,500 --> 00:00:07,250\nGeneral Kenobi\n";

    /// The same cues as [`SAMPLE_SRT`] in WebVTT.
    pub const SAMPLE_VTT: &str = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\nHello there\n\n2\n00:00:05.500 --> 00:00:07.250\nGeneral Kenobi\n";

    /// Minimal Advanced SubStation Alpha script with two dialogue events.
    pub const SAMPLE_ASS: &str = "[Script Info]\nTitle: Sample\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:04.00,Default,,0,0,0,,Hello there\nDialogue: 0,0:00:05.50,0:00:07.25,Default,,0,0,0,,General Kenobi\n";

    /// ASCII STL triangle.
    pub const SAMPLE_STL: &str = "solid tri\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid tri\n";

    /// Wavefront OBJ triangle.
    pub const SAMPLE_OBJ: &str = "o Tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    pub fn srt_file() -> MemoryFile {
        MemoryFile::new("episode.srt", SAMPLE_SRT)
    }

    pub fn vtt_file() -> MemoryFile {
        MemoryFile::new("episode.vtt", SAMPLE_VTT)
    }

    pub fn ass_file() -> MemoryFile {
        MemoryFile::new("episode.ass", SAMPLE_ASS)
    }

    pub fn stl_file() -> MemoryFile {
        MemoryFile::new("part.stl", SAMPLE_STL)
    }

    pub fn obj_file() -> MemoryFile {
        MemoryFile::new("part.obj", SAMPLE_OBJ)
    }

    /// A few fake bytes named like an image.
    pub fn png_file() -> MemoryFile {
        MemoryFile::new("photo.png", vec![0x89, b'P', b'N', b'G'])
    }

    /// A few fake bytes named like an audio track.
    pub fn flac_file() -> MemoryFile {
        MemoryFile::new("track.flac", b"fLaC".to_vec())
    }
}

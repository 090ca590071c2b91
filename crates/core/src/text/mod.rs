//! Text-based converters for subtitle and 3D model files.
//!
//! Both engines are pure functions of `(source text, source extension,
//! target format)`. They never fail: input they cannot make sense of
//! produces empty, partial or unchanged output. Callers should present that
//! as a known limitation rather than a guarantee of correctness.

pub mod model3d;
pub mod subtitle;

pub use model3d::ModelFormat;
pub use subtitle::SubtitleFormat;

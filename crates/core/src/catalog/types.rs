//! Types for the format catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Conversion domain; decides which engine handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ConversionCategory {
    Image,
    Audio,
    Video,
    #[serde(rename = "model3d")]
    Model3D,
    Subtitle,
    /// Anything else. Converted by copying the source bytes unchanged.
    Generic,
}

impl ConversionCategory {
    /// Identifier used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Model3D => "model3d",
            Self::Subtitle => "subtitle",
            Self::Generic => "generic",
        }
    }

    /// Whether this category is handled by the embedded media engine.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Audio | Self::Video)
    }
}

impl fmt::Display for ConversionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionCategory {
    type Err = std::convert::Infallible;

    /// Unrecognized identifiers parse to [`ConversionCategory::Generic`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "model3d" => Self::Model3D,
            "subtitle" => Self::Subtitle,
            _ => Self::Generic,
        })
    }
}

impl From<String> for ConversionCategory {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(category) => category,
            Err(never) => match never {},
        }
    }
}

/// Which input files a category accepts, in HTML `accept` attribute syntax
/// (`"image/*"`, `".obj,.gltf"`).
///
/// Front ends use this to constrain file selection; the dispatcher itself
/// does not enforce it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AcceptMatcher {
    /// MIME patterns such as `image/*` or `text/vtt`.
    pub mime_patterns: Vec<String>,
    /// Lower-case extensions without the leading dot.
    pub extensions: Vec<String>,
}

impl AcceptMatcher {
    /// Parses an accept string.
    pub fn parse(accept: &str) -> Self {
        let mut matcher = Self::default();
        for token in accept.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.strip_prefix('.') {
                Some(ext) => matcher.extensions.push(ext.to_ascii_lowercase()),
                None => matcher.mime_patterns.push(token.to_ascii_lowercase()),
            }
        }
        matcher
    }

    /// Whether a file is acceptable.
    ///
    /// When no MIME type is supplied, the one registered for the file's
    /// extension is used. An empty matcher accepts everything.
    pub fn matches(&self, file_name: &str, mime: Option<&str>) -> bool {
        if self.mime_patterns.is_empty() && self.extensions.is_empty() {
            return true;
        }

        let ext = extension_of(file_name);
        if self.extensions.iter().any(|e| *e == ext) {
            return true;
        }

        let mime = mime
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| crate::mime::resolve(&ext).to_string());
        self.mime_patterns
            .iter()
            .any(|pattern| mime_pattern_matches(pattern, &mime))
    }
}

impl From<String> for AcceptMatcher {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<AcceptMatcher> for String {
    fn from(m: AcceptMatcher) -> Self {
        m.to_string()
    }
}

impl fmt::Display for AcceptMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .mime_patterns
            .iter()
            .cloned()
            .chain(self.extensions.iter().map(|e| format!(".{}", e)))
            .collect();
        f.write_str(&tokens.join(","))
    }
}

fn mime_pattern_matches(pattern: &str, mime: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(major) => mime
            .split_once('/')
            .map(|(m, _)| m == major)
            .unwrap_or(false),
        None => pattern == mime,
    }
}

/// Lower-cased text after the last `.` of a file name.
///
/// A name without a dot yields the whole name, lower-cased.
pub fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Description of one conversion domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Category handled by this entry.
    #[serde(rename = "id")]
    pub category: ConversionCategory,
    /// Human readable name.
    pub name: String,
    /// Icon glyph shown next to the name.
    #[serde(default)]
    pub icon: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Target formats, in display order.
    pub formats: Vec<String>,
    /// Accepted input files.
    #[serde(default)]
    pub accept: AcceptMatcher,
}

impl CatalogEntry {
    /// Whether `format` is one of this entry's targets.
    pub fn offers(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f.eq_ignore_ascii_case(format))
    }
}

/// Errors raised while building a catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Category '{category}' has no formats")]
    EmptyFormats { category: ConversionCategory },

    #[error("Category '{category}' lists format '{format}' more than once")]
    DuplicateFormat {
        category: ConversionCategory,
        format: String,
    },

    #[error("Category '{0}' is declared more than once")]
    DuplicateCategory(ConversionCategory),
}

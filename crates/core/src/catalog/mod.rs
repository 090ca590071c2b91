//! Format catalog - the conversion domains offered to users.
//!
//! Each [`CatalogEntry`] names a category, the formats a file of that
//! category can be converted to, and which input files it accepts. The
//! catalog is built once at startup (either [`FormatCatalog::builtin`] or
//! from configuration) and never mutated afterwards.

mod types;

pub use types::*;

use std::collections::HashSet;

/// Immutable, ordered list of catalog entries.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatCatalog {
    entries: Vec<CatalogEntry>,
}

impl FormatCatalog {
    /// Builds a catalog, rejecting empty or duplicated format lists.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen_categories = HashSet::new();
        for entry in &entries {
            if !seen_categories.insert(entry.category) {
                return Err(CatalogError::DuplicateCategory(entry.category));
            }
            if entry.formats.is_empty() {
                return Err(CatalogError::EmptyFormats {
                    category: entry.category,
                });
            }
            let mut seen_formats = HashSet::new();
            for format in &entry.formats {
                if !seen_formats.insert(format.to_ascii_lowercase()) {
                    return Err(CatalogError::DuplicateFormat {
                        category: entry.category,
                        format: format.clone(),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// The default catalog: image, audio, video, 3D models and subtitles.
    pub fn builtin() -> Self {
        Self {
            entries: builtin_entries(),
        }
    }

    /// All entries in display order.
    pub fn list_categories(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Looks up the entry for a category.
    pub fn find(&self, category: ConversionCategory) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.category == category)
    }

    /// Formats of `category` that can be offered for a source with
    /// extension `source_ext`. The source's own format is never offered.
    pub fn available_targets(&self, category: ConversionCategory, source_ext: &str) -> Vec<&str> {
        self.find(category)
            .map(|entry| {
                entry
                    .formats
                    .iter()
                    .map(String::as_str)
                    .filter(|f| !f.eq_ignore_ascii_case(source_ext))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First category (in display order) listing `ext` among its formats.
    pub fn category_for_extension(&self, ext: &str) -> Option<ConversionCategory> {
        self.entries
            .iter()
            .find(|e| e.offers(ext))
            .map(|e| e.category)
    }
}

impl Default for FormatCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn entry(
    category: ConversionCategory,
    name: &str,
    icon: &str,
    description: &str,
    formats: &[&str],
    accept: &str,
) -> CatalogEntry {
    CatalogEntry {
        category,
        name: name.to_string(),
        icon: icon.to_string(),
        description: description.to_string(),
        formats: formats.iter().map(|f| f.to_string()).collect(),
        accept: AcceptMatcher::parse(accept),
    }
}

fn builtin_entries() -> Vec<CatalogEntry> {
    vec![
        entry(
            ConversionCategory::Image,
            "Images",
            "🖼️",
            "Convert images to any format",
            &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff", "ico", "avif"],
            "image/*",
        ),
        entry(
            ConversionCategory::Audio,
            "Audio",
            "🎵",
            "Convert audio to any format",
            &["mp3", "wav", "ogg", "aac", "m4a", "flac", "opus", "wma"],
            "audio/*",
        ),
        entry(
            ConversionCategory::Video,
            "Video",
            "🎬",
            "Convert video to any format",
            &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "mpeg"],
            "video/*",
        ),
        entry(
            ConversionCategory::Model3D,
            "3D Models",
            "🎲",
            "Convert 3D models to any format",
            &["obj", "gltf", "glb", "stl"],
            ".obj,.gltf,.glb,.stl",
        ),
        entry(
            ConversionCategory::Subtitle,
            "Subtitles",
            "💬",
            "Convert subtitles to any format",
            &["srt", "vtt", "ass", "txt"],
            ".srt,.vtt,.ass,.txt",
        ),
    ]
}

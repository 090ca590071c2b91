//! Content-type lookup for output format tokens.

/// Content type used for any format token the registry does not know.
pub const GENERIC_MIME: &str = "application/octet-stream";

/// Resolves a format token (e.g. `"mp3"`) to its content type.
///
/// Lookup is case-insensitive and total: unknown tokens map to
/// [`GENERIC_MIME`].
pub fn resolve(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        // Image
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "opus" => "audio/opus",
        "wma" => "audio/x-ms-wma",
        // Video
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "flv" => "video/x-flv",
        "wmv" => "video/x-ms-wmv",
        "mpeg" => "video/mpeg",
        // Subtitles
        "txt" | "srt" | "ass" => "text/plain",
        "vtt" => "text/vtt",
        // 3D models
        "obj" => "text/plain",
        "gltf" => "model/gltf+json",
        "glb" => "model/gltf-binary",
        "stl" => "model/stl",
        _ => GENERIC_MIME,
    }
}

/// Whether the registry has a dedicated entry for `format`.
pub fn is_known(format: &str) -> bool {
    resolve(format) != GENERIC_MIME
}

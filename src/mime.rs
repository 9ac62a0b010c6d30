//! Content-type inference for uploaded images.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension used when neither the name, the declared type nor the payload
/// identifies the format.
pub const GENERIC_EXTENSION: &str = "bin";

/// Sniff the image format from its magic bytes.
pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes) {
        Ok(format) => Some(format.to_mime_type()),
        Err(_) => {
            tracing::debug!(
                "Unrecognized image format (first 4 bytes: {:02X?})",
                &bytes[..bytes.len().min(4)]
            );
            None
        }
    }
}

/// Lower-cased extension of `name`, if it has one.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// MIME type for a known image extension in `name`.
pub fn content_type_for_extension(name: &str) -> Option<&'static str> {
    match extension_of(name)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Content type used when serving a stored file back; unknown extensions
/// are served as JPEG.
pub fn content_type_for_filename(name: &str) -> &'static str {
    content_type_for_extension(name).unwrap_or("image/jpeg")
}

pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/avif" => Some("avif"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

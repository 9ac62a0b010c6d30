//! Collision-avoiding filenames for stored uploads.
//!
//! Names combine a fixed prefix, the wall-clock millisecond and a sanitized
//! copy of the caller's original name. This is a heuristic, not a security
//! boundary: two identical names within one millisecond would collide.

use crate::mime;
use crate::models::ImageFile;

pub const FILENAME_PREFIX: &str = "ai-tools";

const FALLBACK_STEM: &str = "image";

/// Leaves room for the prefix and timestamp under the usual 255-byte
/// filename limit.
const MAX_BASE_NAME_LEN: usize = 200;

/// Replace everything outside `[A-Za-z0-9.-]` with `_` and lower-case.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Extension for a payload whose name carries none.
fn fallback_extension(file: &ImageFile) -> &'static str {
    file.content_type
        .as_deref()
        .and_then(mime::extension_for_content_type)
        .or_else(|| mime::detect_image_mime(&file.bytes).and_then(mime::extension_for_content_type))
        .unwrap_or(mime::GENERIC_EXTENSION)
}

/// Sanitized original name, always ending in an extension.
pub fn base_name(file: &ImageFile) -> String {
    let name = match file.name() {
        Some(name) => {
            // Keep only the last path component some clients send along.
            let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
            let sanitized = sanitize(name);
            let stem = sanitized.trim_matches('.');
            if stem.is_empty() {
                format!("{}.{}", FALLBACK_STEM, fallback_extension(file))
            } else if mime::extension_of(stem).is_some() {
                stem.to_string()
            } else {
                format!("{}.{}", stem, fallback_extension(file))
            }
        }
        None => format!("{}.{}", FALLBACK_STEM, fallback_extension(file)),
    };
    truncate_keeping_extension(name)
}

/// Shorten the stem of an over-long (ASCII) name, keeping a short extension.
fn truncate_keeping_extension(name: String) -> String {
    if name.len() <= MAX_BASE_NAME_LEN {
        return name;
    }
    match name.rfind('.') {
        Some(dot) if name.len() - dot <= 16 => {
            let extension = &name[dot..];
            let stem = name[..MAX_BASE_NAME_LEN - extension.len()].trim_end_matches('.');
            let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
            format!("{}{}", stem, extension)
        }
        _ => name[..MAX_BASE_NAME_LEN].to_string(),
    }
}

pub fn generate_filename(file: &ImageFile, timestamp_millis: i64) -> String {
    format!(
        "{}-{}-{}",
        FILENAME_PREFIX,
        timestamp_millis,
        base_name(file)
    )
}

/// Filename stamped with the current wall-clock time.
pub fn filename_now(file: &ImageFile) -> String {
    generate_filename(file, chrono::Utc::now().timestamp_millis())
}

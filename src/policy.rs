//! Validation applied to an upload before it reaches a storage adapter.

use crate::models::{ImageFile, DEFAULT_MAX_UPLOAD_BYTES};
use crate::{Error, Result};
use std::io::Cursor;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size_bytes: u64,
    pub max_width_height_px: u32,
    pub allowed_mime_types: &'static [&'static str],
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadPolicy {
    pub const DEFAULT_ALLOWED_MIME_TYPES: &'static [&'static str] = &[
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/gif",
        "image/webp",
    ];
    pub const DEFAULT_MAX_WIDTH_HEIGHT_PX: u32 = 6000;

    pub fn new(max_file_size_bytes: u64) -> Self {
        Self {
            max_file_size_bytes,
            max_width_height_px: Self::DEFAULT_MAX_WIDTH_HEIGHT_PX,
            allowed_mime_types: Self::DEFAULT_ALLOWED_MIME_TYPES,
        }
    }

    pub fn validate(&self, file: &ImageFile) -> Result<()> {
        if file.is_empty() {
            return Err(Error::InvalidInput("No file provided".to_string()));
        }

        let content_type = file.content_type().to_ascii_lowercase();
        if !self.allowed_mime_types.contains(&content_type.as_str()) {
            return Err(Error::InvalidInput(
                "Invalid file type. Please upload JPG, PNG, GIF, or WEBP images.".to_string(),
            ));
        }

        if file.len() as u64 > self.max_file_size_bytes {
            return Err(Error::InvalidInput(format!(
                "File too large. Maximum size is {}.",
                human_size(self.max_file_size_bytes)
            )));
        }

        // Only enforced when the header can be read; the bytes are stored
        // as-is either way.
        if let Some((width, height)) = dimensions(&file.bytes) {
            if width > self.max_width_height_px || height > self.max_width_height_px {
                return Err(Error::InvalidInput(format!(
                    "Image is {}x{}px. Maximum is {}px on either side.",
                    width, height, self.max_width_height_px
                )));
            }
        }

        Ok(())
    }
}

fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn human_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else {
        format!("{} bytes", bytes)
    }
}

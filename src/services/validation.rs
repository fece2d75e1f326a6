use image::ImageFormat;
use serde::Serialize;

use crate::models::upload::ImageUpload;

/// Largest accepted capture (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Smallest accepted capture (1 KiB). Anything below is an empty or
/// truncated camera frame.
pub const MIN_IMAGE_BYTES: usize = 1024;

/// Formats the recognizer accepts.
const ALLOWED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Outcome of validating an image candidate before any network call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported image format: {0} (expected JPEG, PNG or WebP)")]
    UnsupportedFormat(String),

    #[error("Image too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Image too small: {size} bytes (min {min})")]
    TooSmall { size: usize, min: usize },
}

/// Check MIME type and size bounds of an upload.
pub fn check(upload: &ImageUpload) -> Result<(), ValidationError> {
    let format = ImageFormat::from_mime_type(upload.content_type.trim())
        .filter(|f| ALLOWED_FORMATS.contains(f));
    if format.is_none() {
        return Err(ValidationError::UnsupportedFormat(upload.content_type.clone()));
    }

    let size = upload.size();
    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            size,
            max: MAX_IMAGE_BYTES,
        });
    }
    if size < MIN_IMAGE_BYTES {
        return Err(ValidationError::TooSmall {
            size,
            min: MIN_IMAGE_BYTES,
        });
    }

    Ok(())
}

/// Non-failing form of [`check`], for callers that only report.
pub fn validate(upload: &ImageUpload) -> ValidationResult {
    match check(upload) {
        Ok(()) => ValidationResult {
            valid: true,
            error: None,
        },
        Err(e) => ValidationResult {
            valid: false,
            error: Some(e.to_string()),
        },
    }
}

/// Guess a MIME type from the leading magic bytes, for uploads that arrive
/// without a declared content type.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

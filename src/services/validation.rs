//! Upload validation
//!
//! Cheap checks on the declared metadata run first ([`UploadValidator`]);
//! the full decode ([`ImageVerifier`]) only runs once those pass.

use crate::processor::decode_image;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Content types accepted for upload
pub const SUPPORTED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/bmp"];

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const MIB: usize = 1024 * 1024;

/// Reasons an upload is rejected before inference
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Declared content type missing or outside the allow-list
    #[error("Unsupported file format. Supported: {}", SUPPORTED_CONTENT_TYPES.join(", "))]
    UnsupportedMediaType { declared: Option<String> },

    /// Upload larger than the configured maximum
    #[error("File too large. Maximum size: {}", describe_limit(*.max))]
    PayloadTooLarge { size: usize, max: usize },

    /// Bytes that do not decode to a non-empty image
    #[error("Invalid image file")]
    InvalidImage { reason: String },
}

fn describe_limit(max: usize) -> String {
    if max >= MIB && max % MIB == 0 {
        format!("{}MB", max / MIB)
    } else {
        format!("{max} bytes")
    }
}

/// Normalize a declared content type: drop parameters, trim, lowercase
#[must_use]
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Validates declared content type and size against fixed limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadValidator {
    max_bytes: usize,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadValidator {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Largest accepted upload in bytes
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Accept only the supported image content types; a missing type is rejected
    ///
    /// # Errors
    /// - [`ValidationError::UnsupportedMediaType`]
    pub fn check_content_type(&self, declared: Option<&str>) -> Result<(), ValidationError> {
        let supported = declared
            .map(normalize_content_type)
            .is_some_and(|ct| SUPPORTED_CONTENT_TYPES.contains(&ct.as_str()));

        if supported {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedMediaType {
                declared: declared.map(ToString::to_string),
            })
        }
    }

    /// Accept sizes up to and including the maximum
    ///
    /// # Errors
    /// - [`ValidationError::PayloadTooLarge`]
    pub fn check_size(&self, size: usize) -> Result<(), ValidationError> {
        if size > self.max_bytes {
            Err(ValidationError::PayloadTooLarge {
                size,
                max: self.max_bytes,
            })
        } else {
            Ok(())
        }
    }
}

/// A fully decoded upload
#[derive(Debug, Clone)]
pub struct VerifiedImage {
    /// Container format detected from the magic bytes
    pub format: ImageFormat,
    /// Decoded image with EXIF orientation applied
    pub image: DynamicImage,
}

/// Structural integrity check by full decode
pub struct ImageVerifier;

impl ImageVerifier {
    /// Detect the format from magic bytes and decode the whole buffer
    ///
    /// # Errors
    /// - [`ValidationError::InvalidImage`] on unknown format, decode failure or zero dimensions
    pub fn verify(bytes: &[u8]) -> Result<VerifiedImage, ValidationError> {
        let format = image::guess_format(bytes).map_err(|e| ValidationError::InvalidImage {
            reason: e.to_string(),
        })?;

        let image = decode_image(bytes).map_err(|e| ValidationError::InvalidImage {
            reason: e.to_string(),
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ValidationError::InvalidImage {
                reason: "image has zero width or height".to_string(),
            });
        }

        tracing::debug!(
            format = ?format,
            width = image.width(),
            height = image.height(),
            "Upload decoded"
        );

        Ok(VerifiedImage { format, image })
    }
}

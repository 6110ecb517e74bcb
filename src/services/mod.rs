//! Request-independent services used before inference

pub mod validation;

pub use validation::{
    ImageVerifier, UploadValidator, ValidationError, VerifiedImage, DEFAULT_MAX_UPLOAD_BYTES,
    SUPPORTED_CONTENT_TYPES,
};

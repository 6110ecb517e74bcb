//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Error types shared by the engine, the model cache and the binaries
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model download failures
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pre/post-processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractorError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a network error, keeping the underlying cause in the message
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid: {})",
            parameter, value, valid_range
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = ExtractorError::invalid_config("test config error");
        assert!(matches!(err, ExtractorError::InvalidConfig(_)));

        let err = ExtractorError::model("missing weights");
        assert!(matches!(err, ExtractorError::Model(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ExtractorError::invalid_config("Invalid port");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid port");

        let err = ExtractorError::network_error("Failed to download u2net.onnx", "timed out");
        assert_eq!(
            err.to_string(),
            "Network error: Failed to download u2net.onnx: timed out"
        );
    }

    #[test]
    fn test_file_io_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = ExtractorError::file_io_error("read input", Path::new("/tmp/in.png"), &io_error);
        let message = err.to_string();
        assert!(message.contains("read input"));
        assert!(message.contains("/tmp/in.png"));
        assert!(message.contains("access denied"));

        match err {
            ExtractorError::Io(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
            },
            other => panic!("expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn test_config_value_error() {
        let err = ExtractorError::config_value_error("max upload size", 0, "> 0 bytes");
        let message = err.to_string();
        assert!(message.contains("max upload size"));
        assert!(message.contains("> 0 bytes"));
    }
}

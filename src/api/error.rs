//! HTTP error mapping

use crate::services::ValidationError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detail surfaced for every internal failure
pub const PROCESSING_FAILED: &str = "Background removal processing failed";

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

/// Request failures, one variant per status code
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    InvalidImage(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("AI model not loaded")]
    ModelUnavailable,

    /// The cause is logged, never returned to the client
    #[error("Background removal processing failed")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidImage(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: std::fmt::Display>(cause: E) -> Self {
        Self::Internal(cause.to_string())
    }

    /// Map a multipart stream failure; body-limit hits become 413
    #[must_use]
    pub fn from_multipart(err: &MultipartError, max_bytes: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ValidationError::PayloadTooLarge {
                size: max_bytes.saturating_add(1),
                max: max_bytes,
            }
            .into()
        } else {
            Self::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let detail = err.to_string();
        match err {
            ValidationError::UnsupportedMediaType { .. } => Self::UnsupportedMediaType(detail),
            ValidationError::PayloadTooLarge { .. } => Self::PayloadTooLarge(detail),
            ValidationError::InvalidImage { .. } => Self::InvalidImage(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(cause) = &self {
            tracing::error!(%cause, "Background removal failed");
        } else {
            tracing::debug!(status = status.as_u16(), detail = %self, "Request rejected");
        }

        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::UnsupportedMediaType(String::new()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::PayloadTooLarge(String::new()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::InvalidImage(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::BadRequest(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ModelUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_fixed() {
        let err = ApiError::internal("tensor shape mismatch at /models/u2net.onnx");
        assert_eq!(err.to_string(), PROCESSING_FAILED);
    }

    #[test]
    fn test_from_validation_error() {
        let err: ApiError = ValidationError::PayloadTooLarge { size: 11, max: 10 }.into();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));

        let err: ApiError = ValidationError::InvalidImage {
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Invalid image file");
    }
}

//! Endpoint handlers

use super::error::ApiError;
use super::response::RemovalResponse;
use super::state::AppState;
use crate::models::ModelKind;
use crate::services::{ImageVerifier, UploadValidator};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Multipart field carrying the upload
pub const IMAGE_FIELD: &str = "image";

pub const SERVICE_NAME: &str = "Asset Extractor Backend API";
pub const SERVICE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub docs: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// `healthy` once the model is loaded, `starting` before
    pub status: String,
    /// Unix time in seconds
    pub timestamp: f64,
    pub model_loaded: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub current: ModelKind,
    pub loaded: bool,
}

/// The `image` field of a removal request
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// `GET /`
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        status: "running".to_string(),
        docs: "/docs".to_string(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.is_model_loaded();
    let (status, message) = if model_loaded {
        ("healthy", "Backend ready")
    } else {
        ("starting", "AI model still loading...")
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: unix_timestamp(),
        model_loaded,
        message: message.to_string(),
    })
}

/// `GET /models`
pub async fn models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: ModelKind::ids().into_iter().map(String::from).collect(),
        current: state.model(),
        loaded: state.is_model_loaded(),
    })
}

/// `POST /remove-background`
///
/// Checks run cheapest first: model presence, declared content type, size,
/// full decode. Only then does the upload reach the model.
pub async fn remove_background(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<RemovalResponse, ApiError> {
    let started = Instant::now();
    let processor = state.processor().ok_or(ApiError::ModelUnavailable)?;

    let mut multipart =
        multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let upload = read_image_field(&mut multipart, state.validator()).await?;

    let input_size = upload.bytes.len();
    tracing::info!(
        filename = upload.filename.as_deref().unwrap_or_default(),
        content_type = upload.content_type.as_deref().unwrap_or_default(),
        input_size,
        "Processing upload"
    );

    let bytes = upload.bytes;
    let processed = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let verified = ImageVerifier::verify(&bytes)?;
        processor
            .remove_image(&verified.image)
            .map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    let elapsed = started.elapsed();
    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        output_size = processed.bytes.len(),
        width = processed.input_dimensions.0,
        height = processed.input_dimensions.1,
        "Background removed"
    );

    Ok(RemovalResponse {
        png: processed.bytes,
        elapsed,
        input_size,
        filename: upload.filename,
    })
}

/// Find the `image` field, validating its metadata before reading the body
async fn read_image_field(
    multipart: &mut Multipart,
    validator: UploadValidator,
) -> Result<UploadedImage, ApiError> {
    let max_bytes = validator.max_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart(&e, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(ToString::to_string);
        validator.check_content_type(content_type.as_deref())?;
        let filename = field.file_name().map(ToString::to_string);

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::from_multipart(&e, max_bytes))?;
        validator.check_size(bytes.len())?;

        return Ok(UploadedImage {
            bytes: bytes.to_vec(),
            content_type,
            filename,
        });
    }

    Err(ApiError::BadRequest(format!(
        "Missing '{IMAGE_FIELD}' file field"
    )))
}

fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

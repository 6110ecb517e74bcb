//! Successful removal response

use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

pub const X_PROCESSING_TIME: HeaderName = HeaderName::from_static("x-processing-time");
pub const X_INPUT_SIZE: HeaderName = HeaderName::from_static("x-input-size");
pub const X_OUTPUT_SIZE: HeaderName = HeaderName::from_static("x-output-size");

const FALLBACK_FILENAME: &str = "image";

/// PNG cutout plus the metadata reported in headers
#[derive(Debug, Clone)]
pub struct RemovalResponse {
    pub png: Vec<u8>,
    pub elapsed: Duration,
    pub input_size: usize,
    pub filename: Option<String>,
}

impl IntoResponse for RemovalResponse {
    fn into_response(self) -> Response {
        let disposition = format!(
            "attachment; filename=removed_bg_{}",
            sanitize_filename(self.filename.as_deref())
        );
        let headers = [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (X_PROCESSING_TIME, self.elapsed.as_secs_f64().to_string()),
            (X_INPUT_SIZE, self.input_size.to_string()),
            (X_OUTPUT_SIZE, self.png.len().to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ];
        (headers, self.png).into_response()
    }
}

/// Reduce a client supplied filename to a header-safe token
///
/// Directory components are dropped and anything outside printable ASCII,
/// along with quotes, semicolons and spaces, becomes `_`.
#[must_use]
pub fn sanitize_filename(filename: Option<&str>) -> String {
    let base = filename
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && !matches!(c, '"' | ';' | ',') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

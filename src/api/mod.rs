//! HTTP service
//!
//! Endpoints:
//! - `GET /` service identity
//! - `GET /health` liveness and model state
//! - `GET /models` supported model ids
//! - `POST /remove-background` multipart upload (field `image`), returns a PNG cutout

pub mod error;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use handlers::{HealthResponse, ModelsResponse, RootResponse, UploadedImage};
pub use response::{sanitize_filename, RemovalResponse};
pub use server::run;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and part headers on top of the upload limit
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the application router
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let body_limit = state
        .validator()
        .max_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::models))
        .route("/remove-background", post(handlers::remove_background))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins; credentials allowed, request headers mirrored
///
/// A `*` entry echoes the request origin back, since a literal wildcard
/// cannot be combined with credentials.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(listed_origins(allowed_origins))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn listed_origins(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring CORS origin that is not a valid header value");
                None
            },
        })
        .collect()
}

#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Asset Extractor
//!
//! Background removal for product and asset photos using the U2-Net model
//! family, served over HTTP and available as a command-line tool.
//!
//! ## Features
//!
//! - **Five Models**: `u2net`, `u2netp`, `u2net_human_seg`, `u2net_cloth_seg`, `isnet-general-use`
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **Format Support**: JPEG, PNG, WebP and BMP in, PNG with alpha out
//! - **Model Management**: Automatic downloading and caching of model weights
//! - **HTTP Service**: axum router with upload validation (enable with `server` feature)
//! - **CLI Integration**: `remove-background` command (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asset_extractor::{remove_background_from_bytes, ModelKind, ProcessorConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ProcessorConfig::builder()
//!     .model(ModelKind::U2NetP)
//!     .build();
//! let input = tokio::fs::read("input.jpg").await?;
//! let output = remove_background_from_bytes(input, config).await?;
//! tokio::fs::write("output.png", output.bytes).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `server` (default): HTTP service
//! - `cli` (default): Command-line tools, progress bars and subscriber setup

#[cfg(feature = "server")]
pub mod api;
pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod smoke;
pub mod tracing_config;
pub mod utils;

pub use backends::*;
pub use cache::{format_size, ModelCache};
pub use config::{ExecutionProvider, ServiceConfig, ServiceConfigBuilder};
pub use download::ModelDownloader;
pub use error::{ExtractorError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelKind, PreprocessingConfig};
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory,
    ProcessedImage, ProcessingTimings, ProcessorConfig, ProcessorConfigBuilder,
};
pub use services::{ImageVerifier, UploadValidator, ValidationError, VerifiedImage};
pub use tracing_config::{spans, TracingConfig, TracingFormat, TracingOutput};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, init_server_tracing};

/// Load the configured model and remove the background from encoded image bytes
///
/// Convenience for one-off use; long-running callers should keep a
/// [`BackgroundRemovalProcessor`] around instead.
pub async fn remove_background_from_bytes(
    image_bytes: Vec<u8>,
    config: ProcessorConfig,
) -> Result<ProcessedImage> {
    let processor = BackgroundRemovalProcessor::load(config).await?;
    tokio::task::spawn_blocking(move || processor.remove(&image_bytes))
        .await
        .map_err(|e| ExtractorError::internal(format!("Removal task failed: {e}")))?
}

//! Service startup

use super::{create_router, AppState};
use crate::config::ServiceConfig;
use crate::error::{ExtractorError, Result};
use crate::processor::BackgroundRemovalProcessor;
use tokio::net::TcpListener;

/// Load the model, then serve until ctrl-c
///
/// The listener is only bound once the model is loaded.
///
/// # Errors
/// - Invalid configuration
/// - Model download or load failure
/// - Bind or serve failure
pub async fn run(config: ServiceConfig) -> Result<()> {
    config.validate()?;

    tracing::info!("🚀 Starting Asset Extractor Backend...");
    tracing::info!(
        "🌐 CORS allowed origins: {}",
        config.allowed_origins.join(", ")
    );

    let state = AppState::from_config(&config);

    tracing::info!("📦 Loading AI model ({})...", config.model);
    match BackgroundRemovalProcessor::load(config.processor_config()).await {
        Ok(processor) => {
            tracing::info!(backend = processor.backend_name(), "✅ AI model loaded successfully!");
            state.install_model(processor)?;
        },
        Err(e) => {
            tracing::error!("❌ Failed to load AI model: {e}");
            tracing::error!("Backend will not start without AI model");
            return Err(e);
        },
    }

    let app = create_router(state, &config.allowed_origins);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ExtractorError::network_error(format!("Failed to bind {addr}"), e))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

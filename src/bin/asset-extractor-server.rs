//! Asset Extractor HTTP service
//!
//! Configuration comes from the environment (`HOST`, `PORT`, `ALLOWED_ORIGINS`,
//! `MODEL`, `BACKEND`, ...). The model is loaded before the listener is bound.

use anyhow::Context;
use asset_extractor::{api, init_server_tracing, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_server_tracing().context("Failed to initialize tracing")?;

    let config = ServiceConfig::from_env().context("Invalid service configuration")?;
    api::run(config).await?;
    Ok(())
}

//! Background Removal CLI Tool
//!
//! Removes the background from a single image file and writes a PNG cutout.

use super::config::CliConfigBuilder;
use crate::{
    config::ExecutionProvider, models::ModelKind, processor::BackendType,
    processor::BackgroundRemovalProcessor, tracing_config::init_cli_tracing,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// Remove the background from an image
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "remove-background")]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output PNG file (missing parent directories are created)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Segmentation model
    #[arg(short, long, value_enum, default_value_t = ModelKind::U2Net)]
    pub model: ModelKind,

    /// Inference backend
    #[arg(short, long, value_enum, default_value_t = BackendType::Onnx)]
    pub backend: BackendType,

    /// ONNX Runtime execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long, default_value_t = ExecutionProvider::Auto)]
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose output (-v: progress lines and INFO logs, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose > 0
    }
}

/// Main entry point for CLI application
pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_cli_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e:#}");
    }

    if !cli.input.exists() {
        eprintln!("Error: Input file '{}' does not exist", cli.input.display());
        return ExitCode::FAILURE;
    }

    if cli.is_verbose() {
        println!(
            "Processing: {} -> {}",
            cli.input.display(),
            cli.output.display()
        );
        println!("Using model: {}", cli.model);
    }

    match process(&cli).await {
        Ok(()) => {
            if cli.is_verbose() {
                println!("Background removal completed successfully!");
            }
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error removing background: {e:#}");
            eprintln!("Background removal failed");
            ExitCode::FAILURE
        },
    }
}

/// Load the model, remove the background and write the result
async fn process(cli: &Cli) -> Result<()> {
    ensure_parent_dir(&cli.output).await?;

    let input = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read '{}'", cli.input.display()))?;

    let config = CliConfigBuilder::from_cli(cli);
    info!(model = %config.model, backend = %config.backend_type, "Loading model");

    let processor = BackgroundRemovalProcessor::load(config)
        .await
        .context("Failed to load model")?;

    let processed = tokio::task::spawn_blocking(move || processor.remove(&input))
        .await
        .context("Removal task failed")??;

    debug!(
        width = processed.input_dimensions.0,
        height = processed.input_dimensions.1,
        inference_ms = processed.timings.inference_ms,
        total_ms = processed.timings.total_ms,
        "Removal finished"
    );

    tokio::fs::write(&cli.output, &processed.bytes)
        .await
        .with_context(|| format!("Failed to write '{}'", cli.output.display()))?;

    info!(
        output = %cli.output.display(),
        bytes = processed.bytes.len(),
        "Saved cutout"
    );
    Ok(())
}

async fn ensure_parent_dir(output: &Path) -> Result<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory '{}'", parent.display())),
        _ => Ok(()),
    }
}

//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::processor::ProcessorConfig;

/// Convert CLI arguments to a `ProcessorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    pub(crate) fn from_cli(cli: &Cli) -> ProcessorConfig {
        let mut builder = ProcessorConfig::builder()
            .model(cli.model)
            .backend_type(cli.backend)
            .execution_provider(cli.execution_provider)
            .show_download_progress(true);

        if cli.threads > 0 {
            builder = builder.intra_threads(cli.threads);
        }
        if let Some(dir) = &cli.cache_dir {
            builder = builder.model_dir(dir.clone());
        }

        builder.build()
    }
}

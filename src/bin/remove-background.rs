//! Background removal command-line tool
//!
//! Removes the background from one image and writes a PNG cutout.

use asset_extractor::cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cli::main().await
}

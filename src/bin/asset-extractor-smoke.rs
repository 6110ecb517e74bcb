//! Smoke test for a running asset-extractor service

use asset_extractor::smoke;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    smoke::main().await
}

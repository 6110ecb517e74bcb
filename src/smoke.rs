//! End-to-end smoke test against a running service
//!
//! Hits `/`, `/health` and `/models`, then uploads a local test image if one is
//! present in the working directory and saves the returned cutout.

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Files looked up, in order, for the upload check
pub const TEST_IMAGE_CANDIDATES: [&str; 4] = ["test.jpg", "test.png", "sample.jpg", "sample.png"];

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Smoke test a running asset-extractor service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "asset-extractor-smoke")]
pub struct SmokeArgs {
    /// Base URL of the service
    #[arg(value_name = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

/// Result of the upload check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Cutout received and written to the given path
    Saved(PathBuf),
    /// No candidate image in the directory
    NoTestImage,
    /// Request exceeded the timeout; the first inference can be slow
    TimedOut,
}

/// HTTP checks against one service instance
#[derive(Debug, Clone)]
pub struct SmokeTest {
    client: reqwest::Client,
    base_url: String,
}

impl SmokeTest {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("asset-extractor-smoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;
        let status = response.status();
        ensure!(status.is_success(), "GET {path} returned {status}");
        response
            .json()
            .await
            .with_context(|| format!("GET {path} returned invalid JSON"))
    }

    /// `GET /` reports a running service
    pub async fn check_root(&self) -> Result<Value> {
        let body = self.get_json("/").await?;
        ensure!(body["status"] == "running", "unexpected root status: {body}");
        Ok(body)
    }

    /// `GET /health` answers with a known status
    pub async fn check_health(&self) -> Result<Value> {
        let body = self.get_json("/health").await?;
        let status = body["status"].as_str().unwrap_or_default();
        ensure!(
            matches!(status, "healthy" | "starting"),
            "unexpected health status: {body}"
        );
        Ok(body)
    }

    /// `GET /models` lists the supported models
    pub async fn check_models(&self) -> Result<Value> {
        let body = self.get_json("/models").await?;
        let count = body["models"].as_array().map_or(0, Vec::len);
        ensure!(count > 0, "no models listed: {body}");
        Ok(body)
    }

    /// Upload the first test image found in `dir`, saving the cutout there
    pub async fn check_upload(&self, dir: &Path) -> Result<UploadOutcome> {
        let Some(image_path) = find_test_image(dir) else {
            return Ok(UploadOutcome::NoTestImage);
        };

        let bytes = tokio::fs::read(&image_path)
            .await
            .with_context(|| format!("Failed to read '{}'", image_path.display()))?;
        let file_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type_for(&image_path))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = match self
            .client
            .post(self.url("/remove-background"))
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(UploadOutcome::TimedOut),
            Err(e) => return Err(e).context("POST /remove-background failed"),
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("POST /remove-background returned {status}: {detail}");
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        ensure!(
            content_type == "image/png",
            "expected image/png, got '{content_type}'"
        );

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(UploadOutcome::TimedOut),
            Err(e) => return Err(e).context("Failed to read cutout"),
        };

        let output = dir.join(format!("test_output_{}.png", chrono::Utc::now().timestamp()));
        tokio::fs::write(&output, &body)
            .await
            .with_context(|| format!("Failed to write '{}'", output.display()))?;
        Ok(UploadOutcome::Saved(output))
    }

    /// Run every check, printing one line per check; true when all passed
    pub async fn run_all(&self, dir: &Path) -> bool {
        println!("🧪 Testing Asset Extractor API at {}", self.base_url);
        let mut passed = true;

        passed &= report("Root endpoint", self.check_root().await);
        passed &= report("Health check", self.check_health().await);
        passed &= report("Models endpoint", self.check_models().await);

        match self.check_upload(dir).await {
            Ok(UploadOutcome::Saved(path)) => {
                println!("✅ Background removal: saved {}", path.display());
            },
            Ok(UploadOutcome::NoTestImage) => {
                println!(
                    "⚠️  Background removal skipped: no test image ({})",
                    TEST_IMAGE_CANDIDATES.join(", ")
                );
            },
            Ok(UploadOutcome::TimedOut) => {
                println!(
                    "⏱️  Background removal timed out after {}s (first request may be slow)",
                    UPLOAD_TIMEOUT.as_secs()
                );
            },
            Err(e) => {
                println!("❌ Background removal: {e:#}");
                passed = false;
            },
        }

        if passed {
            println!("🎉 All checks passed");
        } else {
            println!("💥 Some checks failed");
        }
        passed
    }
}

fn report(name: &str, result: Result<Value>) -> bool {
    match result {
        Ok(body) => {
            println!("✅ {name}: {body}");
            true
        },
        Err(e) => {
            println!("❌ {name}: {e:#}");
            false
        },
    }
}

/// First candidate test image present in `dir`
#[must_use]
pub fn find_test_image(dir: &Path) -> Option<PathBuf> {
    TEST_IMAGE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}

/// Entry point for the smoke test binary
pub async fn main() -> ExitCode {
    let args = SmokeArgs::parse();

    let smoke = match SmokeTest::new(&args.base_url) {
        Ok(smoke) => smoke,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if smoke.run_all(&cwd).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

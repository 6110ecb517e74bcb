//! Model weight downloads into the local cache
//!
//! Weights are streamed into a `.part` file next to their final location and
//! renamed once complete, so an interrupted download never leaves a truncated
//! model behind under the real file name.

use crate::cache::{format_size, ModelCache};
use crate::error::{ExtractorError, Result};
use crate::models::ModelKind;
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Progress indicator suited to the build: a bar with the CLI feature, silent otherwise
    #[must_use]
    pub fn for_download() -> Self {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            Self::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            Self::NoOp
        }
    }

    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    /// Finish progress indicator with message
    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

impl ModelDownloader {
    /// Create a downloader writing into the given cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(|e| ExtractorError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Return the path of the model's weights, downloading them first when missing
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors while writing into the cache
    pub async fn ensure_model(&self, model: ModelKind, show_progress: bool) -> Result<PathBuf> {
        let final_path = self.cache.model_path(model);

        if self.cache.is_cached(model) {
            tracing::debug!(model = %model, path = %final_path.display(), "Model already cached");
            return Ok(final_path);
        }

        let url = model.download_url();
        tracing::info!(model = %model, url = %url, "Downloading model weights");

        let temp_path = final_path.with_extension("onnx.part");
        let progress = show_progress.then(ProgressIndicator::for_download);
        if let Some(pb) = &progress {
            pb.set_message(format!("Downloading {}", model.file_name()));
        }

        match self.download_file(&url, &temp_path, progress.as_ref()).await {
            Ok(downloaded) => {
                fs::rename(&temp_path, &final_path).map_err(|e| {
                    ExtractorError::file_io_error("move downloaded model into cache", &final_path, &e)
                })?;

                if let Some(pb) = progress {
                    pb.finish_with_message(format!("✅ Downloaded {}", model));
                }

                tracing::info!(
                    model = %model,
                    size = %format_size(downloaded),
                    path = %final_path.display(),
                    "Model downloaded"
                );
                Ok(final_path)
            },
            Err(e) => {
                if temp_path.exists() {
                    if let Err(cleanup_err) = fs::remove_file(&temp_path) {
                        tracing::warn!(
                            path = %temp_path.display(),
                            error = %cleanup_err,
                            "Failed to remove partial download"
                        );
                    }
                }

                if let Some(pb) = progress {
                    pb.finish_with_message("❌ Download failed".to_string());
                }

                Err(e)
            },
        }
    }

    /// Stream a single file to disk, returning the number of bytes written
    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: Option<&ProgressIndicator>,
    ) -> Result<u64> {
        tracing::debug!(url, path = %local_path.display(), "Starting download");

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ExtractorError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExtractorError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(ExtractorError::network_error(
                format!("Failed to download {url}"),
                format!("HTTP {}", response.status()),
            ));
        }

        let total_size = response.content_length();
        if let (Some(pb), Some(total)) = (progress, total_size) {
            pb.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| ExtractorError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| ExtractorError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| ExtractorError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;

            if let Some(pb) = progress {
                if total_size.is_some() {
                    pb.set_position(downloaded);
                } else {
                    pb.set_message(format!("Downloaded {}", format_size(downloaded)));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| ExtractorError::file_io_error("flush file", local_path, &e))?;

        if downloaded == 0 {
            return Err(ExtractorError::network_error(
                format!("Failed to download {url}"),
                "empty response body",
            ));
        }

        Ok(downloaded)
    }
}

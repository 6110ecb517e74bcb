//! On-disk cache for downloaded model weights
//!
//! Models live as flat `<id>.onnx` files in a single directory, by default
//! `~/.u2net`. The location can be overridden with the `U2NET_HOME`
//! environment variable or programmatically with [`ModelCache::with_dir`].

use crate::error::{ExtractorError, Result};
use crate::models::ModelKind;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "U2NET_HOME";

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache manager rooted at the default location
    ///
    /// # Errors
    /// - Home directory cannot be determined and `U2NET_HOME` is unset
    /// - Failed to create the cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::resolve_cache_dir(|key| std::env::var(key).ok())?;
        Self::with_dir(cache_dir)
    }

    /// Create a cache manager rooted at an explicit directory
    ///
    /// # Errors
    /// - Failed to create the cache directory
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                ExtractorError::file_io_error("create model cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    /// Resolve the cache directory from an environment lookup
    ///
    /// # Errors
    /// - Neither the override nor a home directory is available
    pub fn resolve_cache_dir<F>(lookup: F) -> Result<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        dirs::home_dir()
            .map(|home| home.join(".u2net"))
            .ok_or_else(|| {
                ExtractorError::invalid_config(format!(
                    "Failed to determine home directory. Set {CACHE_DIR_ENV} to choose a model directory."
                ))
            })
    }

    /// Path of a model's weights file (may not exist)
    #[must_use]
    pub fn model_path(&self, model: ModelKind) -> PathBuf {
        self.cache_dir.join(model.file_name())
    }

    /// Whether a non-empty weights file is present for the model
    #[must_use]
    pub fn is_cached(&self, model: ModelKind) -> bool {
        fs::metadata(self.model_path(model)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Current cache directory
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}

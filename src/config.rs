//! Configuration types for the service and the inference engine

use crate::error::{ExtractorError, Result};
use crate::models::ModelKind;
use crate::processor::{BackendType, ProcessorConfig};
use crate::services::validation::DEFAULT_MAX_UPLOAD_BYTES;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    #[serde(rename = "coreml")]
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(ExtractorError::config_value_error(
                "execution provider",
                other,
                "auto, cpu, cuda, coreml",
            )),
        }
    }
}

/// Origin allowed by default when `ALLOWED_ORIGINS` is unset
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8000;

/// Runtime configuration of the HTTP service, read once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the listener binds to
    pub host: IpAddr,
    /// Port the listener binds to
    pub port: u16,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// Largest accepted upload in bytes (inclusive)
    pub max_upload_bytes: usize,
    /// Model loaded at startup
    pub model: ModelKind,
    /// Inference backend
    pub backend: BackendType,
    /// ONNX Runtime execution provider
    pub execution_provider: ExecutionProvider,
    /// Model cache directory override
    pub model_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            model: ModelKind::default(),
            backend: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            model_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Read the configuration from the process environment
    ///
    /// # Errors
    /// - A variable is set to a value that cannot be parsed
    /// - The resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults; set but malformed values are errors.
    ///
    /// # Errors
    /// - A variable is set to a value that cannot be parsed
    /// - The resulting configuration fails validation
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            builder = builder.allowed_origins(parse_allowed_origins(&origins));
        }
        if let Some(host) = lookup("HOST") {
            let host = host.trim().parse::<IpAddr>().map_err(|_| {
                ExtractorError::config_value_error("HOST", &host, "an IPv4 or IPv6 address")
            })?;
            builder = builder.host(host);
        }
        if let Some(port) = lookup("PORT") {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ExtractorError::config_value_error("PORT", &port, "0-65535"))?;
            builder = builder.port(port);
        }
        if let Some(model) = lookup("MODEL") {
            builder = builder.model(model.parse()?);
        }
        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            let limit = limit.trim().parse::<usize>().map_err(|_| {
                ExtractorError::config_value_error("MAX_UPLOAD_BYTES", &limit, "a positive integer")
            })?;
            builder = builder.max_upload_bytes(limit);
        }
        if let Some(backend) = lookup("BACKEND") {
            builder = builder.backend(backend.parse()?);
        }
        if let Some(provider) = lookup("EXECUTION_PROVIDER") {
            builder = builder.execution_provider(provider.parse()?);
        }
        if let Some(dir) = lookup(crate::cache::CACHE_DIR_ENV).filter(|dir| !dir.trim().is_empty())
        {
            builder = builder.model_dir(dir);
        }

        builder.build()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Upload limit of zero bytes
    /// - An allowed origin that is empty or contains whitespace
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(ExtractorError::config_value_error(
                "max upload size",
                self.max_upload_bytes,
                "> 0 bytes",
            ));
        }

        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|origin| origin.is_empty() || origin.chars().any(char::is_whitespace))
        {
            return Err(ExtractorError::config_value_error(
                "allowed origin",
                format!("'{origin}'"),
                "non-empty origin without whitespace",
            ));
        }

        Ok(())
    }

    /// Socket address the listener binds to
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Engine configuration derived from the service settings
    #[must_use]
    pub fn processor_config(&self) -> ProcessorConfig {
        let mut builder = ProcessorConfig::builder()
            .model(self.model)
            .backend_type(self.backend)
            .execution_provider(self.execution_provider);
        if let Some(dir) = &self.model_dir {
            builder = builder.model_dir(dir.clone());
        }
        builder.build()
    }
}

/// Split a comma-separated origin list, trimming entries and dropping empties
#[must_use]
pub fn parse_allowed_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.config.allowed_origins = origins;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn model(mut self, model: ModelKind) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.model_dir = Some(dir.into());
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Validation failures, see [`ServiceConfig::validate`]
    pub fn build(self) -> Result<ServiceConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.model, ModelKind::U2Net);
    }

    #[test]
    fn test_parse_allowed_origins() {
        assert_eq!(
            parse_allowed_origins(" http://a.test , ,http://b.test,"),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(parse_allowed_origins(" , ").is_empty());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("ALLOWED_ORIGINS", "https://app.test,https://admin.test"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("MODEL", "isnet-general-use"),
            ("MAX_UPLOAD_BYTES", "2048"),
            ("BACKEND", "tract"),
            ("EXECUTION_PROVIDER", "cpu"),
            ("U2NET_HOME", "/srv/models"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.model, ModelKind::IsNetGeneralUse);
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.backend, BackendType::Tract);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.model_dir, Some(PathBuf::from("/srv/models")));

        let processor = config.processor_config();
        assert_eq!(processor.model, ModelKind::IsNetGeneralUse);
        assert_eq!(processor.backend_type, BackendType::Tract);
        assert_eq!(processor.model_dir, Some(PathBuf::from("/srv/models")));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(ServiceConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup_from(&[("HOST", "localhost:1")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup_from(&[("MODEL", "sam")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_BYTES", "0")])).is_err());
        assert!(
            ServiceConfig::from_lookup(lookup_from(&[("EXECUTION_PROVIDER", "tpu")])).is_err()
        );
    }

    #[test]
    fn test_validation_rejects_bad_origin() {
        let result = ServiceConfig::builder()
            .allowed_origins(vec!["http://a .test".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_execution_provider_parsing() {
        assert_eq!(
            "CoreML".parse::<ExecutionProvider>().unwrap(),
            ExecutionProvider::CoreMl
        );
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert_eq!(ExecutionProvider::default(), ExecutionProvider::Auto);
    }
}

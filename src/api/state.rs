//! Shared application state

use crate::config::ServiceConfig;
use crate::error::{ExtractorError, Result};
use crate::models::ModelKind;
use crate::processor::BackgroundRemovalProcessor;
use crate::services::UploadValidator;
use std::sync::{Arc, OnceLock};

/// State shared by every request handler
///
/// The model slot is filled at most once. Handlers see it either empty
/// (still starting) or loaded, never going back.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<SharedState>,
}

#[derive(Debug)]
struct SharedState {
    processor: OnceLock<Arc<BackgroundRemovalProcessor>>,
    model: ModelKind,
    validator: UploadValidator,
}

impl AppState {
    /// Empty state for the given model and upload limit
    #[must_use]
    pub fn new(model: ModelKind, max_upload_bytes: usize) -> Self {
        Self {
            inner: Arc::new(SharedState {
                processor: OnceLock::new(),
                model,
                validator: UploadValidator::new(max_upload_bytes),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.model, config.max_upload_bytes)
    }

    /// Fill the model slot
    ///
    /// # Errors
    /// - A model is already installed
    pub fn install_model(&self, processor: BackgroundRemovalProcessor) -> Result<()> {
        self.inner
            .processor
            .set(Arc::new(processor))
            .map_err(|_| ExtractorError::internal("AI model already installed"))
    }

    /// The loaded processor, if any
    #[must_use]
    pub fn processor(&self) -> Option<Arc<BackgroundRemovalProcessor>> {
        self.inner.processor.get().cloned()
    }

    #[must_use]
    pub fn is_model_loaded(&self) -> bool {
        self.inner.processor.get().is_some()
    }

    /// Model configured for this service
    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.inner.model
    }

    #[must_use]
    pub fn validator(&self) -> UploadValidator {
        self.inner.validator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::processor::{BackendType, ProcessorConfig};

    fn mock_processor(model: ModelKind) -> BackgroundRemovalProcessor {
        let config = ProcessorConfig::builder()
            .model(model)
            .backend_type(BackendType::Mock)
            .build();
        BackgroundRemovalProcessor::with_backend(config, Box::new(MockBackend::new(model)))
            .unwrap()
    }

    #[test]
    fn test_model_slot_fills_once() {
        let state = AppState::new(ModelKind::U2NetP, 1024);
        assert!(!state.is_model_loaded());
        assert!(state.processor().is_none());

        state.install_model(mock_processor(ModelKind::U2NetP)).unwrap();
        assert!(state.is_model_loaded());

        assert!(state.install_model(mock_processor(ModelKind::U2NetP)).is_err());
        assert!(state.is_model_loaded());
    }

    #[test]
    fn test_clones_share_the_slot() {
        let state = AppState::new(ModelKind::U2Net, 1024);
        let clone = state.clone();
        state.install_model(mock_processor(ModelKind::U2Net)).unwrap();
        assert!(clone.is_model_loaded());
        assert_eq!(clone.validator().max_bytes(), 1024);
        assert_eq!(clone.model(), ModelKind::U2Net);
    }
}

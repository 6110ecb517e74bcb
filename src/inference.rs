//! Inference backend abstraction

use crate::{error::Result, models::ModelInfo, processor::ProcessorConfig};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// Backends own their runtime session and take `&mut self` for inference,
/// so a shared backend has to be wrapped in a lock by its owner.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time, or `None` when nothing had to be loaded.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Runtime session creation failures
    fn initialize(&mut self, config: &ProcessorConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output tensor is not four-dimensional
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Model metadata for the loaded model
    fn model_info(&self) -> ModelInfo;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short backend name used in logs
    fn name(&self) -> &'static str;
}

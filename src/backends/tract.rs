//! Tract backend implementation
//!
//! Pure Rust inference through `tract-onnx`. Slower than ONNX Runtime but
//! needs no native libraries, which makes it the portable fallback.

use crate::error::{ExtractorError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelKind};
use crate::processor::ProcessorConfig;
use ndarray::Array4;
use std::path::PathBuf;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running background removal models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model_kind: ModelKind,
    model_path: PathBuf,
    model: Option<TractModel>,
    initialized: bool,
}

impl TractBackend {
    /// Create an uninitialized backend for the model file at `model_path`
    #[must_use]
    pub fn new(model_kind: ModelKind, model_path: PathBuf) -> Self {
        Self {
            model_kind,
            model_path,
            model: None,
            initialized: false,
        }
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        if !self.model_path.is_file() {
            return Err(ExtractorError::model(format!(
                "Model file not found: {}",
                self.model_path.display()
            )));
        }

        log::info!("🚀 Initializing Tract backend");
        log::info!("🧠 Model: {}", self.model_kind);

        let (_, _, height, width) = self.model_kind.info().input_shape;

        // The rembg exports leave the spatial dims symbolic; pin them so tract can optimize
        let model = onnx()
            .model_for_path(&self.model_path)
            .map_err(|e| ExtractorError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, height, width]).into())
            .map_err(|e| ExtractorError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| ExtractorError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                ExtractorError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &ProcessorConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ExtractorError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| ExtractorError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| ExtractorError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            ExtractorError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let [n, c, h, w] = *output_data.shape() else {
            return Err(ExtractorError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_data.ndim()
            )));
        };

        let output_array =
            Array4::from_shape_vec((n, c, h, w), output_data.iter().copied().collect())
                .map_err(|e| {
                    ExtractorError::inference(format!("Failed to reshape output tensor: {e}"))
                })?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output_array)
    }

    fn model_info(&self) -> ModelInfo {
        self.model_kind.info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}

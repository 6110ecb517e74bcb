//! ONNX Runtime backend
//!
//! Runs the segmentation models through ONNX Runtime with optional CUDA or
//! `CoreML` acceleration. Providers are checked for availability before they
//! are registered; an unavailable provider falls back to CPU with a warning.

use crate::config::ExecutionProvider;
use crate::error::{ExtractorError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelKind};
use crate::processor::ProcessorConfig;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};
use std::path::PathBuf;

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    model: ModelKind,
    model_path: PathBuf,
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create an uninitialized backend for the model file at `model_path`
    #[must_use]
    pub fn new(model: ModelKind, model_path: PathBuf) -> Self {
        Self {
            model,
            model_path,
            session: None,
            initialized: false,
        }
    }

    /// Execution providers to register for the requested provider
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        let mut providers = Vec::new();
        match requested {
            ExecutionProvider::Auto => {
                if cuda_available {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
            },
            ExecutionProvider::Cuda => {
                if cuda_available {
                    log::info!("Using CUDA execution provider");
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }
        providers
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &ProcessorConfig) -> Result<std::time::Duration> {
        let model_load_start = std::time::Instant::now();

        if !self.model_path.is_file() {
            return Err(ExtractorError::model(format!(
                "Model file not found: {}",
                self.model_path.display()
            )));
        }

        let mut session_builder = Session::builder()
            .map_err(|e| {
                ExtractorError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                ExtractorError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    ExtractorError::inference(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let available = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| ExtractorError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| ExtractorError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_file(&self.model_path)
            .map_err(|e| {
                ExtractorError::model(format!(
                    "Failed to create session from {}: {e}",
                    self.model_path.display()
                ))
            })?;

        log::debug!("✅ ONNX Runtime session created successfully");
        log::debug!("  - Model: {}", self.model);
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &ProcessorConfig) -> Result<Option<std::time::Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(ExtractorError::internal("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ExtractorError::internal("ONNX session not initialized"))?;

        let inference_start = std::time::Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            ExtractorError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional input: the rembg models name their input differently
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| ExtractorError::inference(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| ExtractorError::inference("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| ExtractorError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    ExtractorError::inference(format!("Failed to extract output tensor: {e}"))
                })?
        };

        let output_shape = output_tensor.shape().to_vec();
        let [n, c, h, w] = output_shape.as_slice() else {
            return Err(ExtractorError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (*n, *c, *h, *w),
            output_tensor
                .view()
                .to_owned()
                .into_raw_vec_and_offset()
                .0,
        )
        .map_err(|e| ExtractorError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::info!(
            "📊 Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(output_array)
    }

    fn model_info(&self) -> ModelInfo {
        self.model.info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

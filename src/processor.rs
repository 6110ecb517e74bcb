//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns one loaded model and runs the whole
//! pipeline for a single image: decode, preprocess, inference, mask
//! extraction, cutout and PNG encoding. It is shared by the HTTP service and
//! the CLI.

use crate::{
    backends::MockBackend,
    cache::ModelCache,
    config::ExecutionProvider,
    download::ModelDownloader,
    error::{ExtractorError, Result},
    inference::InferenceBackend,
    models::ModelKind,
    tracing_config::spans,
    utils::ImagePreprocessor,
};
use image::{
    imageops::FilterType, DynamicImage, GenericImageView, GrayImage, ImageDecoder, ImageFormat,
    ImageReader, Luma, Rgba, RgbaImage,
};
use instant::Instant;
use ndarray::{s, Array4, ArrayView2};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Instrument;

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// Deterministic mock backend, no model file needed
    #[cfg_attr(feature = "cli", value(hide = true))]
    Mock,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            "mock" => Ok(Self::Mock),
            other => Err(ExtractorError::config_value_error(
                "backend",
                other,
                "onnx, tract",
            )),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend for the model file at `model_path`
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model: ModelKind,
        model_path: &Path,
    ) -> Result<Box<dyn InferenceBackend>>;
}

/// Backend factory covering every backend compiled into this build
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model: ModelKind,
        model_path: &Path,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Onnx => {
                #[cfg(feature = "onnx")]
                {
                    Ok(Box::new(crate::backends::OnnxBackend::new(
                        model,
                        model_path.to_path_buf(),
                    )))
                }
                #[cfg(not(feature = "onnx"))]
                {
                    let _ = (model, model_path);
                    Err(ExtractorError::invalid_config(
                        "ONNX backend not available. Rebuild with the 'onnx' feature.",
                    ))
                }
            },
            BackendType::Tract => {
                #[cfg(feature = "tract")]
                {
                    Ok(Box::new(crate::backends::TractBackend::new(
                        model,
                        model_path.to_path_buf(),
                    )))
                }
                #[cfg(not(feature = "tract"))]
                {
                    let _ = (model, model_path);
                    Err(ExtractorError::invalid_config(
                        "Tract backend not available. Rebuild with the 'tract' feature.",
                    ))
                }
            },
            BackendType::Mock => Ok(Box::new(MockBackend::new(model))),
        }
    }
}

/// Configuration for the background removal processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Model to load
    pub model: ModelKind,
    /// Backend type to use for inference
    pub backend_type: BackendType,
    /// Execution provider for the ONNX backend
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Model cache directory (`U2NET_HOME` or `~/.u2net` when unset)
    pub model_dir: Option<PathBuf>,
    /// Show a progress bar while downloading model weights
    pub show_download_progress: bool,
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            model_dir: None,
            show_download_progress: false,
        }
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: ModelKind) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.model_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn show_download_progress(mut self, show: bool) -> Self {
        self.config.show_download_progress = show;
        self
    }

    #[must_use]
    pub fn build(self) -> ProcessorConfig {
        self.config
    }
}

impl Default for ProcessorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-stage timings of one removal, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    pub postprocessing_ms: u64,
    pub encode_ms: u64,
    pub total_ms: u64,
}

/// Result of one background removal
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// PNG bytes with the mask in the alpha channel
    pub bytes: Vec<u8>,
    /// Dimensions of the decoded input (after EXIF orientation)
    pub input_dimensions: (u32, u32),
    /// Dimensions of the encoded output
    pub output_dimensions: (u32, u32),
    pub timings: ProcessingTimings,
}

/// Background removal processor holding one loaded model
pub struct BackgroundRemovalProcessor {
    config: ProcessorConfig,
    backend: Mutex<Box<dyn InferenceBackend>>,
    backend_name: &'static str,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("model", &self.config.model)
            .field("backend", &self.backend_name)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Resolve the model weights (downloading them when missing) and load the backend
    ///
    /// # Errors
    /// - Model download or cache failures
    /// - Backend creation or initialization failures
    pub async fn load(config: ProcessorConfig) -> Result<Self> {
        Self::load_with_factory(config, &DefaultBackendFactory).await
    }

    /// Like [`Self::load`] with a custom backend factory
    ///
    /// # Errors
    /// - Model download or cache failures
    /// - Backend creation or initialization failures
    pub async fn load_with_factory(
        config: ProcessorConfig,
        factory: &dyn BackendFactory,
    ) -> Result<Self> {
        let span = spans::model_loading(config.model.as_str(), &config.backend_type.to_string());

        async move {
            let model_path = Self::resolve_model_path(&config).await?;
            let backend = factory.create_backend(config.backend_type, config.model, &model_path)?;

            let init_config = config.clone();
            let backend = tokio::task::spawn_blocking(move || -> Result<Box<dyn InferenceBackend>> {
                let mut backend = backend;
                if let Some(load_time) = backend.initialize(&init_config)? {
                    let info = backend.model_info();
                    tracing::info!(
                        load_ms = %load_time.as_millis(),
                        backend = backend.name(),
                        model = %info.name,
                        input_shape = ?info.input_shape,
                        output_shape = ?info.output_shape,
                        "Model session ready"
                    );
                }
                Ok(backend)
            })
            .await
            .map_err(|e| ExtractorError::internal(format!("Model loading task failed: {e}")))??;

            Ok(Self::from_initialized(config, backend))
        }
        .instrument(span)
        .await
    }

    /// Wrap an already constructed backend, initializing it if needed
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn with_backend(
        config: ProcessorConfig,
        mut backend: Box<dyn InferenceBackend>,
    ) -> Result<Self> {
        if !backend.is_initialized() {
            backend.initialize(&config)?;
        }
        Ok(Self::from_initialized(config, backend))
    }

    fn from_initialized(config: ProcessorConfig, backend: Box<dyn InferenceBackend>) -> Self {
        let backend_name = backend.name();
        Self {
            config,
            backend: Mutex::new(backend),
            backend_name,
        }
    }

    async fn resolve_model_path(config: &ProcessorConfig) -> Result<PathBuf> {
        if config.backend_type == BackendType::Mock {
            return Ok(PathBuf::from(config.model.file_name()));
        }

        let cache = match &config.model_dir {
            Some(dir) => ModelCache::with_dir(dir)?,
            None => ModelCache::new()?,
        };
        tracing::debug!(cache_dir = %cache.cache_dir().display(), "Resolving model weights");
        ModelDownloader::with_cache(cache)?
            .ensure_model(config.model, config.show_download_progress)
            .await
    }

    /// Model this processor runs
    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.config.model
    }

    /// Name of the backend running the model
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Remove the background from encoded image bytes
    ///
    /// Blocking and CPU-bound; async callers should run it on a blocking thread.
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    /// - Inference or encoding failures
    pub fn remove(&self, image_bytes: &[u8]) -> Result<ProcessedImage> {
        let decode_start = Instant::now();
        let image = decode_image(image_bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut processed = self.remove_image(&image)?;
        processed.timings.decode_ms = decode_ms;
        processed.timings.total_ms += decode_ms;
        Ok(processed)
    }

    /// Remove the background from an already decoded image
    ///
    /// # Errors
    /// - Empty image
    /// - Inference failures or an output tensor of unexpected shape
    /// - PNG encoding failures
    pub fn remove_image(&self, image: &DynamicImage) -> Result<ProcessedImage> {
        let model = self.config.model;
        let span = spans::removal(model.as_str(), image.as_bytes().len());
        let _guard = span.enter();

        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let input_dimensions = image.dimensions();
        let preprocessing_config = model.preprocessing_config();

        let input_tensor = {
            let _span =
                spans::preprocessing(input_dimensions, preprocessing_config.target_size).entered();
            let start = Instant::now();
            let tensor = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        let output_tensor = {
            let _span = spans::inference(self.backend_name).entered();
            let start = Instant::now();
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| ExtractorError::internal("Inference backend lock poisoned"))?;
            let output = backend.infer(&input_tensor)?;
            drop(backend);
            timings.inference_ms = start.elapsed().as_millis() as u64;
            output
        };

        let cutout = {
            let _span = spans::postprocessing("mask_and_cutout").entered();
            let start = Instant::now();
            let masks = masks_from_prediction(&output_tensor, model, input_dimensions)?;
            let cutouts: Vec<RgbaImage> = masks.iter().map(|mask| cutout(image, mask)).collect();
            let combined = stack_vertically(cutouts)?;
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            combined
        };

        let output_dimensions = cutout.dimensions();
        let encode_start = Instant::now();
        let bytes = encode_png(cutout)?;
        timings.encode_ms = encode_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        tracing::debug!(
            width = input_dimensions.0,
            height = input_dimensions.1,
            output_bytes = bytes.len(),
            total_ms = timings.total_ms,
            "Background removed"
        );

        Ok(ProcessedImage {
            bytes,
            input_dimensions,
            output_dimensions,
            timings,
        })
    }
}

/// Decode image bytes, guessing the format and applying EXIF orientation
///
/// # Errors
/// - Unknown format or decoding failure
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Turn the model output into one or more 8-bit masks at the original size
///
/// Single-map models yield one min-max normalized mask. The clothing model
/// yields three binary masks (upper body, lower body, full body) from the
/// per-pixel argmax over its four class channels.
///
/// # Errors
/// - Output tensor with an unexpected batch or channel count
pub fn masks_from_prediction(
    prediction: &Array4<f32>,
    model: ModelKind,
    original_dimensions: (u32, u32),
) -> Result<Vec<GrayImage>> {
    let (batch, channels, height, width) = prediction.dim();
    let expected_channels = model.output_channels();
    if batch < 1 || channels < expected_channels || height == 0 || width == 0 {
        return Err(ExtractorError::processing(format!(
            "Unexpected output tensor shape {:?} for model {}",
            prediction.shape(),
            model
        )));
    }

    let masks = if expected_channels == 1 {
        vec![normalized_mask(prediction.slice(s![0, 0, .., ..]))]
    } else {
        class_masks(prediction, expected_channels)
    };

    let (orig_width, orig_height) = original_dimensions;
    Ok(masks
        .into_iter()
        .map(|mask| {
            if mask.dimensions() == original_dimensions {
                mask
            } else {
                image::imageops::resize(&mask, orig_width, orig_height, FilterType::Lanczos3)
            }
        })
        .collect())
}

/// Min-max normalize one prediction map into a 0-255 mask
fn normalized_mask(prediction: ArrayView2<'_, f32>) -> GrayImage {
    let (height, width) = prediction.dim();
    let (min, max) = prediction
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = prediction
            .get((y as usize, x as usize))
            .copied()
            .unwrap_or(min);
        if range > f32::EPSILON {
            Luma([(((value - min) / range) * 255.0).clamp(0.0, 255.0) as u8])
        } else {
            Luma([0])
        }
    })
}

/// Binary masks for classes `1..channels` from the per-pixel argmax
fn class_masks(prediction: &Array4<f32>, channels: usize) -> Vec<GrayImage> {
    let (_, _, height, width) = prediction.dim();
    let labels: Vec<usize> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (y, x)))
        .map(|(y, x)| {
            (0..channels)
                .max_by(|&a, &b| {
                    let va = prediction.get([0, a, y, x]).copied().unwrap_or(f32::MIN);
                    let vb = prediction.get([0, b, y, x]).copied().unwrap_or(f32::MIN);
                    va.total_cmp(&vb).then(b.cmp(&a))
                })
                .unwrap_or(0)
        })
        .collect();

    (1..channels)
        .map(|class| {
            GrayImage::from_fn(width as u32, height as u32, |x, y| {
                let label = labels
                    .get(y as usize * width + x as usize)
                    .copied()
                    .unwrap_or(0);
                Luma([if label == class { 255 } else { 0 }])
            })
        })
        .collect()
}

/// Apply a mask as the alpha channel of the image
///
/// Existing transparency is kept (alpha is multiplied); fully transparent
/// pixels are cleared to `(0, 0, 0, 0)`.
#[must_use]
pub fn cutout(image: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbaImage::from_fn(width, height, |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let mask_value = mask.get_pixel_checked(x, y).map_or(0, |m| m[0]);
        let alpha = ((u16::from(mask_value) * u16::from(pixel[3]) + 127) / 255) as u8;
        if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        }
    })
}

/// Stack images top to bottom on a transparent canvas as wide as the widest
fn stack_vertically(mut images: Vec<RgbaImage>) -> Result<RgbaImage> {
    if images.len() == 1 {
        return images
            .pop()
            .ok_or_else(|| ExtractorError::internal("No cutout produced"));
    }

    let width = images.iter().map(RgbaImage::width).max().unwrap_or(0);
    let height: u32 = images.iter().map(RgbaImage::height).sum();
    if width == 0 || height == 0 {
        return Err(ExtractorError::processing("No cutout produced"));
    }

    let mut canvas = RgbaImage::new(width, height);
    let mut offset = 0i64;
    for image in &images {
        image::imageops::overlay(&mut canvas, image, 0, offset);
        offset += i64::from(image.height());
    }
    Ok(canvas)
}

/// Encode an RGBA image as PNG
///
/// # Errors
/// - PNG encoder failures
pub fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{rotated_split_jpeg, split_jpeg};
    use image::{ImageBuffer, Rgb};
    use std::sync::atomic::Ordering;

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
        }))
    }

    fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn mock_processor(model: ModelKind) -> BackgroundRemovalProcessor {
        let config = ProcessorConfig::builder()
            .model(model)
            .backend_type(BackendType::Mock)
            .build();
        BackgroundRemovalProcessor::with_backend(config, Box::new(MockBackend::new(model))).unwrap()
    }

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("onnx".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert_eq!(" Tract ".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert_eq!("mock".parse::<BackendType>().unwrap(), BackendType::Mock);
        assert!("cuda".parse::<BackendType>().is_err());
        assert_eq!(BackendType::default(), BackendType::Onnx);
    }

    #[test]
    fn test_processor_config_builder_chain() {
        let config = ProcessorConfig::builder()
            .model(ModelKind::U2NetHumanSeg)
            .backend_type(BackendType::Tract)
            .execution_provider(ExecutionProvider::Cpu)
            .intra_threads(2)
            .inter_threads(1)
            .model_dir("/tmp/models")
            .show_download_progress(true)
            .build();

        assert_eq!(config.model, ModelKind::U2NetHumanSeg);
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.intra_threads, 2);
        assert_eq!(config.model_dir, Some(PathBuf::from("/tmp/models")));
        assert!(config.show_download_progress);
    }

    #[test]
    fn test_default_factory_creates_mock() {
        let factory = DefaultBackendFactory;
        let backend = factory
            .create_backend(BackendType::Mock, ModelKind::U2NetP, Path::new("unused"))
            .unwrap();
        assert_eq!(backend.name(), "mock");
    }

    #[test]
    fn test_decode_applies_exif_orientation() {
        let plain = decode_image(&split_jpeg(32, 16)).unwrap();
        assert_eq!(plain.dimensions(), (32, 16));

        let rotated = decode_image(&rotated_split_jpeg(32, 16)).unwrap().to_rgb8();
        assert_eq!(rotated.dimensions(), (16, 32));

        // Rotating clockwise moves the red left half to the top
        let top = rotated.get_pixel(8, 4);
        let bottom = rotated.get_pixel(8, 28);
        assert!(top[0] > 150 && top[2] < 100, "top pixel {top:?}");
        assert!(bottom[2] > 150 && bottom[0] < 100, "bottom pixel {bottom:?}");
    }

    #[test]
    fn test_remove_follows_exif_orientation() {
        let processor = mock_processor(ModelKind::U2NetP);

        let result = processor.remove(&rotated_split_jpeg(32, 16)).unwrap();

        assert_eq!(result.input_dimensions, (16, 32));
        assert_eq!(result.output_dimensions, (16, 32));
        let output = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!(output.dimensions(), (16, 32));
    }

    #[test]
    fn test_remove_produces_png_with_original_size() {
        let processor = mock_processor(ModelKind::U2NetP);
        let input = encoded(&test_image(64, 48), ImageFormat::Png);

        let result = processor.remove(&input).unwrap();

        assert_eq!(result.input_dimensions, (64, 48));
        assert_eq!(result.output_dimensions, (64, 48));
        assert_eq!(
            image::guess_format(&result.bytes).unwrap(),
            ImageFormat::Png
        );

        let output = image::load_from_memory(&result.bytes).unwrap().to_rgba8();
        assert_eq!(output.dimensions(), (64, 48));
        assert_eq!(output.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert!(output.get_pixel(32, 24)[3] > 200);
    }

    #[test]
    fn test_remove_accepts_jpeg() {
        let processor = mock_processor(ModelKind::U2Net);
        let input = encoded(&test_image(30, 20), ImageFormat::Jpeg);
        let result = processor.remove(&input).unwrap();
        assert_eq!(result.output_dimensions, (30, 20));
    }

    #[test]
    fn test_remove_rejects_garbage() {
        let processor = mock_processor(ModelKind::U2Net);
        assert!(processor.remove(b"definitely not an image").is_err());
    }

    #[test]
    fn test_cloth_segmentation_stacks_three_cutouts() {
        let processor = mock_processor(ModelKind::U2NetClothSeg);
        let result = processor.remove_image(&test_image(20, 10)).unwrap();
        assert_eq!(result.output_dimensions, (20, 30));
    }

    #[test]
    fn test_inference_failure_is_reported() {
        let backend = MockBackend::new(ModelKind::U2NetP).failing();
        let counter = backend.call_counter();
        let processor =
            BackgroundRemovalProcessor::with_backend(ProcessorConfig::default(), Box::new(backend))
                .unwrap();

        let err = processor.remove_image(&test_image(8, 8)).unwrap_err();
        assert!(matches!(err, ExtractorError::Inference(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_constant_prediction_gives_empty_mask() {
        let prediction = Array4::<f32>::from_elem((1, 1, 4, 4), 0.7);
        let masks = masks_from_prediction(&prediction, ModelKind::U2Net, (4, 4)).unwrap();
        assert_eq!(masks.len(), 1);
        assert!(masks[0].pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_mask_is_min_max_normalized() {
        let prediction =
            Array4::from_shape_vec((1, 1, 1, 3), vec![0.2_f32, 0.6, 1.0]).unwrap();
        let masks = masks_from_prediction(&prediction, ModelKind::U2Net, (3, 1)).unwrap();
        let values: Vec<u8> = masks[0].pixels().map(|p| p[0]).collect();
        assert_eq!(values[0], 0);
        assert_eq!(values[2], 255);
        assert!((126..=128).contains(&values[1]));
    }

    #[test]
    fn test_mask_rejects_wrong_channel_count() {
        let prediction = Array4::<f32>::zeros((1, 1, 4, 4));
        assert!(masks_from_prediction(&prediction, ModelKind::U2NetClothSeg, (4, 4)).is_err());
    }

    #[test]
    fn test_cutout_clears_transparent_pixels() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(2, 1, Rgb([200, 100, 50])));
        let mask = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();

        let result = cutout(&image, &mask);
        assert_eq!(result.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(result.get_pixel(1, 0), &Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_cutout_keeps_existing_transparency() {
        let image =
            DynamicImage::ImageRgba8(ImageBuffer::from_pixel(1, 1, Rgba([10, 20, 30, 128])));
        let mask = GrayImage::from_raw(1, 1, vec![255]).unwrap();
        assert_eq!(cutout(&image, &mask).get_pixel(0, 0)[3], 128);
    }
}

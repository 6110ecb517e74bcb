//! Mock backend for tests and offline runs
//!
//! Produces a deterministic soft ellipse centred in the frame instead of
//! running a model, so the full pipeline can be exercised without weights.

use crate::error::{ExtractorError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelKind};
use crate::processor::ProcessorConfig;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock backend producing a synthetic foreground prediction
#[derive(Debug, Clone)]
pub struct MockBackend {
    model: ModelKind,
    calls: Arc<AtomicUsize>,
    fail_inference: bool,
    initialized: bool,
}

impl MockBackend {
    /// Create a mock backend shaped like the given model
    #[must_use]
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_inference: false,
            initialized: false,
        }
    }

    /// Make every inference call fail
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    /// Shared counter of inference calls, readable after the backend is moved
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Foreground score for a pixel: 1 at the centre fading to 0 at the ellipse edge
    fn ellipse_score(x: usize, y: usize, width: usize, height: usize) -> f32 {
        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;
        let rx = (width as f32 / 2.0).max(1.0) * 0.8;
        let ry = (height as f32 / 2.0).max(1.0) * 0.8;
        let dx = (x as f32 - cx) / rx;
        let dy = (y as f32 - cy) / ry;
        (1.0 - (dx * dx + dy * dy)).clamp(0.0, 1.0)
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &ProcessorConfig) -> Result<Option<std::time::Duration>> {
        self.initialized = true;
        Ok(None)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_inference {
            return Err(ExtractorError::inference("Mock inference failure"));
        }

        let (n, _c, h, w) = input.dim();
        let channels = self.model.output_channels();

        let output = if channels == 1 {
            Array4::from_shape_fn((n, 1, h, w), |(_, _, y, x)| {
                Self::ellipse_score(x, y, w, h)
            })
        } else {
            // Class 1 on the top half, class 2 on the bottom half, background outside
            Array4::from_shape_fn((n, channels, h, w), |(_, class, y, x)| {
                let inside = Self::ellipse_score(x, y, w, h) > 0.0;
                let expected = match (inside, y < h / 2) {
                    (false, _) => 0,
                    (true, true) => 1,
                    (true, false) => 2,
                };
                if class == expected {
                    1.0
                } else {
                    0.0
                }
            })
        };

        Ok(output)
    }

    fn model_info(&self) -> ModelInfo {
        self.model.info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_output() {
        let mut backend = MockBackend::new(ModelKind::U2Net);
        let output = backend.infer(&Array4::zeros((1, 3, 9, 9))).unwrap();

        assert_eq!(output.dim(), (1, 1, 9, 9));
        assert!((output[[0, 0, 4, 4]] - 1.0).abs() < f32::EPSILON);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_cloth_output_has_four_classes() {
        let mut backend = MockBackend::new(ModelKind::U2NetClothSeg);
        let output = backend.infer(&Array4::zeros((1, 3, 16, 16))).unwrap();

        assert_eq!(output.dim(), (1, 4, 16, 16));
        assert_eq!(output[[0, 1, 6, 8]], 1.0);
        assert_eq!(output[[0, 2, 10, 8]], 1.0);
        assert_eq!(output[[0, 0, 0, 0]], 1.0);
    }

    #[test]
    fn test_call_counter_and_failure_mode() {
        let mut backend = MockBackend::new(ModelKind::U2NetP).failing();
        let counter = backend.call_counter();

        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}

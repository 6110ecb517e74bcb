//! Image to tensor conversion for the segmentation models

use crate::{
    error::{ExtractorError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Smallest divisor used when scaling by the brightest channel value
const MIN_SCALE: f32 = 1e-6;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into a normalized NCHW tensor
    ///
    /// The image is converted to RGB and stretched to the model's input size
    /// (no aspect preservation, no padding). Pixel values are divided by the
    /// brightest channel value of the resized image, then normalized with the
    /// model's mean and standard deviation.
    ///
    /// # Errors
    /// - Zero-sized input image
    /// - Zero-sized target dimensions in the configuration
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;

        if target_width == 0 || target_height == 0 {
            return Err(ExtractorError::processing(
                "Model input size must be non-zero",
            ));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractorError::processing("Cannot preprocess an empty image"));
        }

        let resized = image::imageops::resize(
            &image.to_rgb8(),
            target_width,
            target_height,
            FilterType::Lanczos3,
        );

        Ok(Self::image_to_tensor(&resized, preprocessing_config))
    }

    /// Convert a resized RGB image to a normalized tensor
    fn image_to_tensor(image: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let max_value = image
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(MIN_SCALE, |max| f32::from(max).max(MIN_SCALE));

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match image size
        for (x, y, pixel) in image.enumerate_pixels() {
            for channel in 0..3 {
                let scaled = f32::from(pixel[channel]) / max_value;
                tensor[[0, channel, y as usize, x as usize]] =
                    (scaled - mean[channel]) / std[channel];
            }
        }

        tensor
    }
}

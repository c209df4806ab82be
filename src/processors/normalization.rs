//! Image normalization into model input tensors.
//!
//! Pixel values are mapped per channel as `value * alpha + beta`, where
//! `alpha = scale / std` and `beta = -mean / std`, and laid out channel-first
//! as a `[1, 3, H, W]` tensor.

use crate::core::OCRError;
use image::RgbImage;
use ndarray::Array4;

/// Normalizes RGB images into NCHW float tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a normalizer.
    ///
    /// # Arguments
    ///
    /// * `scale` - Factor applied to raw `u8` values before mean/std
    /// * `mean` - Per-channel mean, in scaled units
    /// * `std` - Per-channel standard deviation, in scaled units
    ///
    /// # Errors
    ///
    /// Returns an error if `scale` or any standard deviation is not positive.
    pub fn new(scale: f32, mean: [f32; 3], std: [f32; 3]) -> Result<Self, OCRError> {
        if scale <= 0.0 {
            return Err(OCRError::ConfigError {
                message: "Scale must be greater than 0".to_string(),
            });
        }

        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(OCRError::ConfigError {
                    message: format!(
                        "Standard deviation at index {i} must be greater than 0, got {s}"
                    ),
                });
            }
        }

        let alpha = [scale / std[0], scale / std[1], scale / std[2]];
        let beta = [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]];

        Ok(Self { alpha, beta })
    }

    /// Normalization for the layout detector: `[0, 255]` to `[0, 1]`, then mean/std.
    pub fn for_layout(mean: [f32; 3], std: [f32; 3]) -> Result<Self, OCRError> {
        Self::new(1.0 / 255.0, mean, std)
    }

    /// Normalization for text recognition: maps `[0, 255]` onto `[-1, 1]`.
    pub fn for_ocr_recognition() -> Result<Self, OCRError> {
        Self::new(2.0 / 255.0, [1.0, 1.0, 1.0], [1.0, 1.0, 1.0])
    }

    /// Normalizes an image into a `[1, 3, H, W]` tensor.
    pub fn to_tensor(&self, img: &RgbImage) -> Array4<f32> {
        let (width, height) = img.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    pixel[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }

        tensor
    }
}

//! Letterbox padding and fixed-size resizing.

use image::{RgbImage, imageops};

/// Scale information recorded while letterboxing, used to map detections back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// Original image width.
    pub orig_width: u32,
    /// Original image height.
    pub orig_height: u32,
    /// Side of the padded square canvas (`max(width, height)`).
    pub padded_side: u32,
    /// Model input width.
    pub input_width: u32,
    /// Model input height.
    pub input_height: u32,
}

impl LetterboxInfo {
    /// Maps a point from model-input coordinates to original-image coordinates.
    ///
    /// The image is anchored at the top-left of the canvas, so no offset is involved.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = self.padded_side as f32 / self.input_width as f32;
        let sy = self.padded_side as f32 / self.input_height as f32;
        (x * sx, y * sy)
    }
}

/// Pads an image onto a black square canvas anchored top-left, then resizes
/// the square to `input_width` × `input_height`.
pub fn letterbox(img: &RgbImage, input_width: u32, input_height: u32) -> (RgbImage, LetterboxInfo) {
    let (orig_width, orig_height) = img.dimensions();
    let padded_side = orig_width.max(orig_height).max(1);

    let mut canvas = RgbImage::new(padded_side, padded_side);
    imageops::replace(&mut canvas, img, 0, 0);

    let resized = if padded_side == input_width && padded_side == input_height {
        canvas
    } else {
        imageops::resize(
            &canvas,
            input_width,
            input_height,
            imageops::FilterType::Triangle,
        )
    };

    (
        resized,
        LetterboxInfo {
            orig_width,
            orig_height,
            padded_side,
            input_width,
            input_height,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_letterbox_pads_bottom_right() {
        let img = RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]));
        let (out, info) = letterbox(&img, 40, 40);

        assert_eq!(out.dimensions(), (40, 40));
        assert_eq!(info.padded_side, 40);
        assert_eq!(out.get_pixel(5, 5), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(5, 35), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_to_original_scales_by_padded_side() {
        let img = RgbImage::new(1600, 800);
        let (out, info) = letterbox(&img, 800, 800);
        assert_eq!(out.dimensions(), (800, 800));
        assert_eq!(info.to_original(100.0, 50.0), (200.0, 100.0));
    }
}

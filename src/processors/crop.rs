//! Cropping detected regions into recognition jobs.

use crate::core::{OCRError, ProcessingStage};
use crate::domain::{BoundingBox, RecognitionJob, TextRegion};
use image::{RgbImage, imageops};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Crops one bounding box out of an image.
///
/// # Errors
///
/// Returns an error if the box does not intersect the image.
pub fn crop_bounding_box(image: &RgbImage, bbox: &BoundingBox) -> Result<RgbImage, OCRError> {
    let (width, height) = image.dimensions();
    if bbox.x >= width || bbox.y >= height {
        return Err(OCRError::Processing {
            kind: ProcessingStage::Cropping,
            context: format!("box {bbox:?} lies outside {width}x{height} image"),
        });
    }
    let w = bbox.width.min(width - bbox.x);
    let h = bbox.height.min(height - bbox.y);
    Ok(imageops::crop_imm(image, bbox.x, bbox.y, w, h).to_image())
}

/// Crops every region into a [`RecognitionJob`] whose `id` is the region's index.
///
/// Cropping runs on the rayon pool when there are more regions than
/// `parallel_threshold`. Regions that cannot be cropped produce no job; their
/// text resolves to empty when results are realigned.
pub fn crop_regions(
    image: &RgbImage,
    regions: &[TextRegion],
    parallel_threshold: usize,
) -> Vec<RecognitionJob> {
    let crop = |(id, region): (usize, &TextRegion)| match crop_bounding_box(image, &region.bbox) {
        Ok(pixels) => Some(RecognitionJob::new(id, pixels, region.char_count_category)),
        Err(e) => {
            warn!("Failed to crop region {id}: {e}");
            None
        }
    };

    if regions.len() > parallel_threshold {
        debug!("Using parallel cropping for {} regions", regions.len());
        regions.par_iter().enumerate().filter_map(crop).collect()
    } else {
        debug!("Using sequential cropping for {} regions", regions.len());
        regions.iter().enumerate().filter_map(crop).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CharCountCategory;
    use image::Rgb;

    fn region(x: u32, y: u32, w: u32, h: u32) -> TextRegion {
        TextRegion::new(
            BoundingBox::new(x, y, w, h),
            0.9,
            1,
            CharCountCategory::Medium,
        )
    }

    #[test]
    fn test_crop_keeps_ids_in_both_modes() {
        let mut image = RgbImage::new(100, 100);
        image.put_pixel(10, 10, Rgb([255, 0, 0]));
        let regions: Vec<TextRegion> = (0..8).map(|i| region(i * 10, 10, 10, 20)).collect();

        for threshold in [0, 100] {
            let jobs = crop_regions(&image, &regions, threshold);
            let ids: Vec<usize> = jobs.iter().map(|j| j.id).collect();
            assert_eq!(ids, (0..8).collect::<Vec<_>>());
            assert_eq!(jobs[1].image.dimensions(), (10, 20));
            assert_eq!(jobs[1].image.get_pixel(0, 0), &Rgb([255, 0, 0]));
            assert_eq!(jobs[1].category, CharCountCategory::Medium);
        }
    }

    #[test]
    fn test_out_of_bounds_region_is_skipped() {
        let image = RgbImage::new(50, 50);
        let regions = vec![region(0, 0, 10, 10), region(60, 60, 10, 10)];
        let jobs = crop_regions(&image, &regions, 10);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, 0);
    }

    #[test]
    fn test_crop_is_clipped_to_image() {
        let image = RgbImage::new(50, 50);
        let crop = crop_bounding_box(&image, &BoundingBox::new(40, 40, 30, 30)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
    }
}

//! Units of work exchanged with recognition workers.

use super::region::CharCountCategory;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One cropped region sent to a recognition worker.
///
/// `id` is the region's index in detection order. It travels with the job and
/// its result so completions can be realigned regardless of arrival order.
/// The crop is owned by the job; sending it moves the pixels to the worker.
#[derive(Debug)]
pub struct RecognitionJob {
    pub id: usize,
    pub image: RgbImage,
    pub category: CharCountCategory,
}

impl RecognitionJob {
    pub fn new(id: usize, image: RgbImage, category: CharCountCategory) -> Self {
        Self {
            id,
            image,
            category,
        }
    }
}

/// Recognized text for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOutput {
    pub id: usize,
    pub text: String,
    pub confidence: f32,
}

impl RecognitionOutput {
    pub fn new(id: usize, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            id,
            text: text.into(),
            confidence,
        }
    }

    /// The result substituted when recognition of a region fails.
    pub fn empty(id: usize) -> Self {
        Self::new(id, String::new(), 0.0)
    }
}

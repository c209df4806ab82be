//! Layout detector configuration.

use super::ConfigValidator;
use crate::core::constants::*;
use crate::core::errors::{OCRError, OcrResult};
use serde::{Deserialize, Serialize};

/// Configuration of the layout (text-line) detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Model input resolution as `(height, width)`.
    #[serde(default = "LayoutConfig::default_input_shape")]
    pub input_shape: (u32, u32),

    /// Per-channel normalization mean (RGB).
    #[serde(default = "LayoutConfig::default_mean")]
    pub mean: [f32; 3],

    /// Per-channel normalization standard deviation (RGB).
    #[serde(default = "LayoutConfig::default_std")]
    pub std: [f32; 3],

    /// Detections scoring below this are discarded.
    #[serde(default = "LayoutConfig::default_score_threshold")]
    pub score_threshold: f32,

    /// IoU at or above which a lower-confidence detection is suppressed.
    #[serde(default = "LayoutConfig::default_nms_threshold")]
    pub nms_threshold: f32,

    /// Minimum width and height of a kept region, in original-image pixels.
    #[serde(default = "LayoutConfig::default_min_box_side")]
    pub min_box_side: u32,

    /// Fraction of the box height added to both its top and bottom edge.
    #[serde(default = "LayoutConfig::default_vertical_expand_ratio")]
    pub vertical_expand_ratio: f32,

    /// 0-indexed detector classes that denote text lines.
    #[serde(default = "LayoutConfig::default_text_line_classes")]
    pub text_line_classes: Vec<usize>,

    /// Human-readable names of the detector classes, indexed by 0-based class id.
    #[serde(default = "LayoutConfig::default_class_names")]
    pub class_names: Vec<String>,
}

impl LayoutConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model input resolution.
    pub fn with_input_shape(mut self, height: u32, width: u32) -> Self {
        self.input_shape = (height, width);
        self
    }

    /// Sets the score threshold.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Sets the NMS IoU threshold.
    pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
        self.nms_threshold = threshold;
        self
    }

    /// Sets the text-line class set.
    pub fn with_text_line_classes(mut self, classes: Vec<usize>) -> Self {
        self.text_line_classes = classes;
        self
    }

    /// Returns true if the 0-indexed class denotes a text line.
    pub fn is_text_line_class(&self, class_id: usize) -> bool {
        self.text_line_classes.contains(&class_id)
    }

    /// Returns the name of a 0-indexed class, if known.
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.class_names.get(class_id).map(String::as_str)
    }

    fn default_input_shape() -> (u32, u32) {
        (DEFAULT_LAYOUT_INPUT_SIZE, DEFAULT_LAYOUT_INPUT_SIZE)
    }

    fn default_mean() -> [f32; 3] {
        DEFAULT_LAYOUT_MEAN
    }

    fn default_std() -> [f32; 3] {
        DEFAULT_LAYOUT_STD
    }

    fn default_score_threshold() -> f32 {
        DEFAULT_SCORE_THRESHOLD
    }

    fn default_nms_threshold() -> f32 {
        DEFAULT_NMS_THRESHOLD
    }

    fn default_min_box_side() -> u32 {
        DEFAULT_MIN_BOX_SIDE
    }

    fn default_vertical_expand_ratio() -> f32 {
        DEFAULT_VERTICAL_EXPAND_RATIO
    }

    fn default_text_line_classes() -> Vec<usize> {
        vec![1, 2, 3, 4, 5]
    }

    fn default_class_names() -> Vec<String> {
        [
            "text_block",
            "line_main",
            "line_caption",
            "line_ad",
            "line_note",
            "line_note_tochu",
            "block_fig",
            "block_ad",
            "block_pillar",
            "block_folio",
            "block_rubi",
            "block_chart",
            "block_eqn",
            "block_cfm",
            "block_eng",
            "block_table",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            input_shape: Self::default_input_shape(),
            mean: Self::default_mean(),
            std: Self::default_std(),
            score_threshold: Self::default_score_threshold(),
            nms_threshold: Self::default_nms_threshold(),
            min_box_side: Self::default_min_box_side(),
            vertical_expand_ratio: Self::default_vertical_expand_ratio(),
            text_line_classes: Self::default_text_line_classes(),
            class_names: Self::default_class_names(),
        }
    }
}

impl ConfigValidator for LayoutConfig {
    fn validate(&self) -> OcrResult<()> {
        if self.input_shape.0 == 0 || self.input_shape.1 == 0 {
            return Err(OCRError::config_error(format!(
                "layout input shape must be positive, got {:?}",
                self.input_shape
            )));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(OCRError::config_error(format!(
                "score threshold must be in [0, 1], got {}",
                self.score_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(OCRError::config_error(format!(
                "NMS threshold must be in [0, 1], got {}",
                self.nms_threshold
            )));
        }
        if let Some((i, s)) = self.std.iter().enumerate().find(|(_, s)| **s <= 0.0) {
            return Err(OCRError::config_error(format!(
                "Standard deviation at index {i} must be greater than 0, got {s}"
            )));
        }
        if self.vertical_expand_ratio < 0.0 {
            return Err(OCRError::config_error(
                "vertical expand ratio must not be negative",
            ));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

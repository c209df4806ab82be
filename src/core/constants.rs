//! Constants used throughout the OCR pipeline.

/// Square input resolution of the layout model.
pub const DEFAULT_LAYOUT_INPUT_SIZE: u32 = 800;

/// ImageNet channel means used by the layout model.
pub const DEFAULT_LAYOUT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations used by the layout model.
pub const DEFAULT_LAYOUT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Detections scoring below this are discarded.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;

/// A detection is suppressed when its IoU with a kept detection reaches this value.
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.5;

/// Minimum width and height, in original-image pixels, of a kept region.
pub const DEFAULT_MIN_BOX_SIDE: u32 = 10;

/// Fraction of box height added above and below each detection.
pub const DEFAULT_VERTICAL_EXPAND_RATIO: f32 = 0.02;

/// Height of every recognizer input.
pub const DEFAULT_REC_INPUT_HEIGHT: u32 = 16;

/// Input widths of the narrow, medium and wide recognizers.
pub const DEFAULT_REC_WIDTHS: [u32; 3] = [256, 384, 768];

/// Default maximum number of decoded positions.
pub const DEFAULT_REC_MAX_LENGTH: usize = 100;

/// Arg-max index that terminates decoding.
pub const EOS_TOKEN: usize = 0;

/// Reserved control tokens (start, end, pad) skipped during decoding.
pub const CONTROL_TOKENS: [usize; 3] = [1, 2, 3];

/// Confidence attached to every recognized line.
///
/// This is a nominal value, not derived from logits.
pub const NOMINAL_REC_CONFIDENCE: f32 = 1.0;

/// Lower bound on the number of recognition workers.
pub const MIN_RECOGNITION_WORKERS: usize = 2;

/// Upper bound on the number of recognition workers.
pub const MAX_RECOGNITION_WORKERS: usize = 8;

/// Number of regions above which cropping runs on the rayon pool.
pub const DEFAULT_CROP_PARALLEL_THRESHOLD: usize = 4;

/// Version tag of the model artifacts this build expects.
pub const MODEL_VERSION_TAG: &str = "2025.1";

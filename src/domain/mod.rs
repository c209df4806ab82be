//! Domain-level structures shared across the OCR pipeline.
//!
//! This module groups the geometric region types produced by layout detection,
//! the recognized text blocks built from them, the units of work exchanged with
//! recognition workers, and the writing-direction policy used for reading order.

pub mod orientation;
pub mod recognition;
pub mod region;

pub use orientation::WritingDirection;
pub use recognition::{RecognitionJob, RecognitionOutput};
pub use region::{BoundingBox, CharCountCategory, TextBlock, TextRegion};

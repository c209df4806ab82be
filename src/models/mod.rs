//! Model wrappers for the OCR pipeline.
//!
//! Each wrapper owns its inference engine and implements the pre- and
//! post-processing around the forward pass:
//!
//! * [`LayoutDetector`] finds text lines on a page.
//! * [`TextRecognizer`] reads one cropped line at a fixed input width.
//! * [`RecognizerCascade`] bundles the three recognizer widths for one worker.

pub mod cascade;
pub mod layout;
pub mod recognition;

pub use cascade::RecognizerCascade;
pub use layout::LayoutDetector;
pub use recognition::{RecognizerTier, TextRecognizer};

//! Image and tensor processing used around model inference.
//!
//! This module provides the pre- and post-processing steps of the pipeline:
//! letterboxing and normalization into input tensors, greedy non-maximum
//! suppression, region cropping, greedy recognition decoding and
//! reading-order assembly.

pub mod crop;
pub mod decode;
pub mod geometry;
pub mod letterbox;
pub mod normalization;
pub mod sorting;

pub use crop::{crop_bounding_box, crop_regions};
pub use decode::GreedyDecoder;
pub use geometry::{compute_nms_keep_indices, non_max_suppression};
pub use letterbox::{LetterboxInfo, letterbox};
pub use normalization::NormalizeImage;
pub use sorting::{ReadingOrderAssembler, sort_by_xycut};

//! # Cascade OCR
//!
//! Page OCR with ONNX models: text-line layout detection, cascade text
//! recognition and reading-order assembly, with recognition spread over a
//! pool of worker threads.
//!
//! ## Features
//!
//! - Letterboxed layout detection with greedy non-maximum suppression
//! - Three recognizers of increasing input width, picked per line by the
//!   detector's character-count hint
//! - Round-robin recognition across workers with results realigned by region id
//! - XY-cut reading order for vertical (right-to-left) and horizontal text
//! - Versioned model cache with HTTP or directory download fallback
//!
//! ## Modules
//!
//! * [`cache`] - Model cache stores, artifact sources and the model loader
//! * [`core`] - Errors, configuration and the inference-engine seam
//! * [`domain`] - Regions, blocks and recognition jobs
//! * [`models`] - Layout detector and recognizer cascade
//! * [`pipeline`] - Pipeline state machine, worker pool and job protocol
//! * [`processors`] - Letterboxing, normalization, cropping, decoding and sorting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cascade_ocr::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default()
//!     .with_source(ModelSourceConfig::default().with_base("https://example.com/models"));
//! let mut worker = OcrWorker::spawn(OcrPipeline::from_config(config)?)?;
//! worker.initialize(|_| {})?;
//!
//! let page = Arc::new(image::open("page.png")?.to_rgb8());
//! let result = worker.process_page(Arc::clone(&page), |_| {})?;
//! println!("{}", result.full_text);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod processors;

/// Prelude module for convenient imports.
///
/// ```rust
/// use cascade_ocr::prelude::*;
/// ```
///
/// For custom engines, caches or artifact sources, import from the
/// respective modules (`cascade_ocr::core::inference`, `cascade_ocr::cache`).
pub mod prelude {
    pub use crate::core::config::{
        LayoutConfig, ModelSourceConfig, ParallelPolicy, PipelineConfig, RecognizerConfig,
    };
    pub use crate::core::{OCRError, OcrResult, init_tracing};
    pub use crate::domain::{BoundingBox, TextBlock, TextRegion, WritingDirection};
    pub use crate::pipeline::{
        OcrPipeline, OcrWorker, PageResult, PipelineEvent, PipelineRequest, PipelineStage,
    };
}

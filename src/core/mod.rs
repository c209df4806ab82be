//! The core module of the OCR pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration management
//! - Constants used throughout the pipeline
//! - Error handling
//! - The inference-engine seam and its ONNX Runtime implementation
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;

pub use config::{
    ConfigValidator, LayoutConfig, ModelArtifact, ModelSourceConfig, OnnxThreadingConfig,
    ParallelPolicy, PipelineConfig, RecognizerConfig,
};
pub use constants::*;
pub use errors::{FailureKind, OCRError, OcrResult, ProcessingStage};
pub use inference::{
    EngineFactory, InferenceEngine, OrtEngineFactory, OrtInfer, TensorInput, TensorOutput,
};

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Calling it again after a subscriber is installed does nothing.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();
}

//! Configuration management for the OCR pipeline.
//!
//! Every configuration struct is `serde`-deserializable with per-field
//! defaults, so a partial JSON document only overrides what it names.

pub mod layout;
pub mod parallel;
pub mod pipeline;
pub mod recognition;
pub mod source;

pub use layout::LayoutConfig;
pub use parallel::{OnnxThreadingConfig, ParallelPolicy};
pub use pipeline::PipelineConfig;
pub use recognition::{RecognizerConfig, default_charset};
pub use source::{ModelArtifact, ModelSourceConfig};

use crate::core::errors::OcrResult;

/// Trait implemented by configuration types that can check their own invariants.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> OcrResult<()>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;
}

//! Top-level pipeline configuration.

use super::{ConfigValidator, LayoutConfig, ModelSourceConfig, ParallelPolicy};
use crate::core::errors::OcrResult;
use crate::domain::WritingDirection;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to build an [`OcrPipeline`](crate::pipeline::OcrPipeline).
///
/// The recognizer configuration is not part of this struct: it travels with
/// the models and is fetched by the model loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model locations and cache.
    #[serde(default)]
    pub source: ModelSourceConfig,

    /// Layout detector settings.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Worker pool and crop parallelism.
    #[serde(default)]
    pub parallel: ParallelPolicy,

    /// Reading direction used to order recognized blocks.
    #[serde(default)]
    pub writing_direction: WritingDirection,
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> OcrResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the model source.
    pub fn with_source(mut self, source: ModelSourceConfig) -> Self {
        self.source = source;
        self
    }

    /// Sets the layout configuration.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the parallel policy.
    pub fn with_parallel(mut self, parallel: ParallelPolicy) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the writing direction.
    pub fn with_writing_direction(mut self, direction: WritingDirection) -> Self {
        self.writing_direction = direction;
        self
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> OcrResult<()> {
        self.source.validate()?;
        self.layout.validate()?;
        self.parallel.validate()
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

//! Parallelism settings for the recognition worker pool and the crop stage.

use super::ConfigValidator;
use crate::core::constants::{
    DEFAULT_CROP_PARALLEL_THRESHOLD, MAX_RECOGNITION_WORKERS, MIN_RECOGNITION_WORKERS,
};
use crate::core::errors::{OCRError, OcrResult};
use serde::{Deserialize, Serialize};

/// How much of the machine the pipeline is allowed to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Number of recognition workers.
    /// If None, `clamp(available_parallelism, 2, 8)` is used.
    /// `Some(1)` runs recognition in-process without spawning workers.
    #[serde(default)]
    pub recognition_workers: Option<usize>,

    /// Number of regions at or below which cropping stays sequential.
    /// Default: 4
    #[serde(default = "ParallelPolicy::default_crop_threshold")]
    pub crop_threshold: usize,

    /// ONNX Runtime threading configuration
    #[serde(default)]
    pub onnx_threading: OnnxThreadingConfig,
}

/// ONNX Runtime threading applied to every session the pipeline creates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OnnxThreadingConfig {
    /// Number of threads used to parallelize execution within nodes.
    /// If None, uses ONNX Runtime default.
    #[serde(default)]
    pub intra_threads: Option<usize>,
}

impl OnnxThreadingConfig {
    /// Create a new OnnxThreadingConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the intra-op threads.
    pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
        self.intra_threads = threads;
        self
    }
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the recognition worker count.
    pub fn with_recognition_workers(mut self, workers: Option<usize>) -> Self {
        self.recognition_workers = workers;
        self
    }

    /// Set the crop parallelism threshold.
    pub fn with_crop_threshold(mut self, threshold: usize) -> Self {
        self.crop_threshold = threshold;
        self
    }

    /// Set the ONNX threading configuration.
    pub fn with_onnx_threading(mut self, config: OnnxThreadingConfig) -> Self {
        self.onnx_threading = config;
        self
    }

    /// Worker count the pool should start.
    pub fn resolved_worker_count(&self) -> usize {
        match self.recognition_workers {
            Some(n) => n.max(1),
            None => {
                let available = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(MIN_RECOGNITION_WORKERS);
                available.clamp(MIN_RECOGNITION_WORKERS, MAX_RECOGNITION_WORKERS)
            }
        }
    }

    fn default_crop_threshold() -> usize {
        DEFAULT_CROP_PARALLEL_THRESHOLD
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            recognition_workers: None,
            crop_threshold: Self::default_crop_threshold(),
            onnx_threading: OnnxThreadingConfig::default(),
        }
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> OcrResult<()> {
        if self.recognition_workers == Some(0) {
            return Err(OCRError::config_error(
                "recognition_workers must be at least 1 when set",
            ));
        }
        if self.onnx_threading.intra_threads == Some(0) {
            return Err(OCRError::config_error(
                "intra_threads must be at least 1 when set",
            ));
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

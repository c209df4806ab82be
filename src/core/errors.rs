//! Error types for the OCR pipeline.
//!
//! The variants follow the pipeline's propagation policy: model artifact
//! failures (`ModelFetch`, `ModelNotFound`) abort initialisation, `Inference`
//! errors are absorbed per region by the recognizer, and `WorkerFault` fails a
//! whole page during parallel recognition.
//!
//! # Usage
//!
//! ```rust
//! use cascade_ocr::core::errors::OCRError;
//!
//! let error = OCRError::not_initialized("LayoutDetector");
//! assert!(error.to_string().contains("LayoutDetector"));
//!
//! let error = OCRError::worker_fault(2, "recognizer session poisoned");
//! assert!(error.is_worker_fault());
//! ```

use serde::Serialize;
use thiserror::Error;

/// Enum representing the pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Building input tensors from pixel data.
    Preprocessing,
    /// Interpreting model outputs.
    PostProcessing,
    /// Cropping regions out of the page image.
    Cropping,
    /// Decoding recognition logits into text.
    Decoding,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Preprocessing => write!(f, "preprocessing"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::Cropping => write!(f, "cropping"),
            ProcessingStage::Decoding => write!(f, "decoding"),
        }
    }
}

/// Coarse error category, kept when an error crosses a thread boundary as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ModelFetch,
    ModelNotFound,
    NotInitialized,
    Inference,
    WorkerFault,
    /// The pipeline thread is gone.
    Disconnected,
    Other,
}

/// Enum representing various errors that can occur in the OCR pipeline.
#[derive(Error, Debug)]
pub enum OCRError {
    /// Network or HTTP failure while fetching a model artifact.
    #[error("failed to fetch model '{name}': {reason}")]
    ModelFetch {
        /// Artifact name.
        name: String,
        /// HTTP status or transport failure description.
        reason: String,
        /// Underlying transport error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The artifact path resolved to something that is not a model (an HTML fallback page).
    #[error("model '{name}' not found at '{path}'")]
    ModelNotFound {
        /// Artifact name.
        name: String,
        /// Relative path that was requested.
        path: String,
    },

    /// An operation was invoked before the component was initialised.
    #[error("{component} is not initialized")]
    NotInitialized {
        /// The component that was used too early.
        component: String,
    },

    /// The inference engine failed or produced malformed output.
    #[error("inference failed for model '{model_name}': {context}")]
    Inference {
        /// The model the engine was running.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A parallel recognition worker reported failure during dispatch.
    #[error("recognition worker {worker} failed: {message}")]
    WorkerFault {
        /// Index of the worker in the pool.
        worker: usize,
        /// Message reported by the worker.
        message: String,
    },

    /// A processing step failed.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// The model cache could not be read or written.
    #[error("model cache: {message}")]
    Cache {
        /// A message describing the cache failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The pipeline state machine was asked to make a transition it does not allow.
    #[error("invalid pipeline transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A pipeline running on another thread reported a failure.
    #[error("pipeline failed: {message}")]
    PipelineFailure {
        /// Page the failure belongs to, if any.
        id: Option<u64>,
        /// Category of the original error.
        kind: FailureKind,
        /// Message reported by the pipeline.
        message: String,
    },

    /// Error occurred while decoding an image.
    #[error("image load")]
    ImageLoad(#[from] image::ImageError),

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),
}

/// Convenient result alias for OCR operations.
pub type OcrResult<T> = Result<T, OCRError>;

impl OCRError {
    /// Creates a `ModelFetch` error without an underlying source.
    pub fn model_fetch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelFetch {
            name: name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a `ModelFetch` error wrapping a transport error.
    pub fn model_fetch_with_source(
        name: impl Into<String>,
        reason: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelFetch {
            name: name.into(),
            reason: reason.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates a `ModelNotFound` error.
    pub fn model_not_found(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ModelNotFound {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Creates a `NotInitialized` error for the given component.
    pub fn not_initialized(component: impl Into<String>) -> Self {
        Self::NotInitialized {
            component: component.into(),
        }
    }

    /// Creates an `Inference` error describing malformed engine output.
    pub fn inference(model_name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: None,
        }
    }

    /// Creates an `Inference` error wrapping the engine's own error.
    pub fn inference_with_source(
        model_name: impl Into<String>,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates a `WorkerFault` error.
    pub fn worker_fault(worker: usize, message: impl Into<String>) -> Self {
        Self::WorkerFault {
            worker,
            message: message.into(),
        }
    }

    /// Creates a post-processing error.
    pub fn post_processing(context: impl Into<String>) -> Self {
        Self::Processing {
            kind: ProcessingStage::PostProcessing,
            context: context.into(),
        }
    }

    /// Creates a preprocessing error.
    pub fn preprocessing(context: impl Into<String>) -> Self {
        Self::Processing {
            kind: ProcessingStage::Preprocessing,
            context: context.into(),
        }
    }

    /// Creates a decoding error.
    pub fn decoding(context: impl Into<String>) -> Self {
        Self::Processing {
            kind: ProcessingStage::Decoding,
            context: context.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a cache error wrapping the underlying failure.
    pub fn cache(
        message: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates an error for a failure reported over the pipeline event channel.
    pub fn pipeline_failure(
        id: Option<u64>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self::PipelineFailure {
            id,
            kind,
            message: message.into(),
        }
    }

    /// The category of this error. A `PipelineFailure` reports the category
    /// of the error it was built from.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ModelFetch { .. } => FailureKind::ModelFetch,
            Self::ModelNotFound { .. } => FailureKind::ModelNotFound,
            Self::NotInitialized { .. } => FailureKind::NotInitialized,
            Self::Inference { .. } | Self::Session(_) | Self::Tensor(_) => FailureKind::Inference,
            Self::WorkerFault { .. } => FailureKind::WorkerFault,
            Self::PipelineFailure { kind, .. } => *kind,
            _ => FailureKind::Other,
        }
    }

    /// Returns true if this error was raised by a recognition worker.
    pub fn is_worker_fault(&self) -> bool {
        matches!(self, Self::WorkerFault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_fetch_message() {
        let err = OCRError::model_fetch("layout", "HTTP 503");
        assert_eq!(err.to_string(), "failed to fetch model 'layout': HTTP 503");
    }

    #[test]
    fn test_model_not_found_message() {
        let err = OCRError::model_not_found("recognition30", "models/recognition30.onnx");
        assert!(err.to_string().contains("models/recognition30.onnx"));
    }

    #[test]
    fn test_inference_with_source_keeps_chain() {
        let io = std::io::Error::other("engine crashed");
        let err = OCRError::inference_with_source("layout", "forward pass", io);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("engine crashed"));
    }

    #[test]
    fn test_kind_survives_pipeline_failure() {
        let err = OCRError::model_not_found("layout", "layout.onnx");
        assert_eq!(err.kind(), FailureKind::ModelNotFound);
        let relayed = OCRError::pipeline_failure(None, err.kind(), err.to_string());
        assert_eq!(relayed.kind(), FailureKind::ModelNotFound);
        assert_eq!(OCRError::config_error("x").kind(), FailureKind::Other);
    }

    #[test]
    fn test_decoding_error_names_stage() {
        let err = OCRError::decoding("empty vocabulary");
        assert!(matches!(
            err,
            OCRError::Processing {
                kind: ProcessingStage::Decoding,
                ..
            }
        ));
        assert_eq!(err.to_string(), "decoding failed: empty vocabulary");
    }

    #[test]
    fn test_worker_fault_predicate() {
        assert!(OCRError::worker_fault(0, "boom").is_worker_fault());
        assert!(!OCRError::not_initialized("x").is_worker_fault());
    }
}

//! The inference-engine seam.

use super::tensor::{TensorInput, TensorOutput};
use crate::core::errors::OcrResult;

/// A loaded model that maps named input tensors to named output tensors.
///
/// Implementations own their session exclusively. `infer` takes `&mut self`
/// so a session is never driven from two call sites at once.
pub trait InferenceEngine: Send {
    /// Name of the model this engine was built from.
    fn model_name(&self) -> &str;

    /// Names of the inputs the model declares, in declaration order.
    fn input_names(&self) -> Vec<String>;

    /// Runs one forward pass.
    ///
    /// Outputs are returned in the model's declared output order. The caller
    /// is responsible for interpreting their shapes.
    fn infer(
        &mut self,
        inputs: &[(&str, TensorInput<'_>)],
    ) -> OcrResult<Vec<(String, TensorOutput)>>;
}

/// Builds inference engines from raw model bytes.
///
/// Factories are shared across worker threads; each worker calls `create`
/// itself so that the resulting session lives on that worker only.
pub trait EngineFactory: Send + Sync {
    /// Creates an engine for `model_name` from its serialized bytes.
    fn create(&self, model_name: &str, model_bytes: &[u8]) -> OcrResult<Box<dyn InferenceEngine>>;
}

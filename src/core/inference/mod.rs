//! Structures and helpers for model inference.
//!
//! The pipeline never talks to ONNX Runtime directly: every model is driven
//! through the [`InferenceEngine`] trait, which maps named input tensors to
//! named output tensors. [`OrtInfer`] is the production implementation and
//! [`OrtEngineFactory`] builds one per model inside the thread that owns it.

pub mod engine;
pub mod ort_infer;
pub mod session;
pub mod tensor;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{EngineFactory, InferenceEngine};
pub use ort_infer::{OrtEngineFactory, OrtInfer};
pub use session::load_session_from_memory;
pub use tensor::{TensorInput, TensorOutput};

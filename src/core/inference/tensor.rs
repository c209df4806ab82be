//! Tensors crossing the [`InferenceEngine`](super::InferenceEngine) seam.

use crate::core::errors::{OCRError, OcrResult};
use ndarray::{Array2, Array3, Array4};

/// A borrowed model input.
#[derive(Debug)]
pub enum TensorInput<'a> {
    /// NCHW image batch.
    Array4(&'a Array4<f32>),
    /// Integer shape hint, e.g. `[[height, width]]`.
    Array2I64(&'a Array2<i64>),
}

impl TensorInput<'_> {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            TensorInput::Array4(t) => t.shape().to_vec(),
            TensorInput::Array2I64(t) => t.shape().to_vec(),
        }
    }
}

/// An owned model output, flattened in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorOutput {
    F32 { shape: Vec<i64>, data: Vec<f32> },
    /// Class ids are exported as `int64` by some detectors.
    I64 { shape: Vec<i64>, data: Vec<i64> },
}

impl TensorOutput {
    /// Dimensions with negative (dynamic) entries clamped to zero.
    pub fn dims(&self) -> Vec<usize> {
        let shape = match self {
            TensorOutput::F32 { shape, .. } | TensorOutput::I64 { shape, .. } => shape,
        };
        shape.iter().map(|&d| d.max(0) as usize).collect()
    }

    /// Flattens to `f32`, converting integer outputs.
    pub fn into_f32_values(self) -> Vec<f32> {
        match self {
            TensorOutput::F32 { data, .. } => data,
            TensorOutput::I64 { data, .. } => data.into_iter().map(|v| v as f32).collect(),
        }
    }

    /// Reshapes a recognizer output into `[batch, time, vocab]` logits.
    pub fn into_logits(self) -> OcrResult<Array3<f32>> {
        let dims = self.dims();
        let [batch, steps, vocab] = dims[..] else {
            return Err(OCRError::post_processing(format!(
                "recognizer logits must be 3D, got shape {dims:?}"
            )));
        };
        let TensorOutput::F32 { data, .. } = self else {
            return Err(OCRError::post_processing("recognizer logits must be f32"));
        };
        Ok(Array3::from_shape_vec((batch, steps, vocab), data)?)
    }
}

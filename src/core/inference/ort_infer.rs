//! ONNX Runtime implementation of the inference-engine seam.

use super::engine::{EngineFactory, InferenceEngine};
use super::session::load_session_from_memory;
use super::tensor::{TensorInput, TensorOutput};
use crate::core::errors::{OCRError, OcrResult};
use ort::session::{Session, SessionInputValue, SessionInputs};
use ort::value::TensorRef;
use std::borrow::Cow;

/// A single ONNX Runtime session bound to one model.
pub struct OrtInfer {
    session: Session,
    model_name: String,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("model_name", &self.model_name)
            .field("input_names", &self.input_names)
            .field("output_names", &self.output_names)
            .finish()
    }
}

impl OrtInfer {
    /// Creates a session from serialized model bytes.
    pub fn from_memory(
        model_name: &str,
        model_bytes: &[u8],
        intra_threads: Option<usize>,
    ) -> OcrResult<Self> {
        let session = load_session_from_memory(model_name, model_bytes, intra_threads)?;
        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();
        Ok(Self {
            session,
            model_name: model_name.to_string(),
            input_names,
            output_names,
        })
    }

    fn to_session_value<'a>(
        &self,
        name: &str,
        input: &TensorInput<'a>,
    ) -> OcrResult<SessionInputValue<'a>> {
        let value: SessionInputValue<'a> = match input {
            TensorInput::Array4(arr) => TensorRef::from_array_view(arr.view())
                .map_err(|e| {
                    OCRError::inference_with_source(
                        &self.model_name,
                        format!("failed to bind input '{name}'"),
                        e,
                    )
                })?
                .into(),
            TensorInput::Array2I64(arr) => TensorRef::from_array_view(arr.view())
                .map_err(|e| {
                    OCRError::inference_with_source(
                        &self.model_name,
                        format!("failed to bind input '{name}'"),
                        e,
                    )
                })?
                .into(),
        };
        Ok(value)
    }
}

impl InferenceEngine for OrtInfer {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    fn infer(
        &mut self,
        inputs: &[(&str, TensorInput<'_>)],
    ) -> OcrResult<Vec<(String, TensorOutput)>> {
        if inputs.is_empty() {
            return Err(OCRError::invalid_input("No inputs provided for inference"));
        }

        let mut values = Vec::with_capacity(inputs.len());
        for (name, input) in inputs {
            values.push((Cow::Borrowed(*name), self.to_session_value(name, input)?));
        }

        let input_shape = inputs[0].1.shape();
        let ort_inputs: SessionInputs<'_, '_, 0> = SessionInputs::ValueMap(values);
        let outputs = self.session.run(ort_inputs).map_err(|e| {
            OCRError::inference_with_source(
                &self.model_name,
                format!("forward pass failed (input shape {input_shape:?})"),
                e,
            )
        })?;

        let mut results = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let value = &outputs[name.as_str()];

            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                TensorOutput::F32 {
                    shape: shape.iter().copied().collect(),
                    data: data.to_vec(),
                }
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
                TensorOutput::I64 {
                    shape: shape.iter().copied().collect(),
                    data: data.to_vec(),
                }
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
                TensorOutput::I64 {
                    shape: shape.iter().copied().collect(),
                    data: data.iter().map(|&v| v as i64).collect(),
                }
            } else {
                return Err(OCRError::inference(
                    &self.model_name,
                    format!("unsupported element type for output '{name}'"),
                ));
            };

            results.push((name.clone(), tensor));
        }

        Ok(results)
    }
}

/// Builds [`OrtInfer`] engines.
#[derive(Debug, Clone, Default)]
pub struct OrtEngineFactory {
    intra_threads: Option<usize>,
}

impl OrtEngineFactory {
    /// Creates a factory using ONNX Runtime's default threading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the intra-op thread count of every session this factory builds.
    pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
        self.intra_threads = threads;
        self
    }
}

impl EngineFactory for OrtEngineFactory {
    fn create(&self, model_name: &str, model_bytes: &[u8]) -> OcrResult<Box<dyn InferenceEngine>> {
        let engine = OrtInfer::from_memory(model_name, model_bytes, self.intra_threads)?;
        Ok(Box::new(engine))
    }
}

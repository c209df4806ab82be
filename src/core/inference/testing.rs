//! Scripted engines for unit tests.

use super::engine::{EngineFactory, InferenceEngine};
use super::tensor::{TensorInput, TensorOutput};
use crate::core::errors::{OCRError, OcrResult};
use std::sync::{Arc, Mutex};

type Responder =
    Box<dyn FnMut(&[(&str, TensorInput<'_>)]) -> OcrResult<Vec<(String, TensorOutput)>> + Send>;

/// An engine whose outputs come from a closure.
pub struct ScriptedEngine {
    name: String,
    inputs: Vec<String>,
    respond: Responder,
}

impl ScriptedEngine {
    pub fn new(
        name: &str,
        inputs: &[&str],
        respond: impl FnMut(&[(&str, TensorInput<'_>)]) -> OcrResult<Vec<(String, TensorOutput)>>
        + Send
        + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            respond: Box::new(respond),
        }
    }

    /// An engine that always fails.
    pub fn failing(name: &str) -> Self {
        let model = name.to_string();
        Self::new(name, &["x"], move |_| {
            Err(OCRError::inference(model.clone(), "scripted failure"))
        })
    }
}

impl InferenceEngine for ScriptedEngine {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn infer(
        &mut self,
        inputs: &[(&str, TensorInput<'_>)],
    ) -> OcrResult<Vec<(String, TensorOutput)>> {
        (self.respond)(inputs)
    }
}

/// A recognizer engine emitting one-hot logits for a fixed index sequence.
pub fn fixed_logits_engine(name: &str, indices: Vec<usize>, vocab_size: usize) -> ScriptedEngine {
    ScriptedEngine::new(name, &["x"], move |_| {
        let mut data = vec![0.0f32; indices.len() * vocab_size];
        for (t, &i) in indices.iter().enumerate() {
            data[t * vocab_size + i] = 1.0;
        }
        Ok(vec![(
            "logits".to_string(),
            TensorOutput::F32 {
                shape: vec![1, indices.len() as i64, vocab_size as i64],
                data,
            },
        )])
    })
}

/// A factory that builds engines with a closure and records every model it was asked for.
#[derive(Clone)]
pub struct ScriptedFactory {
    build: Arc<dyn Fn(&str, &[u8]) -> OcrResult<Box<dyn InferenceEngine>> + Send + Sync>,
    pub created: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFactory {
    pub fn new(
        build: impl Fn(&str, &[u8]) -> OcrResult<Box<dyn InferenceEngine>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            build: Arc::new(build),
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(&self, model_name: &str, model_bytes: &[u8]) -> OcrResult<Box<dyn InferenceEngine>> {
        if let Ok(mut created) = self.created.lock() {
            created.push(model_name.to_string());
        }
        (self.build)(model_name, model_bytes)
    }
}

//! Helpers for working directly with ONNX Runtime sessions.

use crate::core::errors::OCRError;
use ort::logging::LogLevel;
use ort::session::Session;

const SESSION_CREATION_FAILURE: &str = "failed to create ONNX session";

/// Builds a session from serialized model bytes.
///
/// `intra_threads` caps the intra-op thread pool. `None` keeps the runtime
/// default.
pub fn load_session_from_memory(
    model_name: &str,
    model_bytes: &[u8],
    intra_threads: Option<usize>,
) -> Result<Session, OCRError> {
    let mut builder = Session::builder()?.with_log_level(LogLevel::Error)?;
    if let Some(threads) = intra_threads {
        builder = builder.with_intra_threads(threads)?;
    }
    builder
        .commit_from_memory(model_bytes)
        .map_err(|e| OCRError::inference_with_source(model_name, SESSION_CREATION_FAILURE, e))
}

//! Messages exchanged with the pipeline and with recognition workers.
//!
//! Each direction is a closed enum so a new message kind has to be handled
//! by every `match` over it.

use super::state::PipelineStage;
use crate::cache::DownloadProgress;
use crate::core::errors::FailureKind;
use crate::domain::{RecognitionJob, RecognitionOutput, TextBlock};
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Requests sent to a recognition worker.
#[derive(Debug)]
pub enum RecRequest {
    /// Build the worker's recognizer cascade.
    Init,
    /// Recognize `jobs` in order. The crops move into the worker.
    Process { batch: u64, jobs: Vec<RecognitionJob> },
    /// Stop after the current request.
    Terminate,
}

/// Events sent back by recognition workers, tagged with the worker index.
#[derive(Debug, Clone, PartialEq)]
pub enum RecEvent {
    Ready {
        worker: usize,
    },
    Progress {
        worker: usize,
        batch: u64,
        fraction: f32,
    },
    Complete {
        worker: usize,
        batch: u64,
        results: Vec<RecognitionOutput>,
    },
    /// `batch` is `None` for failures outside a batch, such as initialisation.
    Error {
        worker: usize,
        batch: Option<u64>,
        message: String,
    },
}

/// Requests sent to an [`OcrWorker`](super::OcrWorker).
#[derive(Debug)]
pub enum PipelineRequest {
    /// Load every model and start the recognition workers.
    Initialize,
    /// Run one page. The page is shared so the caller keeps it for display.
    Process {
        id: u64,
        image: Arc<RgbImage>,
        start_time: Instant,
    },
    /// Shut down; requests queued after this one are ignored.
    Terminate,
}

/// The outcome of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub id: u64,
    /// Blocks in reading order, including blocks with empty text.
    pub blocks: Vec<TextBlock>,
    /// Non-empty block texts in reading order, one per line.
    pub full_text: String,
    pub elapsed_ms: u64,
}

/// Events emitted by the pipeline.
///
/// All progress events of a page precede its `Complete` or `Error` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress {
        /// Page id; `None` while loading models.
        id: Option<u64>,
        stage: PipelineStage,
        progress: f32,
        message: String,
        /// Per-model download progress, only while loading models.
        downloads: Option<DownloadProgress>,
    },
    /// Models are loaded and recognition workers are up.
    Ready,
    Complete(PageResult),
    Error {
        id: Option<u64>,
        kind: FailureKind,
        message: String,
    },
}

impl PipelineEvent {
    /// The page this event belongs to, if any.
    pub fn page_id(&self) -> Option<u64> {
        match self {
            PipelineEvent::Progress { id, .. } | PipelineEvent::Error { id, .. } => *id,
            PipelineEvent::Complete(result) => Some(result.id),
            PipelineEvent::Ready => None,
        }
    }

    /// Returns true for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Complete(_) | PipelineEvent::Error { .. })
    }
}

/// Receives pipeline events.
pub trait EventSink {
    fn emit(&mut self, event: PipelineEvent);
}

impl EventSink for Vec<PipelineEvent> {
    fn emit(&mut self, event: PipelineEvent) {
        self.push(event);
    }
}

impl EventSink for crossbeam_channel::Sender<PipelineEvent> {
    fn emit(&mut self, event: PipelineEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: PipelineEvent) {}
}

//! The OCR pipeline.
//!
//! [`OcrPipeline`] runs one page at a time through layout detection,
//! parallel recognition on a [`RecognitionPool`] and reading-order assembly,
//! tracking its progress in a [`PipelineJobState`]. [`OcrWorker`] hosts a
//! pipeline on its own thread and speaks the [`PipelineRequest`] /
//! [`PipelineEvent`] protocol.

pub mod orchestration;
pub mod protocol;
pub mod state;
pub mod worker;
pub mod worker_pool;

pub use orchestration::{OcrPipeline, assemble_full_text};
pub use protocol::{
    EventSink, NullSink, PageResult, PipelineEvent, PipelineRequest, RecEvent, RecRequest,
};
pub use state::{PipelineJobState, PipelineStage, PipelineStatus};
pub use worker::OcrWorker;
pub use worker_pool::{RecognitionBackend, RecognitionPool, partition_round_robin, realign};

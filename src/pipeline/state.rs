//! Per-job pipeline state.

use crate::cache::DownloadProgress;
use crate::core::errors::{OCRError, OcrResult};
use serde::Serialize;

/// Coarse pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    LoadingModel,
    Processing,
    Done,
    Error,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::LoadingModel => "loading_model",
            PipelineStatus::Processing => "processing",
            PipelineStatus::Done => "done",
            PipelineStatus::Error => "error",
        }
    }

    /// `done` and `error` end a job.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStatus::Done | PipelineStatus::Error)
    }

    /// Returns true if `self -> next` is an allowed transition.
    ///
    /// `error` is reachable from anywhere. Leaving a terminal state requires
    /// [`PipelineJobState::reset`].
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        matches!(
            (self, next),
            (_, Error)
                | (Idle, LoadingModel)
                | (Idle, Processing)
                | (LoadingModel, Idle)
                | (LoadingModel, Processing)
                | (Processing, Done)
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-phase reported with progress. Ordered as executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ModelLoading,
    LayoutDetection,
    TextRecognition,
    ReadingOrder,
    GeneratingOutput,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::ModelLoading => "model_loading",
            PipelineStage::LayoutDetection => "layout_detection",
            PipelineStage::TextRecognition => "text_recognition",
            PipelineStage::ReadingOrder => "reading_order",
            PipelineStage::GeneratingOutput => "generating_output",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status, stage and progress of the job currently running.
///
/// Progress within a stage never decreases; entering a later stage restarts
/// it at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineJobState {
    status: PipelineStatus,
    stage: Option<PipelineStage>,
    stage_progress: f32,
    downloads: DownloadProgress,
    error: Option<String>,
}

impl Default for PipelineJobState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineJobState {
    pub fn new() -> Self {
        Self {
            status: PipelineStatus::Idle,
            stage: None,
            stage_progress: 0.0,
            downloads: DownloadProgress::new(),
            error: None,
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn stage(&self) -> Option<PipelineStage> {
        self.stage
    }

    pub fn stage_progress(&self) -> f32 {
        self.stage_progress
    }

    /// Per-model download progress recorded while loading.
    pub fn downloads(&self) -> &DownloadProgress {
        &self.downloads
    }

    /// Message of the failure that moved the job to `error`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Discards the current job and returns to `idle`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Moves to `next`, failing with [`OCRError::InvalidStateTransition`]
    /// when the transition is not allowed.
    pub fn transition(&mut self, next: PipelineStatus) -> OcrResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(OCRError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        match next {
            PipelineStatus::LoadingModel => {
                self.stage = Some(PipelineStage::ModelLoading);
                self.stage_progress = 0.0;
            }
            PipelineStatus::Idle | PipelineStatus::Processing => {
                self.stage = None;
                self.stage_progress = 0.0;
            }
            PipelineStatus::Done => self.stage_progress = 1.0,
            PipelineStatus::Error => {}
        }
        Ok(())
    }

    /// Moves to `error`, recording `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = PipelineStatus::Error;
        self.error = Some(message.into());
    }

    /// Enters a processing stage.
    ///
    /// Only `processing` has stages besides model loading, and stages cannot
    /// be revisited within one job.
    pub fn enter_stage(&mut self, stage: PipelineStage) -> OcrResult<()> {
        let allowed = match self.status {
            PipelineStatus::LoadingModel => stage == PipelineStage::ModelLoading,
            PipelineStatus::Processing => {
                stage != PipelineStage::ModelLoading && self.stage.is_none_or(|s| s < stage)
            }
            _ => false,
        };
        if !allowed {
            return Err(OCRError::InvalidStateTransition {
                from: format!(
                    "{}/{}",
                    self.status,
                    self.stage.map_or("none", PipelineStage::as_str)
                ),
                to: stage.to_string(),
            });
        }
        self.stage = Some(stage);
        self.stage_progress = 0.0;
        Ok(())
    }

    /// Records progress for the active stage and returns the stored value.
    ///
    /// Values are clamped to `[0, 1]` and never go below what was already recorded.
    pub fn set_progress(&mut self, progress: f32) -> f32 {
        if progress.is_finite() {
            self.stage_progress = self.stage_progress.max(progress.clamp(0.0, 1.0));
        }
        self.stage_progress
    }

    /// Records per-model download progress and updates stage progress with
    /// the mean over all models.
    pub fn record_downloads(&mut self, downloads: &DownloadProgress) -> f32 {
        self.downloads = downloads.clone();
        if downloads.is_empty() {
            return self.stage_progress;
        }
        let mean = downloads.values().sum::<f32>() / downloads.len() as f32;
        self.set_progress(mean)
    }
}

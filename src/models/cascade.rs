//! The per-worker recognition context: three recognizers of increasing width.

use super::recognition::{RecognizerTier, TextRecognizer};
use crate::core::config::RecognizerConfig;
use crate::core::errors::OcrResult;
use crate::core::inference::{EngineFactory, InferenceEngine};
use crate::domain::{CharCountCategory, RecognitionJob, RecognitionOutput};
use tracing::debug;

/// Owns one [`TextRecognizer`] per tier and routes crops by character-count category.
///
/// Every recognition worker builds its own cascade at startup, so sessions are
/// never shared between threads.
#[derive(Debug)]
pub struct RecognizerCascade {
    narrow: TextRecognizer,
    medium: TextRecognizer,
    wide: TextRecognizer,
}

impl RecognizerCascade {
    /// Builds the three recognizers one after another from their model bytes,
    /// given narrowest first.
    pub fn build(
        factory: &dyn EngineFactory,
        models: [&[u8]; 3],
        config: &RecognizerConfig,
    ) -> OcrResult<Self> {
        let create = |tier: RecognizerTier| -> OcrResult<TextRecognizer> {
            let engine = factory.create(tier.artifact().name(), models[tier.index()])?;
            debug!("Initialized {:?} recognizer", tier);
            TextRecognizer::new(tier, engine, config)
        };
        Ok(Self {
            narrow: create(RecognizerTier::Narrow)?,
            medium: create(RecognizerTier::Medium)?,
            wide: create(RecognizerTier::Wide)?,
        })
    }

    /// Builds a cascade around already-loaded engines, given narrowest first.
    pub fn from_engines(
        engines: [Box<dyn InferenceEngine>; 3],
        config: &RecognizerConfig,
    ) -> OcrResult<Self> {
        let [narrow, medium, wide] = engines;
        Ok(Self {
            narrow: TextRecognizer::new(RecognizerTier::Narrow, narrow, config)?,
            medium: TextRecognizer::new(RecognizerTier::Medium, medium, config)?,
            wide: TextRecognizer::new(RecognizerTier::Wide, wide, config)?,
        })
    }

    /// The recognizer serving a category.
    pub fn select(&mut self, category: CharCountCategory) -> &mut TextRecognizer {
        match RecognizerTier::for_category(category) {
            RecognizerTier::Narrow => &mut self.narrow,
            RecognizerTier::Medium => &mut self.medium,
            RecognizerTier::Wide => &mut self.wide,
        }
    }

    /// Recognizes one job. Failures yield empty text for that job only.
    pub fn recognize(&mut self, job: &RecognitionJob) -> RecognitionOutput {
        let (text, confidence) = self.select(job.category).recognize(&job.image);
        RecognitionOutput::new(job.id, text, confidence)
    }

    /// Recognizes jobs in the order given, reporting the completed fraction after each.
    pub fn process_jobs(
        &mut self,
        jobs: Vec<RecognitionJob>,
        mut on_progress: impl FnMut(f32),
    ) -> Vec<RecognitionOutput> {
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);
        for (done, job) in jobs.into_iter().enumerate() {
            results.push(self.recognize(&job));
            on_progress((done + 1) as f32 / total as f32);
        }
        results
    }
}

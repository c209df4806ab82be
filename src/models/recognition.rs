//! Fixed-width text-line recognizer.

use crate::core::config::{ModelArtifact, RecognizerConfig};
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::{InferenceEngine, TensorInput};
use crate::domain::CharCountCategory;
use crate::processors::{GreedyDecoder, NormalizeImage};
use image::{RgbImage, imageops};
use ndarray::{Array4, Axis};
use tracing::warn;

/// The three recognizer sizes of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerTier {
    /// Up to 30 characters.
    Narrow,
    /// Up to 50 characters.
    Medium,
    /// Up to 100 characters.
    Wide,
}

impl RecognizerTier {
    /// All tiers, narrowest first.
    pub const ALL: [RecognizerTier; 3] = [
        RecognizerTier::Narrow,
        RecognizerTier::Medium,
        RecognizerTier::Wide,
    ];

    /// Picks the tier for a character-count category.
    pub fn for_category(category: CharCountCategory) -> Self {
        match category {
            CharCountCategory::Short => RecognizerTier::Narrow,
            CharCountCategory::Medium => RecognizerTier::Medium,
            CharCountCategory::Long => RecognizerTier::Wide,
        }
    }

    /// Position in [`RecognizerTier::ALL`] and in per-tier config arrays.
    pub fn index(self) -> usize {
        match self {
            RecognizerTier::Narrow => 0,
            RecognizerTier::Medium => 1,
            RecognizerTier::Wide => 2,
        }
    }

    /// The model artifact backing this tier.
    pub fn artifact(self) -> ModelArtifact {
        match self {
            RecognizerTier::Narrow => ModelArtifact::Recognition30,
            RecognizerTier::Medium => ModelArtifact::Recognition50,
            RecognizerTier::Wide => ModelArtifact::Recognition100,
        }
    }
}

/// Recognizes the text of one cropped line at a fixed input size.
pub struct TextRecognizer {
    tier: RecognizerTier,
    input_width: u32,
    input_height: u32,
    normalizer: NormalizeImage,
    decoder: GreedyDecoder,
    engine: Box<dyn InferenceEngine>,
}

impl std::fmt::Debug for TextRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRecognizer")
            .field("tier", &self.tier)
            .field("input_width", &self.input_width)
            .field("input_height", &self.input_height)
            .field("model", &self.engine.model_name())
            .finish()
    }
}

impl TextRecognizer {
    /// Creates a recognizer for `tier` around a loaded engine.
    pub fn new(
        tier: RecognizerTier,
        engine: Box<dyn InferenceEngine>,
        config: &RecognizerConfig,
    ) -> OcrResult<Self> {
        Ok(Self {
            tier,
            input_width: config.input_widths[tier.index()],
            input_height: config.input_height,
            normalizer: NormalizeImage::for_ocr_recognition()?,
            decoder: GreedyDecoder::new(config.vocabulary(), config.max_length),
            engine,
        })
    }

    /// The tier this recognizer serves.
    pub fn tier(&self) -> RecognizerTier {
        self.tier
    }

    /// Recognizes a crop, returning empty text with zero confidence on failure.
    pub fn recognize(&mut self, image: &RgbImage) -> (String, f32) {
        match self.try_recognize(image) {
            Ok(result) => result,
            Err(e) => {
                warn!("Recognition failed on {:?} recognizer: {e}", self.tier);
                (String::new(), 0.0)
            }
        }
    }

    /// Recognizes a crop.
    ///
    /// Portrait crops are rotated 90° counter-clockwise first so vertical
    /// lines read as horizontal rows.
    pub fn try_recognize(&mut self, image: &RgbImage) -> OcrResult<(String, f32)> {
        let input = self.preprocess(image)?;
        let input_name = self
            .engine
            .input_names()
            .into_iter()
            .next()
            .unwrap_or_else(|| "x".to_string());

        let outputs = self
            .engine
            .infer(&[(input_name.as_str(), TensorInput::Array4(&input))])?;
        let (_, logits) = outputs.into_iter().next().ok_or_else(|| {
            OCRError::inference(self.engine.model_name(), "model produced no outputs")
        })?;

        let logits = logits.into_logits()?;
        if logits.shape()[0] == 0 {
            return Err(OCRError::post_processing("logits have an empty batch axis"));
        }
        self.decoder.decode_logits(logits.index_axis(Axis(0), 0))
    }

    fn preprocess(&self, image: &RgbImage) -> OcrResult<Array4<f32>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OCRError::preprocessing("crop has zero width or height"));
        }

        let upright;
        let source = if height > width {
            upright = imageops::rotate270(image);
            &upright
        } else {
            image
        };

        let resized = imageops::resize(
            source,
            self.input_width,
            self.input_height,
            imageops::FilterType::Triangle,
        );
        Ok(self.normalizer.to_tensor(&resized))
    }
}

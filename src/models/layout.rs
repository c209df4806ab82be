//! Text-line layout detector.
//!
//! The detector letterboxes the page into a square anchored at the top-left,
//! resizes it to the model resolution and runs a DETR-style model that emits
//! class ids, corner boxes, scores and an optional character-count category
//! per detection. Detections are filtered to text-line classes, mapped back to
//! page coordinates, slightly expanded vertically and suppressed with greedy NMS.

use crate::core::config::LayoutConfig;
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::{EngineFactory, InferenceEngine, TensorInput, TensorOutput};
use crate::domain::{BoundingBox, CharCountCategory, TextRegion};
use crate::processors::{LetterboxInfo, NormalizeImage, letterbox, non_max_suppression};
use image::RgbImage;
use ndarray::{Array2, Array4};
use tracing::{debug, warn};

/// Raw detector outputs, flattened per detection.
struct RawDetections {
    class_ids: Vec<f32>,
    boxes: Vec<f32>,
    scores: Vec<f32>,
    char_counts: Option<Vec<f32>>,
}

impl RawDetections {
    fn from_outputs(outputs: Vec<(String, TensorOutput)>) -> OcrResult<Self> {
        let mut tensors = outputs.into_iter().map(|(_, t)| t.into_f32_values());
        let (Some(class_ids), Some(boxes), Some(scores)) =
            (tensors.next(), tensors.next(), tensors.next())
        else {
            return Err(OCRError::post_processing(
                "layout model must emit class ids, boxes and scores",
            ));
        };
        let char_counts = tensors.next();

        if class_ids.len() != scores.len() || boxes.len() < scores.len() * 4 {
            return Err(OCRError::post_processing(format!(
                "inconsistent layout outputs: {} class ids, {} box values, {} scores",
                class_ids.len(),
                boxes.len(),
                scores.len()
            )));
        }

        Ok(Self {
            class_ids,
            boxes,
            scores,
            char_counts,
        })
    }
}

/// Detects text-line regions on a page.
pub struct LayoutDetector {
    config: LayoutConfig,
    normalizer: NormalizeImage,
    engine: Option<Box<dyn InferenceEngine>>,
}

impl std::fmt::Debug for LayoutDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutDetector")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl LayoutDetector {
    /// Creates an uninitialized detector.
    pub fn new(config: LayoutConfig) -> OcrResult<Self> {
        let normalizer = NormalizeImage::for_layout(config.mean, config.std)?;
        Ok(Self {
            config,
            normalizer,
            engine: None,
        })
    }

    /// Creates a detector around an existing engine.
    pub fn with_engine(config: LayoutConfig, engine: Box<dyn InferenceEngine>) -> OcrResult<Self> {
        let mut detector = Self::new(config)?;
        detector.engine = Some(engine);
        Ok(detector)
    }

    /// Returns true once a model session is held.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Builds the model session. Calling this again once initialized does nothing.
    pub fn initialize(&mut self, factory: &dyn EngineFactory, model_bytes: &[u8]) -> OcrResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.engine = Some(factory.create("layout", model_bytes)?);
        debug!("Layout detector initialized");
        Ok(())
    }

    /// The detector configuration.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Detects text-line regions.
    ///
    /// Regions are returned in suppression order (confidence descending), not
    /// reading order. A malformed model output yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector is not initialized or inference fails.
    pub fn detect(&mut self, image: &RgbImage) -> OcrResult<Vec<TextRegion>> {
        let (input, shape_hint, info) = self.preprocess(image)?;
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| OCRError::not_initialized("layout detector"))?;

        let input_names = engine.input_names();
        let image_input = input_names.first().map(String::as_str).unwrap_or("images");
        let mut inputs = vec![(image_input, TensorInput::Array4(&input))];
        if let Some(hint_input) = input_names.get(1) {
            inputs.push((hint_input.as_str(), TensorInput::Array2I64(&shape_hint)));
        }

        let outputs = engine.infer(&inputs)?;

        match self.postprocess(outputs, &info) {
            Ok(regions) => {
                debug!("Layout detection kept {} regions", regions.len());
                Ok(regions)
            }
            Err(e) => {
                warn!("Layout postprocessing failed, treating page as empty: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn preprocess(&self, image: &RgbImage) -> OcrResult<(Array4<f32>, Array2<i64>, LetterboxInfo)> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OCRError::invalid_input("image has zero width or height"));
        }
        let (input_height, input_width) = self.config.input_shape;
        let (resized, info) = letterbox(image, input_width, input_height);
        let tensor = self.normalizer.to_tensor(&resized);
        let shape_hint =
            Array2::from_shape_vec((1, 2), vec![input_height as i64, input_width as i64])?;
        Ok((tensor, shape_hint, info))
    }

    fn postprocess(
        &self,
        outputs: Vec<(String, TensorOutput)>,
        info: &LetterboxInfo,
    ) -> OcrResult<Vec<TextRegion>> {
        let raw = RawDetections::from_outputs(outputs)?;
        let mut regions = Vec::new();

        for (i, &score) in raw.scores.iter().enumerate() {
            if !score.is_finite() || score < self.config.score_threshold {
                continue;
            }

            let raw_class = raw.class_ids[i].round() as i64;
            if raw_class < 1 {
                continue;
            }
            let class_id = (raw_class - 1) as usize;
            if !self.config.is_text_line_class(class_id) {
                continue;
            }

            let b = &raw.boxes[i * 4..i * 4 + 4];
            let (x1, y1) = info.to_original(b[0], b[1]);
            let (x2, y2) = info.to_original(b[2], b[3]);
            let expand = (y2 - y1).abs() * self.config.vertical_expand_ratio;
            let Some(bbox) = BoundingBox::from_corners_clamped(
                x1,
                y1.min(y2) - expand,
                x2,
                y1.max(y2) + expand,
                info.orig_width,
                info.orig_height,
            ) else {
                continue;
            };
            if bbox.width < self.config.min_box_side || bbox.height < self.config.min_box_side {
                continue;
            }

            let category = raw
                .char_counts
                .as_ref()
                .and_then(|c| c.get(i))
                .map(|&v| CharCountCategory::from_raw(v.round() as i64))
                .unwrap_or_default();

            regions.push(TextRegion::new(bbox, score, class_id, category));
        }

        Ok(non_max_suppression(regions, self.config.nms_threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::testing::{ScriptedEngine, ScriptedFactory};
    use std::sync::{Arc, Mutex};

    fn f32_out(name: &str, shape: Vec<i64>, data: Vec<f32>) -> (String, TensorOutput) {
        (name.to_string(), TensorOutput::F32 { shape, data })
    }

    /// Detections as (class_id 1-indexed, [x1, y1, x2, y2] in 800x800 space, score, category).
    fn detector_with(
        detections: Vec<(i64, [f32; 4], f32, i64)>,
        with_categories: bool,
    ) -> LayoutDetector {
        let engine = ScriptedEngine::new("layout", &["images"], move |_| {
            let n = detections.len() as i64;
            let classes = (
                "labels".to_string(),
                TensorOutput::I64 {
                    shape: vec![1, n],
                    data: detections.iter().map(|d| d.0).collect(),
                },
            );
            let boxes = f32_out(
                "boxes",
                vec![1, n, 4],
                detections.iter().flat_map(|d| d.1).collect(),
            );
            let scores = f32_out("scores", vec![1, n], detections.iter().map(|d| d.2).collect());
            let mut out = vec![classes, boxes, scores];
            if with_categories {
                out.push((
                    "char_count".to_string(),
                    TensorOutput::I64 {
                        shape: vec![1, n],
                        data: detections.iter().map(|d| d.3).collect(),
                    },
                ));
            }
            Ok(out)
        });
        LayoutDetector::with_engine(LayoutConfig::default(), Box::new(engine)).unwrap()
    }

    #[test]
    fn test_detect_requires_initialization() {
        let mut detector = LayoutDetector::new(LayoutConfig::default()).unwrap();
        let err = detector.detect(&RgbImage::new(10, 10)).unwrap_err();
        assert!(matches!(err, OCRError::NotInitialized { .. }));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let factory = ScriptedFactory::new(|name, _| {
            Ok(Box::new(ScriptedEngine::failing(name)) as Box<dyn InferenceEngine>)
        });
        let mut detector = LayoutDetector::new(LayoutConfig::default()).unwrap();
        detector.initialize(&factory, b"model").unwrap();
        detector.initialize(&factory, b"model").unwrap();
        assert!(detector.is_initialized());
        assert_eq!(factory.created.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_filters_scales_and_expands() {
        let mut detector = detector_with(
            vec![
                // Kept: class 2 -> 1 (text line), scaled by 1600/800 = 2.
                (2, [100.0, 100.0, 150.0, 300.0], 0.9, 3),
                // Below score threshold.
                (2, [400.0, 100.0, 450.0, 300.0], 0.2, 1),
                // Class 1 -> 0 is a block, not a line.
                (1, [500.0, 100.0, 550.0, 300.0], 0.9, 1),
                // Too small once scaled: 4x4 -> 8x8.
                (2, [600.0, 100.0, 604.0, 104.0], 0.9, 1),
            ],
            true,
        );
        let image = RgbImage::new(1600, 1000);
        let regions = detector.detect(&image).unwrap();

        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.class_id, 1);
        assert_eq!(r.char_count_category, CharCountCategory::Short);
        // y: 200..600 expanded by 2% of 400 = 8 on each side.
        assert_eq!(r.bbox, BoundingBox::new(200, 192, 100, 416));
    }

    #[test]
    fn test_regions_are_clamped_to_image() {
        let mut detector = detector_with(vec![(2, [700.0, 0.0, 800.0, 790.0], 0.8, 1)], false);
        let image = RgbImage::new(800, 600);
        let regions = detector.detect(&image).unwrap();

        assert_eq!(regions.len(), 1);
        assert!(regions[0].bbox.fits_within(800, 600));
        assert_eq!(regions[0].bbox.y, 0);
        assert_eq!(regions[0].bbox.bottom(), 600);
        assert_eq!(regions[0].char_count_category, CharCountCategory::Long);
    }

    #[test]
    fn test_overlaps_are_suppressed() {
        let mut detector = detector_with(
            vec![
                (2, [100.0, 100.0, 200.0, 400.0], 0.7, 1),
                (2, [102.0, 100.0, 202.0, 400.0], 0.95, 1),
            ],
            true,
        );
        let regions = detector.detect(&RgbImage::new(800, 800)).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].confidence, 0.95);
    }

    #[test]
    fn test_malformed_output_yields_empty_list() {
        let engine = ScriptedEngine::new("layout", &["images"], |_| {
            Ok(vec![f32_out("labels", vec![1, 2], vec![2.0, 2.0])])
        });
        let mut detector =
            LayoutDetector::with_engine(LayoutConfig::default(), Box::new(engine)).unwrap();
        assert!(detector.detect(&RgbImage::new(100, 100)).unwrap().is_empty());
    }

    #[test]
    fn test_shape_hint_sent_to_second_input() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let engine = ScriptedEngine::new("layout", &["images", "im_shape"], move |inputs| {
            let mut names = record.lock().unwrap();
            for (name, tensor) in inputs {
                names.push((name.to_string(), tensor.shape()));
            }
            Ok(vec![
                f32_out("labels", vec![1, 0], vec![]),
                f32_out("boxes", vec![1, 0, 4], vec![]),
                f32_out("scores", vec![1, 0], vec![]),
            ])
        });
        let mut detector =
            LayoutDetector::with_engine(LayoutConfig::default(), Box::new(engine)).unwrap();
        assert!(detector.detect(&RgbImage::new(64, 32)).unwrap().is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("images".to_string(), vec![1, 3, 800, 800]),
                ("im_shape".to_string(), vec![1, 2]),
            ]
        );
    }
}

//! The page pipeline: layout detection, recognition and reading order.

use super::protocol::{EventSink, PageResult, PipelineEvent};
use super::state::{PipelineJobState, PipelineStage, PipelineStatus};
use super::worker_pool::{RecognitionBackend, realign};
use crate::cache::ModelLoader;
use crate::core::config::{ConfigValidator, PipelineConfig};
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::{EngineFactory, OrtEngineFactory};
use crate::domain::TextBlock;
use crate::models::LayoutDetector;
use crate::processors::{ReadingOrderAssembler, crop_regions};
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

fn progress_event(id: Option<u64>, stage: PipelineStage, progress: f32, message: impl Into<String>) -> PipelineEvent {
    PipelineEvent::Progress {
        id,
        stage,
        progress,
        message: message.into(),
        downloads: None,
    }
}

/// Joins the non-empty block texts, in order, one per line.
pub fn assemble_full_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drives pages through layout detection, recognition and reading-order assembly.
///
/// Pages are processed one at a time. Recognition of one page's regions is
/// the only step that runs in parallel.
///
/// # Example
///
/// ```rust,no_run
/// use cascade_ocr::pipeline::{NullSink, OcrPipeline};
/// use cascade_ocr::core::config::PipelineConfig;
/// use std::time::Instant;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut pipeline = OcrPipeline::from_config(PipelineConfig::default())?;
/// pipeline.initialize(&mut NullSink)?;
///
/// let page = image::open("page.png")?.to_rgb8();
/// let result = pipeline.process(0, &page, Instant::now(), &mut NullSink)?;
/// println!("{}", result.full_text);
/// # Ok(())
/// # }
/// ```
pub struct OcrPipeline {
    config: PipelineConfig,
    factory: Arc<dyn EngineFactory>,
    loader: ModelLoader,
    layout: LayoutDetector,
    recognition: Option<RecognitionBackend>,
    assembler: ReadingOrderAssembler,
    state: PipelineJobState,
}

impl std::fmt::Debug for OcrPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrPipeline")
            .field("loader", &self.loader)
            .field("layout", &self.layout)
            .field("recognition", &self.recognition)
            .field("state", &self.state)
            .finish()
    }
}

impl OcrPipeline {
    /// Creates an uninitialized pipeline.
    pub fn new(
        config: PipelineConfig,
        loader: ModelLoader,
        factory: Arc<dyn EngineFactory>,
    ) -> OcrResult<Self> {
        config.validate()?;
        let layout = LayoutDetector::new(config.layout.clone())?;
        let assembler = ReadingOrderAssembler::new(config.writing_direction);
        Ok(Self {
            config,
            factory,
            loader,
            layout,
            recognition: None,
            assembler,
            state: PipelineJobState::new(),
        })
    }

    /// Creates a pipeline backed by ONNX Runtime, loading models from the
    /// configured source through the filesystem cache.
    pub fn from_config(config: PipelineConfig) -> OcrResult<Self> {
        let loader = ModelLoader::from_config(config.source.clone())?;
        let factory = OrtEngineFactory::new()
            .with_intra_threads(config.parallel.onnx_threading.intra_threads);
        Self::new(config, loader, Arc::new(factory))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// State of the current or most recent job.
    pub fn state(&self) -> &PipelineJobState {
        &self.state
    }

    /// Returns true once every model is loaded.
    pub fn is_initialized(&self) -> bool {
        self.layout.is_initialized() && self.recognition.is_some()
    }

    /// Number of recognition workers, once initialized.
    pub fn recognition_workers(&self) -> Option<usize> {
        self.recognition.as_ref().map(RecognitionBackend::worker_count)
    }

    /// Loads the four models and starts the recognition workers.
    ///
    /// Emits download progress and then `Ready`. Does nothing if already
    /// initialized. On failure an `Error` event without page id is emitted.
    pub fn initialize(&mut self, sink: &mut dyn EventSink) -> OcrResult<()> {
        if self.is_initialized() {
            sink.emit(PipelineEvent::Ready);
            return Ok(());
        }
        self.state.reset();
        match self.load_models(sink) {
            Ok(()) => {
                sink.emit(PipelineEvent::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("Pipeline initialization failed: {e}");
                self.state.fail(e.to_string());
                sink.emit(PipelineEvent::Error {
                    id: None,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn load_models(&mut self, sink: &mut dyn EventSink) -> OcrResult<()> {
        self.state.transition(PipelineStatus::LoadingModel)?;

        let state = &mut self.state;
        let bundle = self.loader.load_all(|downloads| {
            let progress = state.record_downloads(downloads);
            sink.emit(PipelineEvent::Progress {
                id: None,
                stage: PipelineStage::ModelLoading,
                progress,
                message: "Loading models".to_string(),
                downloads: Some(downloads.clone()),
            });
        })?;

        self.layout.initialize(self.factory.as_ref(), &bundle.layout)?;
        let workers = self.config.parallel.resolved_worker_count();
        self.recognition = Some(RecognitionBackend::start(
            workers,
            Arc::clone(&self.factory),
            &bundle,
        )?);

        self.state.transition(PipelineStatus::Idle)?;
        info!("Pipeline ready with {workers} recognition worker(s)");
        Ok(())
    }

    /// Runs one page.
    ///
    /// Emits progress for each stage, then exactly one `Complete` or `Error`
    /// event for `id`. A failure reported by any recognition worker fails the
    /// page and no partial result is emitted.
    pub fn process(
        &mut self,
        id: u64,
        image: &RgbImage,
        start_time: Instant,
        sink: &mut dyn EventSink,
    ) -> OcrResult<PageResult> {
        self.state.reset();
        match self.run_page(id, image, start_time, sink) {
            Ok(result) => {
                info!(
                    "Page {id}: {} blocks in {} ms",
                    result.blocks.len(),
                    result.elapsed_ms
                );
                sink.emit(PipelineEvent::Complete(result.clone()));
                Ok(result)
            }
            Err(e) => {
                warn!("Page {id} failed: {e}");
                self.state.fail(e.to_string());
                sink.emit(PipelineEvent::Error {
                    id: Some(id),
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn begin_stage(
        &mut self,
        id: u64,
        stage: PipelineStage,
        message: &str,
        sink: &mut dyn EventSink,
    ) -> OcrResult<()> {
        self.state.enter_stage(stage)?;
        debug!("Page {id}: {stage}");
        sink.emit(progress_event(Some(id), stage, 0.0, message));
        Ok(())
    }

    fn finish_stage(&mut self, id: u64, message: String, sink: &mut dyn EventSink) {
        let progress = self.state.set_progress(1.0);
        if let Some(stage) = self.state.stage() {
            sink.emit(progress_event(Some(id), stage, progress, message));
        }
    }

    fn run_page(
        &mut self,
        id: u64,
        image: &RgbImage,
        start_time: Instant,
        sink: &mut dyn EventSink,
    ) -> OcrResult<PageResult> {
        if !self.is_initialized() {
            return Err(OCRError::not_initialized("OCR pipeline"));
        }
        self.state.transition(PipelineStatus::Processing)?;

        self.begin_stage(id, PipelineStage::LayoutDetection, "Detecting text lines", sink)?;
        let regions = self.layout.detect(image)?;
        self.finish_stage(id, format!("Found {} text lines", regions.len()), sink);

        self.begin_stage(id, PipelineStage::TextRecognition, "Recognizing text", sink)?;
        let region_count = regions.len();
        let jobs = crop_regions(image, &regions, self.config.parallel.crop_threshold);
        let recognition = self
            .recognition
            .as_mut()
            .ok_or_else(|| OCRError::not_initialized("recognizers"))?;
        let state = &mut self.state;
        let results = recognition.recognize(jobs, |fraction| {
            let progress = state.set_progress(fraction);
            sink.emit(progress_event(
                Some(id),
                PipelineStage::TextRecognition,
                progress,
                "Recognizing text",
            ));
        })?;
        let blocks: Vec<TextBlock> = regions
            .into_iter()
            .zip(realign(region_count, results))
            .map(|(region, output)| TextBlock::new(region, output.text, output.confidence))
            .collect();
        self.finish_stage(id, format!("Recognized {} text lines", blocks.len()), sink);

        self.begin_stage(id, PipelineStage::ReadingOrder, "Ordering text", sink)?;
        let blocks = self.assembler.process(blocks);
        self.finish_stage(id, "Reading order assigned".to_string(), sink);

        self.begin_stage(id, PipelineStage::GeneratingOutput, "Generating output", sink)?;
        let full_text = assemble_full_text(&blocks);
        self.state.transition(PipelineStatus::Done)?;

        Ok(PageResult {
            id,
            blocks,
            full_text,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Stops the recognition workers. The pipeline must be initialized again
    /// before the next page.
    pub fn shutdown(&mut self) {
        if let Some(mut recognition) = self.recognition.take() {
            recognition.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DirectoryArtifactSource, MemoryModelCache};
    use crate::core::config::{ModelSourceConfig, ParallelPolicy};
    use crate::core::errors::FailureKind;
    use crate::core::inference::testing::{ScriptedEngine, ScriptedFactory};
    use crate::core::inference::{InferenceEngine, TensorInput, TensorOutput};
    use crate::domain::WritingDirection;
    use crate::pipeline::protocol::NullSink;
    use image::Rgb;

    /// Writes placeholder model files and a recognizer config with a small charset.
    fn model_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let source = ModelSourceConfig::default();
        for artifact in crate::core::config::ModelArtifact::ALL {
            std::fs::write(dir.path().join(source.artifact_path(artifact)), b"onnx").unwrap();
        }
        std::fs::write(
            dir.path().join("recognition.json"),
            br#"{"charset": "abcdefghij"}"#,
        )
        .unwrap();
        dir
    }

    /// Layout engine reporting the given boxes (800x800 model space) as text lines.
    fn layout_engine(boxes: Vec<[f32; 4]>) -> ScriptedEngine {
        ScriptedEngine::new("layout", &["images"], move |_| {
            let n = boxes.len() as i64;
            Ok(vec![
                (
                    "labels".to_string(),
                    TensorOutput::I64 {
                        shape: vec![1, n],
                        data: vec![2; boxes.len()],
                    },
                ),
                (
                    "boxes".to_string(),
                    TensorOutput::F32 {
                        shape: vec![1, n, 4],
                        data: boxes.iter().flatten().copied().collect(),
                    },
                ),
                (
                    "scores".to_string(),
                    TensorOutput::F32 {
                        shape: vec![1, n],
                        data: vec![0.9; boxes.len()],
                    },
                ),
            ])
        })
    }

    /// Recognizer emitting the token for the gray level at the centre of its input.
    fn gray_reader(name: &str) -> ScriptedEngine {
        ScriptedEngine::new(name, &["x"], |inputs| {
            let TensorInput::Array4(t) = &inputs[0].1 else {
                return Err(OCRError::inference("reader", "unexpected input"));
            };
            let (h, w) = (t.shape()[2], t.shape()[3]);
            let value = ((t[[0, 0, h / 2, w / 2]] + 1.0) * 127.5).round() as usize;
            let mut data = vec![0.0f32; 16];
            data[value + 4] = 1.0;
            Ok(vec![(
                "logits".to_string(),
                TensorOutput::F32 {
                    shape: vec![1, 1, 16],
                    data,
                },
            )])
        })
    }

    fn pipeline(dir: &tempfile::TempDir, boxes: Vec<[f32; 4]>, workers: usize) -> OcrPipeline {
        let source = ModelSourceConfig::default().with_base(dir.path().display().to_string());
        let loader = ModelLoader::new(
            source.clone(),
            Arc::new(DirectoryArtifactSource::new(dir.path())),
            Arc::new(MemoryModelCache::new()),
        );
        let factory = ScriptedFactory::new(move |name, _| {
            let engine: Box<dyn InferenceEngine> = if name == "layout" {
                Box::new(layout_engine(boxes.clone()))
            } else {
                Box::new(gray_reader(name))
            };
            Ok(engine)
        });
        let config = PipelineConfig::default()
            .with_source(source)
            .with_parallel(ParallelPolicy::default().with_recognition_workers(Some(workers)))
            .with_writing_direction(WritingDirection::HorizontalLtr);
        OcrPipeline::new(config, loader, Arc::new(factory)).unwrap()
    }

    /// A 400x200 page with two gray lines; the letterbox scale is 2.
    fn two_line_page() -> RgbImage {
        let mut page = RgbImage::new(400, 200);
        for y in 20..60 {
            for x in 20..200 {
                page.put_pixel(x, y, Rgb([1, 1, 1]));
            }
        }
        for y in 100..140 {
            for x in 20..200 {
                page.put_pixel(x, y, Rgb([2, 2, 2]));
            }
        }
        page
    }

    fn two_line_boxes() -> Vec<[f32; 4]> {
        vec![[40.0, 200.0, 400.0, 280.0], [40.0, 40.0, 400.0, 120.0]]
    }

    #[test]
    fn test_process_before_initialize_fails() {
        let dir = model_dir();
        let mut pipeline = pipeline(&dir, Vec::new(), 1);
        let mut events: Vec<PipelineEvent> = Vec::new();
        let err = pipeline
            .process(7, &RgbImage::new(10, 10), Instant::now(), &mut events)
            .unwrap_err();
        assert!(matches!(err, OCRError::NotInitialized { .. }));
        assert_eq!(pipeline.state().status(), PipelineStatus::Error);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Error { id: Some(7), .. })
        ));
    }

    #[test]
    fn test_initialize_reports_downloads_then_ready() {
        let dir = model_dir();
        let mut pipeline = pipeline(&dir, Vec::new(), 1);
        let mut events: Vec<PipelineEvent> = Vec::new();
        pipeline.initialize(&mut events).unwrap();

        assert!(pipeline.is_initialized());
        assert_eq!(pipeline.recognition_workers(), Some(1));
        assert_eq!(events.last(), Some(&PipelineEvent::Ready));
        let download_events = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Progress { downloads: Some(_), .. }))
            .count();
        assert!(download_events >= 4);
        assert_eq!(pipeline.state().status(), PipelineStatus::Idle);
    }

    #[test]
    fn test_initialize_failure_emits_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir, Vec::new(), 1);
        let mut events: Vec<PipelineEvent> = Vec::new();
        let err = pipeline.initialize(&mut events).unwrap_err();
        assert!(matches!(err, OCRError::ModelNotFound { .. }));
        assert!(!pipeline.is_initialized());
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Error {
                id: None,
                kind: FailureKind::ModelNotFound,
                ..
            })
        ));
    }

    #[test]
    fn test_page_is_recognized_in_reading_order() {
        for workers in [1, 2] {
            let dir = model_dir();
            let mut pipeline = pipeline(&dir, two_line_boxes(), workers);
            pipeline.initialize(&mut NullSink).unwrap();

            let mut events: Vec<PipelineEvent> = Vec::new();
            let result = pipeline
                .process(3, &two_line_page(), Instant::now(), &mut events)
                .unwrap();

            // Gray 1 reads as 'e', gray 2 as 'f'.
            assert_eq!(result.full_text, "e\nf");
            assert_eq!(result.blocks.len(), 2);
            assert_eq!(result.blocks[0].reading_order, 1);
            assert_eq!(result.blocks[0].region.bbox.y, 19);
            assert_eq!(pipeline.state().status(), PipelineStatus::Done);

            let stages: Vec<PipelineStage> = events
                .iter()
                .filter_map(|e| match e {
                    PipelineEvent::Progress { stage, .. } => Some(*stage),
                    _ => None,
                })
                .collect();
            assert!(stages.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(stages.first(), Some(&PipelineStage::LayoutDetection));
            assert_eq!(stages.last(), Some(&PipelineStage::GeneratingOutput));
            assert_eq!(events.last(), Some(&PipelineEvent::Complete(result)));
        }
    }

    #[test]
    fn test_empty_layout_completes_with_empty_text() {
        let dir = model_dir();
        let mut pipeline = pipeline(&dir, Vec::new(), 2);
        pipeline.initialize(&mut NullSink).unwrap();
        let result = pipeline
            .process(0, &RgbImage::new(64, 64), Instant::now(), &mut NullSink)
            .unwrap();
        assert!(result.blocks.is_empty());
        assert_eq!(result.full_text, "");
    }

    #[test]
    fn test_full_text_skips_empty_blocks() {
        use crate::domain::{BoundingBox, CharCountCategory, TextRegion};
        let region = TextRegion::new(BoundingBox::new(0, 0, 10, 10), 0.9, 1, CharCountCategory::Long);
        let blocks = vec![
            TextBlock::new(region.clone(), "first", 1.0),
            TextBlock::new(region.clone(), "", 0.0),
            TextBlock::new(region, " last ", 1.0),
        ];
        assert_eq!(assemble_full_text(&blocks), "first\nlast");
    }

}

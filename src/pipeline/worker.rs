//! A pipeline running on its own thread, driven by request messages.

use super::orchestration::OcrPipeline;
use super::protocol::{PageResult, PipelineEvent, PipelineRequest};
use crate::core::errors::{FailureKind, OCRError, OcrResult};
use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbImage;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, warn};

fn run(mut pipeline: OcrPipeline, inbox: Receiver<PipelineRequest>, mut events: Sender<PipelineEvent>) {
    for request in inbox.iter() {
        match request {
            PipelineRequest::Initialize => {
                if let Err(e) = pipeline.initialize(&mut events) {
                    debug!("Initialization reported to caller: {e}");
                }
            }
            PipelineRequest::Process {
                id,
                image,
                start_time,
            } => {
                if let Err(e) = pipeline.process(id, &image, start_time, &mut events) {
                    debug!("Page {id} failure reported to caller: {e}");
                }
            }
            PipelineRequest::Terminate => break,
        }
    }
    pipeline.shutdown();
    debug!("OCR worker stopped");
}

/// Owns an [`OcrPipeline`] on a dedicated thread.
///
/// Requests are handled strictly in order, so pages never overlap. After
/// `Terminate`, queued requests are dropped and the recognition workers are
/// joined.
pub struct OcrWorker {
    requests: Sender<PipelineRequest>,
    events: Receiver<PipelineEvent>,
    thread: Option<JoinHandle<()>>,
    next_id: u64,
}

impl std::fmt::Debug for OcrWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrWorker")
            .field("running", &self.thread.is_some())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl OcrWorker {
    /// Moves `pipeline` onto a new thread.
    pub fn spawn(pipeline: OcrPipeline) -> OcrResult<Self> {
        let (requests, inbox) = unbounded();
        let (sink, events) = unbounded();
        let thread = thread::Builder::new()
            .name("ocr-pipeline".to_string())
            .spawn(move || run(pipeline, inbox, sink))?;
        Ok(Self {
            requests,
            events,
            thread: Some(thread),
            next_id: 0,
        })
    }

    /// Queues a raw request.
    pub fn send(&self, request: PipelineRequest) -> OcrResult<()> {
        self.requests
            .send(request)
            .map_err(|_| OCRError::pipeline_failure(None, FailureKind::Disconnected, "OCR worker has stopped"))
    }

    /// The event stream, for callers driving the worker with [`OcrWorker::send`].
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    fn next_event(&self) -> OcrResult<PipelineEvent> {
        self.events
            .recv()
            .map_err(|_| OCRError::pipeline_failure(None, FailureKind::Disconnected, "OCR worker has stopped"))
    }

    /// Loads the models, forwarding progress events, and waits until ready.
    ///
    /// A failure comes back as [`OCRError::PipelineFailure`];
    /// [`OCRError::kind`] tells a missing artifact from a network error.
    pub fn initialize(&self, mut on_event: impl FnMut(&PipelineEvent)) -> OcrResult<()> {
        self.send(PipelineRequest::Initialize)?;
        loop {
            let event = self.next_event()?;
            match &event {
                PipelineEvent::Ready => return Ok(()),
                PipelineEvent::Error {
                    id: None,
                    kind,
                    message,
                } => {
                    return Err(OCRError::pipeline_failure(None, *kind, message.clone()));
                }
                _ => on_event(&event),
            }
        }
    }

    /// Runs one page and waits for its outcome, forwarding progress events.
    ///
    /// The page is shared with the worker, so the caller keeps its copy.
    pub fn process_page(
        &mut self,
        image: Arc<RgbImage>,
        mut on_event: impl FnMut(&PipelineEvent),
    ) -> OcrResult<PageResult> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(PipelineRequest::Process {
            id,
            image,
            start_time: Instant::now(),
        })?;

        loop {
            let event = self.next_event()?;
            match event {
                PipelineEvent::Complete(result) if result.id == id => return Ok(result),
                PipelineEvent::Error {
                    id: Some(page),
                    kind,
                    message,
                } if page == id => {
                    return Err(OCRError::pipeline_failure(Some(id), kind, message));
                }
                other => on_event(&other),
            }
        }
    }

    /// Runs pages one after another. A failed page is reported in its slot
    /// and the batch continues with the next page.
    pub fn process_batch(
        &mut self,
        images: Vec<Arc<RgbImage>>,
        mut on_event: impl FnMut(&PipelineEvent),
    ) -> Vec<OcrResult<PageResult>> {
        let total = images.len();
        images
            .into_iter()
            .enumerate()
            .map(|(index, image)| {
                let result = self.process_page(image, &mut on_event);
                if let Err(e) = &result {
                    warn!("Page {} of {total} failed: {e}", index + 1);
                }
                result
            })
            .collect()
    }

    /// Sends `Terminate` and waits for the thread to finish.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.requests.send(PipelineRequest::Terminate);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("OCR worker thread panicked");
        }
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

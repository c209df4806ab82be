//! Recognition worker pool.
//!
//! Each worker is a thread owning its own [`RecognizerCascade`]. A page's
//! jobs are split round-robin across workers, every worker answers with a
//! single completion, and results are realigned to regions by job id.

use super::protocol::{RecEvent, RecRequest};
use crate::cache::ModelBundle;
use crate::core::config::RecognizerConfig;
use crate::core::errors::{OCRError, OcrResult};
use crate::core::inference::EngineFactory;
use crate::domain::{RecognitionJob, RecognitionOutput};
use crate::models::RecognizerCascade;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Splits jobs into `n` lists; the job at position `i` goes to list `i % n`.
pub fn partition_round_robin(jobs: Vec<RecognitionJob>, n: usize) -> Vec<Vec<RecognitionJob>> {
    let n = n.max(1);
    let mut lists: Vec<Vec<RecognitionJob>> = (0..n).map(|_| Vec::new()).collect();
    for (i, job) in jobs.into_iter().enumerate() {
        lists[i % n].push(job);
    }
    lists
}

/// Returns exactly one output per region index in `0..region_count`.
///
/// Results are matched by id, never by position. A region without a result
/// gets empty text.
pub fn realign(region_count: usize, results: Vec<RecognitionOutput>) -> Vec<RecognitionOutput> {
    let mut by_id: HashMap<usize, RecognitionOutput> =
        results.into_iter().map(|r| (r.id, r)).collect();
    (0..region_count)
        .map(|id| by_id.remove(&id).unwrap_or_else(|| RecognitionOutput::empty(id)))
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Runs `task`, returning the panic message if it panics.
fn guarded<T>(task: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(task)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Everything a worker thread needs to build and run its cascade.
struct WorkerContext {
    index: usize,
    factory: Arc<dyn EngineFactory>,
    models: [Arc<[u8]>; 3],
    config: RecognizerConfig,
    events: Sender<RecEvent>,
}

impl WorkerContext {
    fn send(&self, event: RecEvent) {
        if self.events.send(event).is_err() {
            debug!("Worker {}: pool is gone, dropping event", self.index);
        }
    }

    fn build(&self) -> OcrResult<RecognizerCascade> {
        let models = [
            &self.models[0][..],
            &self.models[1][..],
            &self.models[2][..],
        ];
        RecognizerCascade::build(self.factory.as_ref(), models, &self.config)
    }

    fn run(self, requests: Receiver<RecRequest>) {
        let mut cascade: Option<RecognizerCascade> = None;

        for request in requests.iter() {
            match request {
                RecRequest::Init => {
                    if cascade.is_none() {
                        let built = guarded(|| self.build())
                            .and_then(|result| result.map_err(|e| e.to_string()));
                        match built {
                            Ok(built) => cascade = Some(built),
                            Err(message) => {
                                self.send(RecEvent::Error {
                                    worker: self.index,
                                    batch: None,
                                    message,
                                });
                                continue;
                            }
                        }
                    }
                    self.send(RecEvent::Ready { worker: self.index });
                }
                RecRequest::Process { batch, jobs } => {
                    let Some(recognizers) = cascade.as_mut() else {
                        self.send(RecEvent::Error {
                            worker: self.index,
                            batch: Some(batch),
                            message: "recognizer cascade is not initialized".to_string(),
                        });
                        continue;
                    };

                    let job_count = jobs.len();
                    let outcome = guarded(|| {
                        recognizers.process_jobs(jobs, |fraction| {
                            self.send(RecEvent::Progress {
                                worker: self.index,
                                batch,
                                fraction,
                            })
                        })
                    });
                    match outcome {
                        Ok(results) => {
                            debug!("Worker {} finished {job_count} jobs", self.index);
                            self.send(RecEvent::Complete {
                                worker: self.index,
                                batch,
                                results,
                            });
                        }
                        Err(message) => self.send(RecEvent::Error {
                            worker: self.index,
                            batch: Some(batch),
                            message,
                        }),
                    }
                }
                RecRequest::Terminate => {
                    debug!("Worker {} terminating", self.index);
                    break;
                }
            }
        }
    }
}

struct WorkerHandle {
    requests: Sender<RecRequest>,
    thread: Option<JoinHandle<()>>,
}

/// A fixed set of recognition threads, reused across pages.
pub struct RecognitionPool {
    workers: Vec<WorkerHandle>,
    events: Receiver<RecEvent>,
    next_batch: u64,
}

impl std::fmt::Debug for RecognitionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionPool")
            .field("workers", &self.workers.len())
            .field("next_batch", &self.next_batch)
            .finish()
    }
}

impl RecognitionPool {
    /// Spawns `size` workers and waits until each has built its cascade.
    ///
    /// # Errors
    ///
    /// [`OCRError::WorkerFault`] if a thread cannot be spawned or a worker
    /// fails to build its recognizers.
    pub fn start(size: usize, factory: Arc<dyn EngineFactory>, bundle: &ModelBundle) -> OcrResult<Self> {
        let size = size.max(1);
        let (event_tx, events) = unbounded();
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let (requests, inbox) = unbounded();
            let context = WorkerContext {
                index,
                factory: Arc::clone(&factory),
                models: bundle.recognizers.clone(),
                config: bundle.recognizer_config.clone(),
                events: event_tx.clone(),
            };
            let thread = thread::Builder::new()
                .name(format!("rec-worker-{index}"))
                .spawn(move || context.run(inbox))
                .map_err(|e| OCRError::worker_fault(index, format!("cannot spawn thread: {e}")))?;
            workers.push(WorkerHandle {
                requests,
                thread: Some(thread),
            });
        }
        drop(event_tx);

        let mut pool = Self {
            workers,
            events,
            next_batch: 0,
        };
        pool.initialize()?;
        info!("Started {size} recognition workers");
        Ok(pool)
    }

    fn initialize(&mut self) -> OcrResult<()> {
        for (index, worker) in self.workers.iter().enumerate() {
            worker
                .requests
                .send(RecRequest::Init)
                .map_err(|_| OCRError::worker_fault(index, "worker is not running"))?;
        }

        let mut ready = vec![false; self.workers.len()];
        while ready.iter().any(|r| !r) {
            let waiting = ready.iter().position(|r| !r).unwrap_or(0);
            match self.events.recv() {
                Ok(RecEvent::Ready { worker }) if worker < ready.len() => ready[worker] = true,
                Ok(RecEvent::Error {
                    worker, message, ..
                }) => return Err(OCRError::worker_fault(worker, message)),
                Ok(_) => {}
                Err(_) => return Err(OCRError::worker_fault(waiting, "worker exited during startup")),
            }
        }
        Ok(())
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Recognizes one page's jobs across the pool.
    ///
    /// Returns the flattened results in no particular order; use [`realign`]
    /// to map them back to regions. `on_progress` receives the completed
    /// fraction over all jobs. Workers given no jobs are not messaged.
    ///
    /// # Errors
    ///
    /// The first worker error fails the whole call with
    /// [`OCRError::WorkerFault`]. Results of the other workers are discarded,
    /// including any that arrive later.
    pub fn dispatch(
        &mut self,
        jobs: Vec<RecognitionJob>,
        mut on_progress: impl FnMut(f32),
    ) -> OcrResult<Vec<RecognitionOutput>> {
        let batch = self.next_batch;
        self.next_batch += 1;

        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let size = self.workers.len();
        let mut weights = vec![0usize; size];
        let mut fractions = vec![0.0f32; size];
        let mut done = vec![true; size];

        for (index, (worker, list)) in self
            .workers
            .iter()
            .zip(partition_round_robin(jobs, size))
            .enumerate()
        {
            if list.is_empty() {
                continue;
            }
            weights[index] = list.len();
            done[index] = false;
            worker
                .requests
                .send(RecRequest::Process { batch, jobs: list })
                .map_err(|_| OCRError::worker_fault(index, "worker is not running"))?;
        }
        debug!("Dispatched batch {batch}: {total} jobs over {size} workers");

        let mut results = Vec::with_capacity(total);
        while let Some(waiting) = done.iter().position(|d| !d) {
            let event = self
                .events
                .recv()
                .map_err(|_| OCRError::worker_fault(waiting, "all workers have exited"))?;

            match event {
                RecEvent::Progress {
                    worker,
                    batch: b,
                    fraction,
                } if b == batch && worker < size => {
                    fractions[worker] = fraction;
                    let completed: f32 = fractions
                        .iter()
                        .zip(&weights)
                        .map(|(f, &w)| f * w as f32)
                        .sum();
                    on_progress(completed / total as f32);
                }
                RecEvent::Complete {
                    worker,
                    batch: b,
                    results: partial,
                } if b == batch && worker < size => {
                    if !done[worker] {
                        done[worker] = true;
                        results.extend(partial);
                    }
                }
                RecEvent::Error {
                    worker,
                    batch: b,
                    message,
                } if b.is_none_or(|b| b == batch) => {
                    warn!("Recognition worker {worker} failed batch {batch}: {message}");
                    return Err(OCRError::worker_fault(worker, message));
                }
                _ => debug!("Discarding recognition event from an earlier batch"),
            }
        }

        Ok(results)
    }

    /// Sends `Terminate` to every worker and joins the threads. In-flight
    /// jobs finish first.
    pub fn shutdown(&mut self) {
        for worker in &self.workers {
            let _ = worker.requests.send(RecRequest::Terminate);
        }
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(thread) = worker.thread.take()
                && thread.join().is_err()
            {
                warn!("Recognition worker {index} panicked during shutdown");
            }
        }
    }
}

impl Drop for RecognitionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Where recognition runs: on the calling thread or on a worker pool.
#[derive(Debug)]
pub enum RecognitionBackend {
    InProcess(Box<RecognizerCascade>),
    Pool(RecognitionPool),
}

impl RecognitionBackend {
    /// Builds an in-process cascade for one worker, otherwise a pool.
    pub fn start(workers: usize, factory: Arc<dyn EngineFactory>, bundle: &ModelBundle) -> OcrResult<Self> {
        if workers <= 1 {
            info!("Recognizing in-process");
            let cascade = guarded(|| {
                RecognizerCascade::build(
                    factory.as_ref(),
                    bundle.recognizer_slices(),
                    &bundle.recognizer_config,
                )
            })
            .map_err(|panic| OCRError::worker_fault(0, panic))??;
            Ok(RecognitionBackend::InProcess(Box::new(cascade)))
        } else {
            Ok(RecognitionBackend::Pool(RecognitionPool::start(
                workers, factory, bundle,
            )?))
        }
    }

    pub fn worker_count(&self) -> usize {
        match self {
            RecognitionBackend::InProcess(_) => 1,
            RecognitionBackend::Pool(pool) => pool.size(),
        }
    }

    /// Recognizes jobs; results are unordered.
    ///
    /// A panic in the in-process cascade fails only this call, as a
    /// [`OCRError::WorkerFault`] for worker 0.
    pub fn recognize(
        &mut self,
        jobs: Vec<RecognitionJob>,
        on_progress: impl FnMut(f32),
    ) -> OcrResult<Vec<RecognitionOutput>> {
        match self {
            RecognitionBackend::InProcess(cascade) => {
                guarded(|| cascade.process_jobs(jobs, on_progress)).map_err(|panic| {
                    warn!("In-process recognition failed: {panic}");
                    OCRError::worker_fault(0, panic)
                })
            }
            RecognitionBackend::Pool(pool) => pool.dispatch(jobs, on_progress),
        }
    }

    pub fn shutdown(&mut self) {
        if let RecognitionBackend::Pool(pool) = self {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::testing::{ScriptedEngine, ScriptedFactory};
    use crate::core::inference::{InferenceEngine, TensorInput, TensorOutput};
    use crate::domain::CharCountCategory;
    use image::{Rgb, RgbImage};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CHARSET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ#$";
    const CRASH_VALUE: usize = 200;

    /// Reads the crop's gray level back out of the input tensor and emits the
    /// token for it, so the recognized text identifies the job.
    fn echo_engine(name: &str, delays: Vec<u64>) -> ScriptedEngine {
        let mut calls = 0usize;
        ScriptedEngine::new(name, &["x"], move |inputs| {
            let TensorInput::Array4(t) = &inputs[0].1 else {
                return Err(OCRError::inference("echo", "unexpected input"));
            };
            let value = ((t[[0, 0, 0, 0]] + 1.0) * 127.5).round() as usize;
            if value == CRASH_VALUE {
                panic!("scripted worker crash");
            }
            if !delays.is_empty() {
                thread::sleep(Duration::from_millis(delays[calls % delays.len()]));
            }
            calls += 1;

            let vocab = CHARSET.len() + 1;
            let mut data = vec![0.0f32; vocab];
            data[value + 4] = 1.0;
            Ok(vec![(
                "logits".to_string(),
                TensorOutput::F32 {
                    shape: vec![1, 1, vocab as i64],
                    data,
                },
            )])
        })
    }

    fn echo_factory(delays: Vec<u64>) -> Arc<dyn EngineFactory> {
        let created = Arc::new(AtomicUsize::new(0));
        Arc::new(ScriptedFactory::new(move |name, _| {
            let offset = created.fetch_add(1, Ordering::SeqCst);
            let mut rotated = delays.clone();
            if !rotated.is_empty() {
                let len = rotated.len();
                rotated.rotate_left(offset % len);
            }
            Ok(Box::new(echo_engine(name, rotated)) as Box<dyn InferenceEngine>)
        }))
    }

    fn bundle() -> ModelBundle {
        let bytes: Arc<[u8]> = Arc::from(&b"model"[..]);
        ModelBundle {
            layout: Arc::clone(&bytes),
            recognizers: [Arc::clone(&bytes), Arc::clone(&bytes), bytes],
            recognizer_config: RecognizerConfig::default().with_charset(CHARSET),
        }
    }

    fn job(id: usize, gray: u8) -> RecognitionJob {
        RecognitionJob::new(
            id,
            RgbImage::from_pixel(24, 8, Rgb([gray, gray, gray])),
            CharCountCategory::Long,
        )
    }

    fn jobs(count: usize) -> Vec<RecognitionJob> {
        (0..count).map(|id| job(id, id as u8)).collect()
    }

    fn expected_text(id: usize) -> String {
        CHARSET.chars().nth(id + 3).map(String::from).unwrap_or_default()
    }

    #[test]
    fn test_round_robin_partition() {
        let lists = partition_round_robin(jobs(5), 2);
        let ids: Vec<Vec<usize>> = lists
            .iter()
            .map(|l| l.iter().map(|j| j.id).collect())
            .collect();
        assert_eq!(ids, vec![vec![0, 2, 4], vec![1, 3]]);
    }

    #[test]
    fn test_realign_fills_missing_ids() {
        let aligned = realign(
            3,
            vec![
                RecognitionOutput::new(2, "c", 1.0),
                RecognitionOutput::new(0, "a", 1.0),
            ],
        );
        let texts: Vec<&str> = aligned.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "", "c"]);
        assert_eq!(aligned[1], RecognitionOutput::empty(1));
    }

    #[test]
    fn test_pool_recognizes_and_realigns() {
        let mut pool = RecognitionPool::start(3, echo_factory(vec![3, 0, 1]), &bundle()).unwrap();
        let mut progress = Vec::new();
        let results = pool.dispatch(jobs(7), |p| progress.push(p)).unwrap();
        assert_eq!(results.len(), 7);

        let aligned = realign(7, results);
        for (id, result) in aligned.iter().enumerate() {
            assert_eq!(result.id, id);
            assert_eq!(result.text, expected_text(id));
        }
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!((progress.last().copied().unwrap_or(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_job_list_resolves_immediately() {
        let mut pool = RecognitionPool::start(2, echo_factory(Vec::new()), &bundle()).unwrap();
        assert!(pool.dispatch(Vec::new(), |_| {}).unwrap().is_empty());
        // One job leaves the second worker without work.
        let results = pool.dispatch(jobs(1), |_| {}).unwrap();
        assert_eq!(results, vec![RecognitionOutput::new(0, expected_text(0), 1.0)]);
    }

    #[test]
    fn test_worker_error_fails_batch_and_pool_recovers() {
        let mut pool = RecognitionPool::start(2, echo_factory(vec![2]), &bundle()).unwrap();

        let failing = vec![job(0, 0), job(1, CRASH_VALUE as u8), job(2, 2)];
        let err = pool.dispatch(failing, |_| {}).unwrap_err();
        assert!(matches!(err, OCRError::WorkerFault { worker: 1, .. }));

        // Late completions of the failed batch are discarded.
        let results = realign(4, pool.dispatch(jobs(4), |_| {}).unwrap());
        let texts: Vec<String> = results.into_iter().map(|r| r.text).collect();
        assert_eq!(texts, (0..4).map(expected_text).collect::<Vec<_>>());
    }

    #[test]
    fn test_init_failure_is_a_worker_fault() {
        let factory: Arc<dyn EngineFactory> = Arc::new(ScriptedFactory::new(|name, _| {
            Err(OCRError::inference(name, "corrupt model"))
        }));
        let err = RecognitionPool::start(2, factory, &bundle()).unwrap_err();
        assert!(err.is_worker_fault());
    }

    #[test]
    fn test_init_panic_in_one_worker_fails_start() {
        let created = Arc::new(AtomicUsize::new(0));
        let factory: Arc<dyn EngineFactory> = Arc::new(ScriptedFactory::new(move |name, _| {
            if created.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("session construction crashed");
            }
            Ok(Box::new(echo_engine(name, Vec::new())) as Box<dyn InferenceEngine>)
        }));

        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let outcome = RecognitionPool::start(3, factory, &bundle()).map(|_| ());
            let _ = tx.send(outcome);
        });
        let outcome = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("pool start must not block on a crashed worker");
        let err = outcome.unwrap_err();
        assert!(err.is_worker_fault());
        assert!(err.to_string().contains("session construction crashed"));
    }

    #[test]
    fn test_in_process_panic_fails_call_only() {
        let mut backend = RecognitionBackend::start(1, echo_factory(Vec::new()), &bundle()).unwrap();
        let err = backend
            .recognize(vec![job(0, 0), job(1, CRASH_VALUE as u8)], |_| {})
            .unwrap_err();
        assert!(matches!(err, OCRError::WorkerFault { worker: 0, .. }));

        let results = backend.recognize(jobs(2), |_| {}).unwrap();
        let texts: Vec<String> = results.into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec![expected_text(0), expected_text(1)]);
    }

    #[test]
    fn test_single_worker_runs_in_process() {
        let mut backend = RecognitionBackend::start(1, echo_factory(Vec::new()), &bundle()).unwrap();
        assert!(matches!(backend, RecognitionBackend::InProcess(_)));
        assert_eq!(backend.worker_count(), 1);
        let results = backend.recognize(jobs(3), |_| {}).unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn results_follow_region_order_despite_completion_order(
            workers in 1usize..5,
            count in 0usize..24,
            delays in prop::collection::vec(0u64..4, 1..6),
        ) {
            let mut pool = RecognitionPool::start(workers, echo_factory(delays), &bundle()).unwrap();
            let aligned = realign(count, pool.dispatch(jobs(count), |_| {}).unwrap());

            prop_assert_eq!(aligned.len(), count);
            for (id, result) in aligned.iter().enumerate() {
                prop_assert_eq!(result.id, id);
                prop_assert_eq!(&result.text, &expected_text(id));
            }
        }
    }
}

use crossbeam::channel::unbounded;
use crossbeam::channel::Receiver;
use crossbeam::channel::RecvTimeoutError;
use crossbeam::channel::Sender;

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crate::config::PoolConfig;
use crate::error::PlateError;
use crate::metrics;

use super::plate_detector::PlateDetector;
use super::text_recognizer::RecognizerFactory;
use super::text_recognizer::TextRecognizer;
use super::video_reader::FrameSource;
use super::Frame;

/// What one sampled frame contributed.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Plate(String),
    NoCandidate,
    NoText,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReading {
    pub frame_index: u64,
    pub outcome: FrameOutcome,
}

enum WorkerMessage {
    InitFailed(String),
    Done(FrameReading),
}

/// Result of pushing one video through the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleSummary {
    pub decoded: u64,
    pub submitted: usize,
    pub completed: usize,
    pub abandoned: usize,
    /// Readings in completion order.
    pub readings: Vec<FrameReading>,
}

impl ScheduleSummary {
    /// Non-empty plate texts with the frame that produced them.
    pub fn votes(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.readings.iter().filter_map(|reading| match &reading.outcome {
            FrameOutcome::Plate(text) => Some((text.as_str(), reading.frame_index)),
            _ => None,
        })
    }
}

/// Samples every Nth frame of a source and runs detection and recognition on a
/// bounded pool of worker threads. A pool is built and torn down per call.
pub struct FrameJobScheduler<F> {
    config: PoolConfig,
    detector: Arc<PlateDetector>,
    factory: Arc<F>,
}

impl<F> FrameJobScheduler<F>
where
    F: RecognizerFactory + 'static,
{
    pub fn new(config: PoolConfig, detector: PlateDetector, factory: F) -> Self {
        Self {
            config,
            detector: Arc::new(detector),
            factory: Arc::new(factory),
        }
    }

    pub fn is_sampled(&self, frame_index: u64) -> bool {
        is_sampled(frame_index, self.config.frame_skip)
    }

    pub fn run<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<ScheduleSummary, PlateError> {
        let workers = self.config.workers.max(1);
        let (job_sender, job_receiver) = unbounded::<Frame>();
        let (result_sender, result_receiver) = unbounded::<WorkerMessage>();

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            handles.push(self.spawn_worker(id, job_receiver.clone(), result_sender.clone())?);
        }
        drop(job_receiver);
        drop(result_sender);

        let mut summary = ScheduleSummary::default();
        let mut workers_gone = false;
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("frame source failed, ending sampling: {}", err);
                    break;
                }
            };
            summary.decoded += 1;
            if !self.is_sampled(frame.index) {
                continue;
            }
            if job_sender.send(frame).is_err() {
                // Every worker has exited; their messages explain why.
                workers_gone = true;
                break;
            }
            summary.submitted += 1;
            metrics::FRAMES_SAMPLED.inc();
        }
        drop(job_sender);
        log::debug!(
            "submitted {} of {} decoded frames to {} workers",
            summary.submitted,
            summary.decoded,
            workers
        );

        let mut init_failures = 0;
        while workers_gone || summary.completed < summary.submitted {
            let message = match self.config.task_timeout {
                Some(timeout) => match result_receiver.recv_timeout(timeout) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        summary.abandoned = summary.submitted - summary.completed;
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match result_receiver.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            match message {
                WorkerMessage::InitFailed(reason) => {
                    init_failures += 1;
                    if init_failures == workers {
                        return Err(PlateError::RecognitionEngine(format!(
                            "no worker could start a recognizer: {}",
                            reason
                        )));
                    }
                }
                WorkerMessage::Done(reading) => {
                    summary.completed += 1;
                    summary.readings.push(reading);
                }
            }
        }

        if summary.abandoned > 0 {
            log::warn!(
                "{} tasks did not finish within {:?}; detaching workers",
                summary.abandoned,
                self.config.task_timeout
            );
            metrics::TASKS_ABANDONED.inc_by(summary.abandoned as u64);
            return Ok(summary);
        }

        for handle in handles {
            if handle.join().is_err() {
                log::error!("a frame worker panicked");
            }
        }

        // Workers that never received a job still report a failed start.
        let mut last_reason = None;
        for message in result_receiver.try_iter() {
            if let WorkerMessage::InitFailed(reason) = message {
                init_failures += 1;
                last_reason = Some(reason);
            }
        }
        if init_failures == workers {
            return Err(PlateError::RecognitionEngine(format!(
                "no worker could start a recognizer: {}",
                last_reason.unwrap_or_default()
            )));
        }
        Ok(summary)
    }

    fn spawn_worker(
        &self,
        id: usize,
        jobs: Receiver<Frame>,
        results: Sender<WorkerMessage>,
    ) -> Result<JoinHandle<()>, PlateError> {
        let detector = self.detector.clone();
        let factory = self.factory.clone();
        thread::Builder::new()
            .name(format!("plate-worker-{}", id))
            .spawn(move || {
                let mut recognizer = match factory.create() {
                    Ok(recognizer) => recognizer,
                    Err(err) => {
                        log::error!("worker {} could not start a recognizer: {}", id, err);
                        let _ = results.send(WorkerMessage::InitFailed(err.to_string()));
                        return;
                    }
                };

                for frame in jobs.iter() {
                    let timer = metrics::FRAME_TASK_SECONDS.start_timer();
                    let reading = FrameReading {
                        frame_index: frame.index,
                        outcome: process_frame(&detector, &mut recognizer, &frame),
                    };
                    timer.observe_duration();
                    if results.send(WorkerMessage::Done(reading)).is_err() {
                        break;
                    }
                }
                drop(recognizer);
                log::trace!("worker {} finished", id);
            })
            .map_err(|err| PlateError::WorkerPool(err.to_string()))
    }
}

/// 1-based frame `index` is sampled when it is a multiple of `frame_skip`.
pub fn is_sampled(frame_index: u64, frame_skip: u64) -> bool {
    frame_skip > 0 && frame_index > 0 && frame_index % frame_skip == 0
}

/// Detection then recognition for one frame. Failures are folded into the
/// outcome so a single bad frame never fails the video.
pub fn process_frame<R: TextRecognizer + ?Sized>(
    detector: &PlateDetector,
    recognizer: &mut R,
    frame: &Frame,
) -> FrameOutcome {
    let candidate = match detector.detect(&frame.image) {
        Ok(Some(candidate)) => candidate,
        Ok(None) => {
            metrics::FRAMES_WITHOUT_CANDIDATE.inc();
            return FrameOutcome::NoCandidate;
        }
        Err(err) => {
            log::warn!("detection failed on frame {}: {}", frame.index, err);
            metrics::FRAMES_WITHOUT_CANDIDATE.inc();
            return FrameOutcome::NoCandidate;
        }
    };
    metrics::CANDIDATES_FOUND.inc();

    match recognizer.recognize(&candidate.region) {
        Ok(result) => match result.first_text() {
            Some(text) => {
                log::debug!("frame {} reads {:?}", frame.index, text);
                metrics::VOTES_CAST.inc();
                FrameOutcome::Plate(text.to_string())
            }
            None => FrameOutcome::NoText,
        },
        Err(err) => {
            log::warn!("recognition failed on frame {}: {}", frame.index, err);
            metrics::RECOGNITION_FAILURES.inc();
            FrameOutcome::Failed(err.to_string())
        }
    }
}

use lazy_static::lazy_static;
use prometheus::register_histogram;
use prometheus::register_int_counter;
use prometheus::register_int_counter_vec;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::TextEncoder;

use crate::error::PlateError;

lazy_static! {
    pub static ref FRAMES_DECODED: IntCounter = register_int_counter!(
        "plate_reader_frames_decoded_total",
        "Frames decoded from video sources"
    )
    .expect("frames_decoded metric");
    pub static ref FRAMES_SAMPLED: IntCounter = register_int_counter!(
        "plate_reader_frames_sampled_total",
        "Frames submitted to the worker pool"
    )
    .expect("frames_sampled metric");
    pub static ref CANDIDATES_FOUND: IntCounter = register_int_counter!(
        "plate_reader_candidates_found_total",
        "Sampled frames with a four sided plate candidate"
    )
    .expect("candidates_found metric");
    pub static ref FRAMES_WITHOUT_CANDIDATE: IntCounter = register_int_counter!(
        "plate_reader_frames_without_candidate_total",
        "Sampled frames without a plate candidate"
    )
    .expect("frames_without_candidate metric");
    pub static ref RECOGNITION_FAILURES: IntCounter = register_int_counter!(
        "plate_reader_recognition_failures_total",
        "Recognition calls that failed and were dropped"
    )
    .expect("recognition_failures metric");
    pub static ref VOTES_CAST: IntCounter = register_int_counter!(
        "plate_reader_votes_total",
        "Non-empty plate readings collected"
    )
    .expect("votes metric");
    pub static ref TASKS_ABANDONED: IntCounter = register_int_counter!(
        "plate_reader_tasks_abandoned_total",
        "Tasks still outstanding when the task timeout expired"
    )
    .expect("tasks_abandoned metric");
    pub static ref VIDEOS_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "plate_reader_videos_total",
        "Videos processed, by outcome",
        &["outcome"]
    )
    .expect("videos metric");
    pub static ref FRAME_TASK_SECONDS: Histogram = register_histogram!(
        "plate_reader_frame_task_seconds",
        "Time spent detecting and recognizing one sampled frame"
    )
    .expect("frame_task_seconds metric");
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> Result<String, PlateError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|err| PlateError::Config(format!("metrics encoding: {}", err)))?;
    String::from_utf8(buffer).map_err(|err| PlateError::Config(err.to_string()))
}

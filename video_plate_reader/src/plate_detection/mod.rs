pub mod clip_writer;
pub mod plate_detector;
pub mod processor;
pub mod scheduler;
pub mod text_recognizer;
pub mod video_reader;
pub mod vote;

use opencv::prelude::Mat;

/// One decoded frame and its 1-based position in the source video.
#[derive(Debug)]
pub struct Frame {
    pub index: u64,
    pub image: Mat,
}

impl Frame {
    pub fn new(index: u64, image: Mat) -> Self {
        return Self { index, image };
    }
}

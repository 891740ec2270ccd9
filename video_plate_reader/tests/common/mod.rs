#![allow(dead_code)]

use opencv::core::Rect;
use opencv::core::Scalar;
use opencv::core::Size;
use opencv::core::CV_8UC3;
use opencv::imgproc::rectangle;
use opencv::imgproc::LINE_8;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::VideoWriterTrait;
use opencv::prelude::VideoWriterTraitConst;
use opencv::videoio::VideoWriter;

use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use video_plate_reader::plate_detection::text_recognizer::RecognitionResult;
use video_plate_reader::plate_detection::text_recognizer::TextRecognizer;
use video_plate_reader::plate_detection::text_recognizer::TextSpan;
use video_plate_reader::plate_detection::video_reader::FrameSource;
use video_plate_reader::plate_detection::video_reader::VideoMetadata;
use video_plate_reader::plate_detection::Frame;
use video_plate_reader::PlateError;

pub const WIDE_PLATE: &str = "ABC123";
pub const NARROW_PLATE: &str = "XYZ999";

pub fn blank_frame() -> Mat {
    Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
}

/// A black frame with one filled white rectangle.
pub fn frame_with_rect(rect: Rect) -> Mat {
    let mut frame = blank_frame();
    rectangle(&mut frame, rect, Scalar::all(255.0), -1, LINE_8, 0).unwrap();
    frame
}

pub fn wide_plate() -> Mat {
    frame_with_rect(Rect::new(200, 180, 240, 80))
}

pub fn narrow_plate() -> Mat {
    frame_with_rect(Rect::new(260, 200, 100, 60))
}

/// Writes `frames` 640x480 frames to an MJPG `.avi`, with `plate(index)`
/// choosing the image for each 1-based index.
pub fn write_avi(path: &Path, frames: u64, plate: impl Fn(u64) -> Mat) {
    let mut writer = VideoWriter::new(
        path.to_str().unwrap(),
        VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap(),
        25.0,
        Size::new(640, 480),
        true,
    )
    .unwrap();
    assert!(writer.is_opened().unwrap(), "MJPG writer unavailable");
    for index in 1..=frames {
        writer.write(&plate(index)).unwrap();
    }
    writer.release().unwrap();
}

/// In-memory frames, numbered from 1, that count how often they are released.
pub struct FakeSource {
    frames: std::vec::IntoIter<Mat>,
    next_index: u64,
    pub releases: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(frames: Vec<Mat>) -> Self {
        Self {
            frames: frames.into_iter(),
            next_index: 0,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `count` frames, with `plate(index)` choosing the image for each 1-based index.
    pub fn generate(count: u64, plate: impl Fn(u64) -> Mat) -> Self {
        Self::new((1..=count).map(plate).collect())
    }
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, PlateError> {
        match self.frames.next() {
            Some(image) => {
                self.next_index += 1;
                Ok(Some(Frame::new(self.next_index, image)))
            }
            None => Ok(None),
        }
    }

    fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            frame_count: Some(self.next_index + self.frames.len() as u64),
            fps: Some(25.0),
        }
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reads regions wider than 150 pixels as `WIDE_PLATE`, narrower ones as
/// `NARROW_PLATE`.
pub struct WidthRecognizer {
    pub delay: Duration,
}

impl TextRecognizer for WidthRecognizer {
    fn recognize(&mut self, region: &Mat) -> Result<RecognitionResult, PlateError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let text = if region.cols() > 150 {
            WIDE_PLATE
        } else {
            NARROW_PLATE
        };
        Ok(RecognitionResult::new(vec![TextSpan {
            geometry: Vec::new(),
            text: text.to_string(),
            confidence: 0.9,
        }]))
    }
}

pub fn width_recognizer() -> Result<WidthRecognizer, PlateError> {
    Ok(WidthRecognizer {
        delay: Duration::ZERO,
    })
}

pub struct FailingRecognizer;

impl TextRecognizer for FailingRecognizer {
    fn recognize(&mut self, _region: &Mat) -> Result<RecognitionResult, PlateError> {
        Err(PlateError::RecognitionEngine("engine crashed".into()))
    }
}

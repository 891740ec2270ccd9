use opencv::core::Size;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::VideoCaptureTrait;
use opencv::prelude::VideoCaptureTraitConst;
use opencv::prelude::VideoWriterTrait;
use opencv::prelude::VideoWriterTraitConst;
use opencv::videoio::VideoCapture;
use opencv::videoio::VideoWriter;
use opencv::videoio::CAP_ANY;
use opencv::videoio::CAP_PROP_FPS;
use opencv::videoio::CAP_PROP_FRAME_HEIGHT;
use opencv::videoio::CAP_PROP_FRAME_WIDTH;

use std::path::Path;

use crate::error::PlateError;

/// Half-open time window `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub end: f64,
}

impl ClipWindow {
    pub fn new(start: f64, end: f64) -> Result<Self, PlateError> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 {
            return Err(PlateError::Config(format!(
                "invalid clip window {}..{}",
                start, end
            )));
        }
        if start >= end {
            return Err(PlateError::Config(format!(
                "clip start {}s must be before end {}s",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, seconds: f64) -> bool {
        seconds >= self.start && seconds < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSummary {
    pub frames_read: u64,
    pub frames_written: u64,
    pub fps: f64,
    pub frame_size: Size,
}

/// Re-encodes the frames of `input` whose timestamp falls inside `window`
/// into `output`, keeping frame size and rate. `.avi` outputs use MJPG,
/// everything else mp4v.
pub fn trim_clip(
    input: &Path,
    output: &Path,
    window: ClipWindow,
) -> Result<ClipSummary, PlateError> {
    let input_str = input
        .to_str()
        .ok_or_else(|| PlateError::unreadable(input, "path is not valid UTF-8"))?;
    let mut capture = VideoCapture::from_file(input_str, CAP_ANY)
        .map_err(|err| PlateError::unreadable(input, err.to_string()))?;
    if !capture.is_opened()? {
        return Err(PlateError::unreadable(input, "container could not be opened"));
    }

    let fps = capture.get(CAP_PROP_FPS)?;
    if fps.is_nan() || fps <= 0.0 {
        capture.release()?;
        return Err(PlateError::unreadable(input, "container reports no frame rate"));
    }
    let frame_size = Size::new(
        capture.get(CAP_PROP_FRAME_WIDTH)? as i32,
        capture.get(CAP_PROP_FRAME_HEIGHT)? as i32,
    );

    let output_str = output
        .to_str()
        .ok_or_else(|| PlateError::Config(format!("output path {:?} is not UTF-8", output)))?;
    let mut writer = VideoWriter::new(output_str, fourcc_for(output)?, fps, frame_size, true)?;
    if !writer.is_opened()? {
        capture.release()?;
        return Err(PlateError::Config(format!(
            "cannot open {} for writing",
            output.display()
        )));
    }

    let mut summary = ClipSummary {
        frames_read: 0,
        frames_written: 0,
        fps,
        frame_size,
    };
    let mut frame = Mat::default();
    loop {
        if !capture.read(&mut frame)? || frame.empty() {
            break;
        }
        let timestamp = summary.frames_read as f64 / fps;
        summary.frames_read += 1;
        if timestamp >= window.end {
            break;
        }
        if window.contains(timestamp) {
            writer.write(&frame)?;
            summary.frames_written += 1;
        }
    }

    writer.release()?;
    capture.release()?;
    log::info!(
        "wrote {} of {} frames ({:.2}s..{:.2}s at {} fps) to {}",
        summary.frames_written,
        summary.frames_read,
        window.start,
        window.end,
        fps,
        output.display()
    );
    Ok(summary)
}

fn fourcc_for(output: &Path) -> Result<i32, PlateError> {
    let is_avi = output
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("avi"))
        .unwrap_or(false);
    let code = if is_avi {
        VideoWriter::fourcc('M', 'J', 'P', 'G')?
    } else {
        VideoWriter::fourcc('m', 'p', '4', 'v')?
    };
    Ok(code)
}

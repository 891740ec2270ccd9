use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use opencv::prelude::VideoCaptureTrait;
use opencv::prelude::VideoCaptureTraitConst;
use opencv::videoio::VideoCapture;

use opencv::videoio::CAP_ANY;
use opencv::videoio::CAP_PROP_FPS;
use opencv::videoio::CAP_PROP_FRAME_COUNT;

use std::path::Path;
use std::path::PathBuf;

use crate::error::PlateError;
use crate::metrics;

use super::Frame;

/// Container properties, used for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoMetadata {
    pub frame_count: Option<u64>,
    pub fps: Option<f64>,
}

/// Sequential, non-restartable supply of decoded frames.
pub trait FrameSource {
    /// Advances one frame. `Ok(None)` is end-of-stream; it is sticky.
    fn next_frame(&mut self) -> Result<Option<Frame>, PlateError>;

    fn metadata(&self) -> VideoMetadata;

    /// Releases the decode resource. Calling it more than once is a no-op.
    fn release(&mut self);
}

pub struct VideoReader {
    path: PathBuf,
    capture: VideoCapture,
    metadata: VideoMetadata,
    decoded: u64,
    released: bool,
}

impl VideoReader {
    pub fn open(path: &Path) -> Result<Self, PlateError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| PlateError::unreadable(path, "path is not valid UTF-8"))?;
        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|err| PlateError::unreadable(path, err.to_string()))?;
        let opened = capture
            .is_opened()
            .map_err(|err| PlateError::unreadable(path, err.to_string()))?;
        if !opened {
            return Err(PlateError::unreadable(path, "container could not be opened"));
        }

        let metadata = VideoMetadata {
            frame_count: positive(capture.get(CAP_PROP_FRAME_COUNT).ok()).map(|n| n as u64),
            fps: positive(capture.get(CAP_PROP_FPS).ok()),
        };
        log::debug!(
            "opened {} (frames: {:?}, fps: {:?})",
            path.display(),
            metadata.frame_count,
            metadata.fps
        );

        Ok(Self {
            path: path.to_path_buf(),
            capture,
            metadata,
            decoded: 0,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

impl FrameSource for VideoReader {
    fn next_frame(&mut self) -> Result<Option<Frame>, PlateError> {
        if self.released {
            return Ok(None);
        }

        let mut image = Mat::default();
        let grabbed = match self.capture.read(&mut image) {
            Ok(grabbed) => grabbed,
            Err(err) => {
                log::warn!(
                    "decode failed in {} after frame {}: {}",
                    self.path.display(),
                    self.decoded,
                    err
                );
                false
            }
        };

        if !grabbed || image.empty() {
            log::debug!(
                "end of stream for {} after {} frames",
                self.path.display(),
                self.decoded
            );
            self.release();
            return Ok(None);
        }

        self.decoded += 1;
        metrics::FRAMES_DECODED.inc();
        Ok(Some(Frame::new(self.decoded, image)))
    }

    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.capture.release() {
            log::warn!("releasing {} failed: {}", self.path.display(), err);
        }
        log::debug!("released {}", self.path.display());
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        self.release();
    }
}

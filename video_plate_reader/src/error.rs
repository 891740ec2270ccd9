use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading a plate out of a video.
#[derive(Debug, Error)]
pub enum PlateError {
    #[error("cannot open video {path:?}: {reason}")]
    UnreadableVideo { path: PathBuf, reason: String },

    /// No sampled frame produced a candidate region with readable text.
    #[error("no plate detected")]
    NoPlateDetected,

    #[error("text recognition failed: {0}")]
    RecognitionEngine(String),

    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl PlateError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PlateError::UnreadableVideo {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

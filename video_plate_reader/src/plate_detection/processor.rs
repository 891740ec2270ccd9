use std::fmt;
use std::path::Path;

use crate::config::ReaderConfig;
use crate::error::PlateError;
use crate::metrics;

use super::plate_detector::PlateDetector;
use super::scheduler::FrameJobScheduler;
use super::scheduler::ScheduleSummary;
use super::text_recognizer::RecognizerFactory;
use super::text_recognizer::TesseractRecognizer;
use super::video_reader::FrameSource;
use super::video_reader::VideoReader;
use super::vote::VoteTally;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlateResult {
    Found(String),
    NotFound,
}

impl PlateResult {
    pub fn plate(&self) -> Option<&str> {
        match self {
            PlateResult::Found(text) => Some(text.as_str()),
            PlateResult::NotFound => None,
        }
    }
}

impl fmt::Display for PlateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlateResult::Found(text) => write!(f, "{}", text),
            PlateResult::NotFound => write!(f, "None"),
        }
    }
}

/// Outcome of reading one video.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReport {
    pub video: String,
    pub result: PlateResult,
    pub sampled_frames: usize,
    pub votes: usize,
}

/// Video in, plate out. Detection and recognition are shared by every caller
/// through this type.
pub struct VideoPlateProcessor<F> {
    scheduler: FrameJobScheduler<F>,
}

impl VideoPlateProcessor<Box<dyn Fn() -> Result<TesseractRecognizer, PlateError> + Send + Sync>> {
    /// A processor whose workers each own a Tesseract engine built from
    /// `config.recognizer`.
    pub fn with_tesseract(config: &ReaderConfig) -> Self {
        let recognizer_config = config.recognizer.clone();
        let factory: Box<dyn Fn() -> Result<TesseractRecognizer, PlateError> + Send + Sync> =
            Box::new(move || TesseractRecognizer::new(&recognizer_config));
        Self::new(config, factory)
    }
}

impl<F> VideoPlateProcessor<F>
where
    F: RecognizerFactory + 'static,
{
    pub fn new(config: &ReaderConfig, factory: F) -> Self {
        let detector = PlateDetector::new(config.detector.clone());
        Self {
            scheduler: FrameJobScheduler::new(config.pool.clone(), detector, factory),
        }
    }

    pub fn process_path(&self, path: &Path) -> Result<PlateReport, PlateError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let source = match VideoReader::open(path) {
            Ok(source) => source,
            Err(err) => {
                metrics::VIDEOS_PROCESSED
                    .with_label_values(&["unreadable"])
                    .inc();
                return Err(err);
            }
        };
        log::info!("processing {}", name);
        self.process_source(&name, source)
    }

    /// Drains `source` through the pool, releases it, then votes.
    pub fn process_source<S: FrameSource>(
        &self,
        video: &str,
        mut source: S,
    ) -> Result<PlateReport, PlateError> {
        let metadata = source.metadata();
        let scheduled = self.scheduler.run(&mut source);
        source.release();
        let summary = scheduled?;

        log::debug!(
            "{}: {} frames decoded (container reports {:?} at {:?} fps), {} sampled, {} completed",
            video,
            summary.decoded,
            metadata.frame_count,
            metadata.fps,
            summary.submitted,
            summary.completed
        );

        let report = build_report(video, &summary);
        let outcome = match report.result {
            PlateResult::Found(_) => "found",
            PlateResult::NotFound => "not_found",
        };
        metrics::VIDEOS_PROCESSED.with_label_values(&[outcome]).inc();
        log::info!("{}: license plate {}", video, report.result);
        Ok(report)
    }
}

fn build_report(video: &str, summary: &ScheduleSummary) -> PlateReport {
    let mut tally = VoteTally::new();
    for (text, frame_index) in summary.votes() {
        tally.record(text, frame_index);
    }

    let result = match tally.winner() {
        Ok(plate) => PlateResult::Found(plate.to_string()),
        Err(PlateError::NoPlateDetected) => PlateResult::NotFound,
        Err(err) => {
            log::warn!("{}: vote failed: {}", video, err);
            PlateResult::NotFound
        }
    };

    PlateReport {
        video: video.to_string(),
        result,
        sampled_frames: summary.submitted,
        votes: tally.total_votes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate_detection::scheduler::FrameOutcome;
    use crate::plate_detection::scheduler::FrameReading;

    fn reading(frame_index: u64, outcome: FrameOutcome) -> FrameReading {
        FrameReading {
            frame_index,
            outcome,
        }
    }

    #[test]
    fn report_picks_majority() {
        let summary = ScheduleSummary {
            decoded: 35,
            submitted: 3,
            completed: 3,
            abandoned: 0,
            readings: vec![
                reading(20, FrameOutcome::Plate("ABC123".into())),
                reading(10, FrameOutcome::Plate("XYZ999".into())),
                reading(30, FrameOutcome::Plate("ABC123".into())),
            ],
        };
        let report = build_report("001.mp4", &summary);
        assert_eq!(report.result, PlateResult::Found("ABC123".into()));
        assert_eq!(report.votes, 3);
        assert_eq!(report.sampled_frames, 3);
    }

    #[test]
    fn report_without_votes_is_not_found() {
        let summary = ScheduleSummary {
            decoded: 20,
            submitted: 2,
            completed: 2,
            abandoned: 0,
            readings: vec![
                reading(10, FrameOutcome::NoCandidate),
                reading(20, FrameOutcome::NoText),
            ],
        };
        let report = build_report("002.mp4", &summary);
        assert_eq!(report.result, PlateResult::NotFound);
        assert_eq!(report.result.plate(), None);
        assert_eq!(report.result.to_string(), "None");
    }

    #[test]
    fn missing_video_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let processor = VideoPlateProcessor::with_tesseract(&ReaderConfig::default());
        let err = processor
            .process_path(&dir.path().join("absent.mp4"))
            .unwrap_err();
        assert!(matches!(err, PlateError::UnreadableVideo { .. }));
    }
}

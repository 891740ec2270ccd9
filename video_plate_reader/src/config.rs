use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::PlateError;

pub const CONFIG_ENV: &str = "PLATE_READER_CONFIG";

const DEFAULT_WORKING_WIDTH: i32 = 620;
const DEFAULT_BILATERAL_DIAMETER: i32 = 11;
const DEFAULT_BILATERAL_SIGMA: f64 = 17.0;
const DEFAULT_CANNY_LOW: f64 = 30.0;
const DEFAULT_CANNY_HIGH: f64 = 200.0;
const DEFAULT_MAX_CONTOURS: usize = 10;
const DEFAULT_APPROX_RATIO: f64 = 0.018;

const DEFAULT_WORKERS: usize = 12;
const DEFAULT_FRAME_SKIP: u64 = 10;

const DEFAULT_LANGUAGE: &str = "eng";
const DEFAULT_ENGINE_MODE: u32 = 1;
const DEFAULT_PAGE_SEG_MODE: u32 = 7;

/// Geometric tuning of the plate candidate search.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub working_width: i32,
    pub bilateral_diameter: i32,
    pub sigma_color: f64,
    pub sigma_space: f64,
    pub canny_low: f64,
    pub canny_high: f64,
    pub max_contours: usize,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            working_width: DEFAULT_WORKING_WIDTH,
            bilateral_diameter: DEFAULT_BILATERAL_DIAMETER,
            sigma_color: DEFAULT_BILATERAL_SIGMA,
            sigma_space: DEFAULT_BILATERAL_SIGMA,
            canny_low: DEFAULT_CANNY_LOW,
            canny_high: DEFAULT_CANNY_HIGH,
            max_contours: DEFAULT_MAX_CONTOURS,
            approx_ratio: DEFAULT_APPROX_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub workers: usize,
    /// Every `frame_skip`-th decoded frame is sampled.
    pub frame_skip: u64,
    /// Longest wait for the next task completion before the rest are abandoned.
    pub task_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            frame_skip: DEFAULT_FRAME_SKIP,
            task_timeout: None,
        }
    }
}

/// Tesseract options applied to every per-worker engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerConfig {
    pub data_path: Option<PathBuf>,
    pub language: String,
    pub engine_mode: u32,
    pub page_seg_mode: Option<u32>,
    pub char_whitelist: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            language: DEFAULT_LANGUAGE.to_string(),
            engine_mode: DEFAULT_ENGINE_MODE,
            page_seg_mode: Some(DEFAULT_PAGE_SEG_MODE),
            char_whitelist: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderConfig {
    pub detector: DetectorConfig,
    pub pool: PoolConfig,
    pub recognizer: RecognizerConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ReaderConfigFile {
    detector: Option<DetectorConfigFile>,
    pool: Option<PoolConfigFile>,
    recognizer: Option<RecognizerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    working_width: Option<i32>,
    bilateral_diameter: Option<i32>,
    sigma_color: Option<f64>,
    sigma_space: Option<f64>,
    canny_low: Option<f64>,
    canny_high: Option<f64>,
    max_contours: Option<usize>,
    approx_ratio: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PoolConfigFile {
    workers: Option<usize>,
    frame_skip: Option<u64>,
    task_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RecognizerConfigFile {
    data_path: Option<PathBuf>,
    language: Option<String>,
    engine_mode: Option<u32>,
    page_seg_mode: Option<u32>,
    char_whitelist: Option<String>,
}

impl ReaderConfig {
    /// Loads the file named by `path`, or by `PLATE_READER_CONFIG` when no path
    /// is given. With neither, the defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self, PlateError> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let path = path.map(Path::to_path_buf).or(env_path);
        let cfg = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|err| {
                    PlateError::Config(format!("read {}: {}", path.display(), err))
                })?;
                log::info!("loading configuration from {}", path.display());
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, PlateError> {
        let file: ReaderConfigFile =
            toml::from_str(raw).map_err(|err| PlateError::Config(err.to_string()))?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ReaderConfigFile) -> Self {
        let d = file.detector.unwrap_or_default();
        let p = file.pool.unwrap_or_default();
        let r = file.recognizer.unwrap_or_default();
        let defaults = Self::default();

        Self {
            detector: DetectorConfig {
                working_width: d.working_width.unwrap_or(defaults.detector.working_width),
                bilateral_diameter: d
                    .bilateral_diameter
                    .unwrap_or(defaults.detector.bilateral_diameter),
                sigma_color: d.sigma_color.unwrap_or(defaults.detector.sigma_color),
                sigma_space: d.sigma_space.unwrap_or(defaults.detector.sigma_space),
                canny_low: d.canny_low.unwrap_or(defaults.detector.canny_low),
                canny_high: d.canny_high.unwrap_or(defaults.detector.canny_high),
                max_contours: d.max_contours.unwrap_or(defaults.detector.max_contours),
                approx_ratio: d.approx_ratio.unwrap_or(defaults.detector.approx_ratio),
            },
            pool: PoolConfig {
                workers: p.workers.unwrap_or(defaults.pool.workers),
                frame_skip: p.frame_skip.unwrap_or(defaults.pool.frame_skip),
                task_timeout: p.task_timeout_ms.map(Duration::from_millis),
            },
            recognizer: RecognizerConfig {
                data_path: r.data_path.or(defaults.recognizer.data_path),
                language: r.language.unwrap_or(defaults.recognizer.language),
                engine_mode: r.engine_mode.unwrap_or(defaults.recognizer.engine_mode),
                page_seg_mode: r.page_seg_mode.or(defaults.recognizer.page_seg_mode),
                char_whitelist: r.char_whitelist.or(defaults.recognizer.char_whitelist),
            },
        }
    }

    pub fn validate(&self) -> Result<(), PlateError> {
        if self.pool.workers == 0 {
            return Err(PlateError::Config("pool.workers must be at least 1".into()));
        }
        if self.pool.frame_skip == 0 {
            return Err(PlateError::Config(
                "pool.frame_skip must be at least 1".into(),
            ));
        }
        if self.detector.working_width <= 0 {
            return Err(PlateError::Config(
                "detector.working_width must be positive".into(),
            ));
        }
        if self.detector.approx_ratio <= 0.0 {
            return Err(PlateError::Config(
                "detector.approx_ratio must be positive".into(),
            ));
        }
        if self.detector.canny_low > self.detector.canny_high {
            return Err(PlateError::Config(
                "detector.canny_low must not exceed detector.canny_high".into(),
            ));
        }
        if self.recognizer.language.trim().is_empty() {
            return Err(PlateError::Config("recognizer.language is empty".into()));
        }
        Ok(())
    }
}

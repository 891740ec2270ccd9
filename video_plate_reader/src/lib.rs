pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod plate_detection;
pub mod report;

pub use config::ReaderConfig;
pub use error::PlateError;
pub use plate_detection::processor::PlateReport;
pub use plate_detection::processor::PlateResult;
pub use plate_detection::processor::VideoPlateProcessor;

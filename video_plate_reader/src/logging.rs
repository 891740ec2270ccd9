use std::fs::OpenOptions;
use std::path::Path;

use crate::error::PlateError;

/// Installs the global logger. `RUST_LOG` overrides the `info` default; with a
/// `log_file` the output is appended there instead of stderr.
pub fn init(log_file: Option<&Path>) -> Result<(), PlateError> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder
        .try_init()
        .map_err(|err| PlateError::Config(format!("logger already installed: {}", err)))
}

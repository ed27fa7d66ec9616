use std::fs::OpenOptions;
use std::sync::Mutex;

use gifgrab_core::LoggingSection;
use tracing_subscriber::EnvFilter;

use crate::{AppError, Result};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingSection) -> Result<()> {
    let filter = build_filter(logging)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| AppError::Logging(err.to_string()))
}

fn build_filter(logging: &LoggingSection) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|err| AppError::Logging(format!("invalid log level {:?}: {err}", logging.level)))
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("could not open media {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("gif encoding failed: {0}")]
    Encode(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl TranscodeError {
    pub fn is_file_access(&self) -> bool {
        matches!(self, TranscodeError::Io { .. })
    }
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;

use std::path::PathBuf;

use thiserror::Error;

use crate::transcode::TranscodeError;

use super::state::{RunEvent, RunState};
use super::types::FailureKind;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no url supplied")]
    EmptyUrl,
    #[error("unsupported platform for {url}")]
    UnsupportedPlatform { url: String },
    #[error("downloader exited with status {exit_code:?}")]
    DownloadFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("download artifact missing at {path}")]
    ArtifactMissing { path: PathBuf },
    #[error("download artifact at {path} is empty")]
    ArtifactEmpty { path: PathBuf },
    #[error("{0}")]
    Processing(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("save prompt was dropped without an answer")]
    PromptAbandoned,
    #[error("background task failed: {0}")]
    Task(String),
    #[error("illegal transition from {state:?} on {event:?}")]
    IllegalTransition { state: RunState, event: RunEvent },
}

impl WorkflowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkflowError::EmptyUrl | WorkflowError::UnsupportedPlatform { .. } => {
                FailureKind::Input
            }
            WorkflowError::DownloadFailed { .. }
            | WorkflowError::ArtifactMissing { .. }
            | WorkflowError::ArtifactEmpty { .. } => FailureKind::Download,
            WorkflowError::Processing(_) => FailureKind::Processing,
            WorkflowError::Io { .. } => FailureKind::FileAccess,
            WorkflowError::Spawn { .. }
            | WorkflowError::PromptAbandoned
            | WorkflowError::Task(_)
            | WorkflowError::IllegalTransition { .. } => FailureKind::Unexpected,
        }
    }

    /// Short text shown on the interactive surface. Diagnostics stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::EmptyUrl => "Error: Please paste a URL first.".to_string(),
            WorkflowError::UnsupportedPlatform { .. } => {
                "Error: Unsupported platform. Please use Twitter/X, Pinterest, or Instagram URLs."
                    .to_string()
            }
            WorkflowError::DownloadFailed { .. } => {
                "Error: Download failed. Check console.".to_string()
            }
            WorkflowError::ArtifactMissing { .. } => "Error: Download file not found.".to_string(),
            WorkflowError::ArtifactEmpty { .. } => "Error: Downloaded file is empty.".to_string(),
            WorkflowError::Processing(reason) => format!("Error processing video: {reason}"),
            WorkflowError::Io { .. } => "Error accessing files.".to_string(),
            other => format!("An unexpected error occurred: {other}"),
        }
    }
}

impl From<TranscodeError> for WorkflowError {
    fn from(error: TranscodeError) -> Self {
        match error {
            TranscodeError::Io { source, path } => WorkflowError::Io { source, path },
            other => WorkflowError::Processing(other.to_string()),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_problems_share_a_class_but_not_a_message() {
        let failed = WorkflowError::DownloadFailed {
            exit_code: Some(1),
            stderr: "ERROR: Unsupported URL".into(),
        };
        let missing = WorkflowError::ArtifactMissing {
            path: PathBuf::from("/tmp/download.mp4"),
        };
        assert_eq!(failed.kind(), FailureKind::Download);
        assert_eq!(missing.kind(), FailureKind::Download);
        assert_ne!(failed.user_message(), missing.user_message());
    }

    #[test]
    fn transcode_errors_split_into_processing_and_file_access() {
        let processing: WorkflowError = TranscodeError::Encode("bad codec".into()).into();
        assert_eq!(processing.kind(), FailureKind::Processing);
        assert_eq!(
            processing.user_message(),
            "Error processing video: gif encoding failed: bad codec"
        );

        let access: WorkflowError = TranscodeError::Io {
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            path: PathBuf::from("/locked/out.gif"),
        }
        .into();
        assert_eq!(access.kind(), FailureKind::FileAccess);
        assert_eq!(access.user_message(), "Error accessing files.");
    }

    #[test]
    fn unexpected_errors_carry_their_text() {
        let err = WorkflowError::Task("worker panicked".into());
        assert_eq!(err.kind(), FailureKind::Unexpected);
        assert_eq!(
            err.user_message(),
            "An unexpected error occurred: background task failed: worker panicked"
        );
    }
}

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::platform::Platform;

use super::state::RunState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    #[default]
    #[serde(rename = "gif")]
    Gif,
    #[serde(rename = "mp4")]
    Video,
}

impl OutputMode {
    pub fn extension(self) -> &'static str {
        match self {
            OutputMode::Gif => "gif",
            OutputMode::Video => "mp4",
        }
    }

    pub fn filter_label(self) -> &'static str {
        match self {
            OutputMode::Gif => "GIF files",
            OutputMode::Video => "MP4 files",
        }
    }

    /// Parses the value stored in the preferences file.
    pub fn from_preference(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gif" => Some(OutputMode::Gif),
            "mp4" => Some(OutputMode::Video),
            _ => None,
        }
    }

    pub fn as_preference(self) -> &'static str {
        self.extension()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    pub source_url: String,
    pub mode: OutputMode,
    pub initial_dir: Option<PathBuf>,
}

impl WorkflowRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            mode: OutputMode::Gif,
            initial_dir: None,
        }
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_initial_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.initial_dir = Some(dir.into());
        self
    }
}

/// Answer to a save prompt. `None` means the user cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveTarget {
    pub destination: Option<PathBuf>,
}

impl SaveTarget {
    pub fn chosen(path: impl Into<PathBuf>) -> Self {
        Self {
            destination: Some(path.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavePrompt {
    pub title: String,
    pub suggested_name: String,
    pub extension: String,
    pub filter_label: String,
    pub initial_dir: Option<PathBuf>,
}

impl SavePrompt {
    pub fn new(platform: Platform, identifier: &str, mode: OutputMode) -> Self {
        let title = match mode {
            OutputMode::Gif => format!("Save {platform} GIF"),
            OutputMode::Video => format!("Save {platform} video"),
        };
        Self {
            title,
            suggested_name: format!("{identifier}.{}", mode.extension()),
            extension: mode.extension().to_string(),
            filter_label: mode.filter_label().to_string(),
            initial_dir: None,
        }
    }

    pub fn suggested_path(&self) -> PathBuf {
        match &self.initial_dir {
            Some(dir) => dir.join(&self.suggested_name),
            None => PathBuf::from(&self.suggested_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Neutral,
    Success,
    Error,
}

impl Severity {
    pub fn color(self) -> &'static str {
        match self {
            Severity::Info => "white",
            Severity::Neutral => "gray",
            Severity::Success => "green",
            Severity::Error => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Input,
    Download,
    Processing,
    FileAccess,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Succeeded {
        output: PathBuf,
    },
    Cancelled,
    Failed {
        kind: FailureKind,
        reason: String,
        detail: String,
    },
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Succeeded { .. })
    }

    pub fn severity(&self) -> Severity {
        match self {
            WorkflowOutcome::Succeeded { .. } => Severity::Success,
            WorkflowOutcome::Cancelled => Severity::Neutral,
            WorkflowOutcome::Failed { .. } => Severity::Error,
        }
    }

    /// Text reported to the surface when the run ends.
    pub fn message(&self, mode: OutputMode) -> String {
        match self {
            WorkflowOutcome::Succeeded { output } => {
                let name = display_name(output);
                match mode {
                    OutputMode::Gif => format!("Success! Saved as {name}"),
                    OutputMode::Video => format!("Success! Video saved as {name}"),
                }
            }
            WorkflowOutcome::Cancelled => "Download cancelled.".to_string(),
            WorkflowOutcome::Failed { reason, .. } => reason.clone(),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source_url: String,
    pub platform: Platform,
    pub mode: OutputMode,
    pub frame_rate: Option<u32>,
    pub states: Vec<RunState>,
    pub outcome: WorkflowOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn final_state(&self) -> Option<RunState> {
        self.states.last().copied()
    }
}

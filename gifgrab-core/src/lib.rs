pub mod config;
pub mod error;
pub mod metadata;
pub mod platform;
pub mod preferences;
pub mod process;
pub mod status;
pub mod transcode;
pub mod workflow;

pub use config::{
    load_app_config, AppConfig, DownloaderSection, LoggingSection, TranscoderSection,
    WorkflowSection, DEFAULT_GIF_FPS,
};
pub use error::{ConfigError, Result};
pub use metadata::{parse_probe_output, MetadataFetcher, VideoMetadata};
pub use platform::{extract_id, Platform, FALLBACK_ID};
pub use preferences::{PreferenceStore, Preferences};
pub use process::{locate, CommandExecutor, ProcessOutput, SystemCommandExecutor};
pub use status::{ui_channel, InteractiveLoop, InteractiveSurface, StatusReporter, UiEvent};
pub use transcode::{convert, ClipGuard, FfmpegTranscoder, MediaClip, TranscodeError, Transcoder};
pub use workflow::{
    Dispatch, FailureKind, Orchestrator, OutputMode, RunHandle, RunReport, RunState, SavePrompt,
    SaveTarget, Severity, WorkflowError, WorkflowOutcome, WorkflowRequest,
};

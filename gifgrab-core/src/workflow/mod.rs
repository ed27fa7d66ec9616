mod artifact;
mod error;
mod state;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::metadata::MetadataFetcher;
use crate::platform::Platform;
use crate::process::{CommandExecutor, SystemCommandExecutor};
use crate::status::{StatusReporter, UiSender};
use crate::transcode::{self, FfmpegTranscoder, Transcoder};

pub use artifact::{
    ensure_downloaded, inspect_file, ArtifactState, DownloadArtifact, ARTIFACT_FILE_NAME,
};
pub use error::{WorkflowError, WorkflowResult};
pub use state::{transition, RunEvent, RunState, StateTracker};
pub use types::{
    FailureKind, OutputMode, RunReport, SavePrompt, SaveTarget, Severity, WorkflowOutcome,
    WorkflowRequest,
};

const PROGRESS_FETCHING: f32 = 0.2;
const PROGRESS_INFO_RESOLVED: f32 = 0.4;
const PROGRESS_TARGET_CHOSEN: f32 = 0.6;
const PROGRESS_CONVERTING: f32 = 0.8;
const PROGRESS_DONE: f32 = 1.0;

#[derive(Clone)]
struct RunContext {
    fetcher: MetadataFetcher,
    executor: Arc<dyn CommandExecutor>,
    transcoder: Arc<dyn Transcoder>,
    downloader: PathBuf,
    fetch_format: String,
    temp_root: PathBuf,
}

/// Turns triggers from the interactive surface into background runs.
///
/// The surface is expected to disable its trigger while a run is in flight, but
/// nothing here depends on it: every run downloads into its own temporary
/// directory, so overlapping runs do not collide.
#[derive(Clone)]
pub struct Orchestrator {
    context: Arc<RunContext>,
    strict_platforms: bool,
    ui: UiSender,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, ui: UiSender) -> Self {
        let executor: Arc<dyn CommandExecutor> = Arc::new(SystemCommandExecutor);
        let transcoder = Arc::new(FfmpegTranscoder::new(
            &config.transcoder,
            Arc::clone(&executor),
        ));
        Self::with_components(config, executor, transcoder, ui)
    }

    pub fn with_components(
        config: &AppConfig,
        executor: Arc<dyn CommandExecutor>,
        transcoder: Arc<dyn Transcoder>,
        ui: UiSender,
    ) -> Self {
        let fetcher = MetadataFetcher::new(
            &config.downloader,
            config.transcoder.default_fps,
            Arc::clone(&executor),
        );
        let context = RunContext {
            fetcher,
            executor,
            transcoder,
            downloader: config.downloader.binary.clone(),
            fetch_format: config.downloader.fetch_format.clone(),
            temp_root: config.temp_root(),
        };
        Self {
            context: Arc::new(context),
            strict_platforms: config.workflow.strict_platforms,
            ui,
        }
    }

    /// Frame rate used whenever the probe cannot tell.
    pub fn with_default_fps(mut self, fps: u32) -> Self {
        let context = Arc::make_mut(&mut self.context);
        context.fetcher = context.fetcher.clone().with_default_fps(fps.max(1));
        self
    }

    /// Validates the request on the caller's thread and, if it is acceptable,
    /// hands the rest of the run to a background task. Must be called from
    /// within a tokio runtime.
    pub fn trigger(&self, request: WorkflowRequest) -> Dispatch {
        let run_id = Uuid::new_v4();
        let platform = Platform::detect(&request.source_url);
        let mut run = Run {
            id: run_id,
            platform,
            reporter: StatusReporter::new(run_id, self.ui.clone()),
            tracker: StateTracker::new(),
            context: Arc::clone(&self.context),
            frame_rate: None,
            started_at: Utc::now(),
            request,
        };

        if run.request.source_url.trim().is_empty() {
            return Dispatch::Rejected(run.reject(WorkflowError::EmptyUrl));
        }
        if self.strict_platforms && !platform.is_supported() {
            let url = run.request.source_url.clone();
            return Dispatch::Rejected(run.reject(WorkflowError::UnsupportedPlatform { url }));
        }

        run.advance(RunEvent::Triggered);
        run.sync_trigger();
        run.reporter.progress(0.0);
        run.reporter.report("Fetching video info...", Severity::Info);
        info!(
            run_id = %run_id,
            url = %run.request.source_url,
            platform = %platform,
            mode = ?run.request.mode,
            "run started"
        );

        let task = tokio::spawn(run.execute());
        Dispatch::Started(RunHandle { run_id, task })
    }
}

#[derive(Debug)]
pub enum Dispatch {
    /// Refused before any background work started.
    Rejected(RunReport),
    Started(RunHandle),
}

impl Dispatch {
    pub fn run_id(&self) -> Uuid {
        match self {
            Dispatch::Rejected(report) => report.run_id,
            Dispatch::Started(handle) => handle.run_id,
        }
    }

    /// Resolves to the final report, waiting for the background run if there is one.
    pub async fn report(self) -> WorkflowResult<RunReport> {
        match self {
            Dispatch::Rejected(report) => Ok(report),
            Dispatch::Started(handle) => handle.wait().await,
        }
    }
}

#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn wait(self) -> WorkflowResult<RunReport> {
        self.task
            .await
            .map_err(|err| WorkflowError::Task(err.to_string()))
    }
}

struct Run {
    id: Uuid,
    request: WorkflowRequest,
    platform: Platform,
    reporter: StatusReporter,
    tracker: StateTracker,
    context: Arc<RunContext>,
    frame_rate: Option<u32>,
    started_at: DateTime<Utc>,
}

impl Run {
    async fn execute(mut self) -> RunReport {
        self.reporter.progress(PROGRESS_FETCHING);
        let outcome = self.drive().await;
        self.conclude(outcome)
    }

    fn reject(mut self, err: WorkflowError) -> RunReport {
        warn!(run_id = %self.id, url = %self.request.source_url, error = %err, "request rejected");
        self.advance(RunEvent::Rejected);
        let outcome = self.failure(err);
        self.reporter
            .report(outcome.message(self.request.mode), outcome.severity());
        let report = self.build_report(outcome);
        self.reporter.finish(report.clone());
        report
    }

    async fn drive(&mut self) -> WorkflowOutcome {
        let destination = match self.resolve_target().await {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                self.advance(RunEvent::Declined);
                info!(run_id = %self.id, "save prompt declined");
                return WorkflowOutcome::Cancelled;
            }
            Err(err) => {
                self.advance(RunEvent::Failed);
                return self.failure(err);
            }
        };

        self.advance(RunEvent::TargetChosen);
        self.reporter.progress(PROGRESS_TARGET_CHOSEN);
        let result = match self.request.mode {
            OutputMode::Gif => {
                let fps = self.frame_rate.unwrap_or(self.context.fetcher.default_fps());
                self.reporter.report(
                    format!("Downloading for conversion at {fps} FPS..."),
                    Severity::Info,
                );
                self.produce_gif(&destination, fps).await
            }
            OutputMode::Video => {
                self.reporter.report("Downloading video...", Severity::Info);
                self.produce_video(&destination).await
            }
        };
        self.advance(RunEvent::CleanedUp {
            succeeded: result.is_ok(),
        });

        match result {
            Ok(()) => WorkflowOutcome::Succeeded {
                output: destination,
            },
            Err(err) => self.failure(err),
        }
    }

    async fn resolve_target(&mut self) -> WorkflowResult<Option<PathBuf>> {
        let fetcher = self.context.fetcher.clone();
        let url = self.request.source_url.trim().to_string();
        let metadata = tokio::spawn(async move { fetcher.fetch(&url).await })
            .await
            .map_err(|err| WorkflowError::Task(err.to_string()))?;
        let identifier = self.platform.extract_id(&self.request.source_url);
        self.frame_rate = Some(metadata.frame_rate);
        info!(
            run_id = %self.id,
            identifier = %identifier,
            frame_rate = metadata.frame_rate,
            detected = metadata.detected,
            "video info resolved"
        );
        self.advance(RunEvent::InfoResolved);
        self.reporter.progress(PROGRESS_INFO_RESOLVED);

        let mut prompt = SavePrompt::new(self.platform, &identifier, self.request.mode);
        prompt.initial_dir = self.request.initial_dir.clone();
        let target = self.reporter.request_save_target(prompt).await?;
        Ok(target.destination)
    }

    async fn produce_gif(&mut self, destination: &Path, fps: u32) -> WorkflowResult<()> {
        let artifact = match DownloadArtifact::create(&self.context.temp_root, self.id) {
            Ok(artifact) => artifact,
            Err(err) => {
                self.advance(RunEvent::DownloadFailed);
                return Err(err);
            }
        };
        let result = self.download_and_convert(&artifact, destination, fps).await;
        // the media handle is already closed here
        artifact.cleanup();
        result
    }

    async fn download_and_convert(
        &mut self,
        artifact: &DownloadArtifact,
        destination: &Path,
        fps: u32,
    ) -> WorkflowResult<()> {
        let downloaded = match self.download(artifact.path()).await {
            Ok(()) => ensure_downloaded(artifact.path()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = downloaded {
            self.advance(RunEvent::DownloadFailed);
            return Err(err);
        }
        self.advance(RunEvent::DownloadCompleted { convert: true });
        self.reporter
            .report(format!("Converting to GIF at {fps} FPS..."), Severity::Info);
        self.reporter.progress(PROGRESS_CONVERTING);

        let transcoder = Arc::clone(&self.context.transcoder);
        let input = artifact.path().to_path_buf();
        let output = destination.to_path_buf();
        let result = tokio::spawn(async move {
            transcode::convert(transcoder.as_ref(), &input, &output, fps).await
        })
        .await
        .map_err(|err| WorkflowError::Task(err.to_string()))
        .and_then(|converted| converted.map_err(WorkflowError::from));

        self.advance(if result.is_ok() {
            RunEvent::ConversionFinished
        } else {
            RunEvent::ConversionFailed
        });
        result
    }

    async fn produce_video(&mut self, destination: &Path) -> WorkflowResult<()> {
        let downloaded = match self.download(destination).await {
            Ok(()) => ensure_downloaded(destination).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.advance(match downloaded {
            Ok(()) => RunEvent::DownloadCompleted { convert: false },
            Err(_) => RunEvent::DownloadFailed,
        });
        downloaded
    }

    fn download_args(&self, output: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(format) = self.platform.fetch_format(&self.context.fetch_format) {
            args.push("-f".to_string());
            args.push(format);
        }
        args.extend([
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "--force-overwrites".to_string(),
            self.request.source_url.trim().to_string(),
        ]);
        args
    }

    async fn download(&self, output: &Path) -> WorkflowResult<()> {
        let executor = Arc::clone(&self.context.executor);
        let program = self.context.downloader.clone();
        let args = self.download_args(output);
        info!(run_id = %self.id, output = %output.display(), "download started");

        let spawned = program.clone();
        let result = tokio::spawn(async move { executor.run(&spawned, &args).await })
            .await
            .map_err(|err| WorkflowError::Task(err.to_string()))?
            .map_err(|source| WorkflowError::Spawn { program, source })?;

        if !result.success() {
            error!(
                run_id = %self.id,
                exit_code = ?result.exit_code,
                stderr = %result.stderr.trim(),
                "download failed"
            );
            return Err(WorkflowError::DownloadFailed {
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(())
    }

    fn advance(&mut self, event: RunEvent) {
        if let Err(err) = self.tracker.apply(event) {
            error!(run_id = %self.id, error = %err, "run state machine violated");
        }
    }

    /// The trigger follows the state machine: disabled while in flight, enabled once terminal.
    fn sync_trigger(&self) {
        self.reporter
            .set_trigger_enabled(self.tracker.current().trigger_enabled());
    }

    fn failure(&self, err: WorkflowError) -> WorkflowOutcome {
        let kind = err.kind();
        match kind {
            FailureKind::Unexpected => {
                error!(run_id = %self.id, error = ?err, "run failed unexpectedly")
            }
            _ => warn!(run_id = %self.id, kind = ?kind, error = %err, "run failed"),
        }
        WorkflowOutcome::Failed {
            kind,
            reason: err.user_message(),
            detail: err.to_string(),
        }
    }

    fn conclude(self, outcome: WorkflowOutcome) -> RunReport {
        self.reporter.progress(if outcome.is_success() {
            PROGRESS_DONE
        } else {
            0.0
        });
        self.reporter
            .report(outcome.message(self.request.mode), outcome.severity());
        self.sync_trigger();
        let report = self.build_report(outcome);
        info!(
            run_id = %report.run_id,
            state = ?report.final_state(),
            "run finished"
        );
        self.reporter.finish(report.clone());
        report
    }

    fn build_report(&self, outcome: WorkflowOutcome) -> RunReport {
        RunReport {
            run_id: self.id,
            source_url: self.request.source_url.clone(),
            platform: self.platform,
            mode: self.request.mode,
            frame_rate: self.frame_rate,
            states: self.tracker.visited().to_vec(),
            outcome,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

mod logging;
mod surface;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gifgrab_core::status::UiReceiver;
use gifgrab_core::{
    load_app_config, locate, ui_channel, AppConfig, CommandExecutor, InteractiveLoop,
    InteractiveSurface, MetadataFetcher, Orchestrator, OutputMode, Platform, PreferenceStore,
    RunReport, SavePrompt, SystemCommandExecutor, WorkflowOutcome, WorkflowRequest,
};
use serde::Serialize;
use thiserror::Error;

pub use logging::init_tracing;
pub use surface::TerminalSurface;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] gifgrab_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("workflow error: {0}")]
    Workflow(#[from] gifgrab_core::WorkflowError),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("{0}")]
    RunFailed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Download social media videos and convert them to GIFs", long_about = None)]
pub struct Cli {
    /// Path to gifgrab.toml; built-in defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Path to the preferences file (defaults to ~/.gifgrab.toml)
    #[arg(long)]
    pub preferences: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a post and convert it to a GIF (or keep the video)
    Grab(GrabArgs),
    /// Show what would be downloaded without fetching the payload
    Probe(ProbeArgs),
    /// Inspect or change saved preferences
    #[command(subcommand)]
    Prefs(PrefsCommands),
    /// Check that the external tools can be found
    Doctor,
}

#[derive(Args, Debug)]
pub struct GrabArgs {
    /// Post URL (Twitter/X, Pinterest, Instagram)
    pub url: String,
    /// Keep the downloaded video instead of converting it
    #[arg(long, conflicts_with = "gif")]
    pub video: bool,
    /// Convert to GIF even when mp4 is the preferred format
    #[arg(long)]
    pub gif: bool,
    /// Destination file; skips the save prompt
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    pub url: String,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommands {
    /// Print current preferences
    Show,
    /// Directory the save prompt starts in
    SetSaveDir { dir: PathBuf },
    /// Preferred output format (gif or mp4)
    SetFormat { format: String },
    /// Fallback frame rate, clamped to 1..=60
    SetFps {
        #[arg(allow_negative_numbers = true)]
        fps: i64,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_app_config(path)?,
        None => AppConfig::default(),
    };
    init_tracing(&config.logging)?;
    execute(&cli, &config).await
}

async fn execute(cli: &Cli, config: &AppConfig) -> Result<()> {
    match &cli.command {
        Commands::Grab(args) => {
            let store = PreferenceStore::open(preferences_path(cli)?);
            let report = grab(config, &store, args).await?;
            render(&report, cli.format)?;
            if let WorkflowOutcome::Failed { reason, .. } = &report.outcome {
                return Err(AppError::RunFailed(reason.clone()));
            }
        }
        Commands::Probe(args) => {
            let store = PreferenceStore::open(preferences_path(cli)?);
            let executor: Arc<dyn CommandExecutor> = Arc::new(SystemCommandExecutor);
            let report = probe(config, store.fps(), executor, &args.url).await;
            render(&report, cli.format)?;
        }
        Commands::Prefs(command) => {
            let mut store = PreferenceStore::open(preferences_path(cli)?);
            let view = prefs(&mut store, command)?;
            render(&view, cli.format)?;
        }
        Commands::Doctor => {
            let checks = doctor(config);
            render(&checks, cli.format)?;
            if checks.iter().any(|check| check.resolved.is_none()) {
                return Err(AppError::MissingResource(
                    "one or more tools could not be found".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn preferences_path(cli: &Cli) -> Result<PathBuf> {
    cli.preferences
        .clone()
        .or_else(PreferenceStore::default_path)
        .ok_or_else(|| AppError::MissingResource("home directory".to_string()))
}

fn resolve_mode(args: &GrabArgs, store: &PreferenceStore) -> OutputMode {
    if args.video {
        OutputMode::Video
    } else if args.gif {
        OutputMode::Gif
    } else {
        store.output_mode()
    }
}

async fn grab(config: &AppConfig, store: &PreferenceStore, args: &GrabArgs) -> Result<RunReport> {
    let (sender, receiver) = ui_channel();
    let orchestrator = Orchestrator::new(config, sender).with_default_fps(store.fps());
    let mut request = WorkflowRequest::new(args.url.clone()).with_mode(resolve_mode(args, store));
    if let Some(dir) = store.default_save_location() {
        request = request.with_initial_dir(dir);
    }
    let surface = TerminalSurface::new(args.output.clone());
    let (report, _) = drive(&orchestrator, receiver, request, surface).await?;
    Ok(report)
}

/// Triggers one run and services its events on the calling task until it ends.
pub async fn drive<S: InteractiveSurface>(
    orchestrator: &Orchestrator,
    receiver: UiReceiver,
    request: WorkflowRequest,
    surface: S,
) -> Result<(RunReport, S)> {
    let dispatch = orchestrator.trigger(request);
    let mut ui = InteractiveLoop::new(surface, receiver);
    if ui.run_until_finished().await.is_none() {
        return Err(AppError::MissingResource(
            "run ended without a report".to_string(),
        ));
    }
    let report = dispatch.report().await?;
    Ok((report, ui.into_surface()))
}

#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub platform: Platform,
    pub identifier: String,
    pub frame_rate: u32,
    pub detected: bool,
    pub suggested_name: String,
}

pub async fn probe(
    config: &AppConfig,
    default_fps: u32,
    executor: Arc<dyn CommandExecutor>,
    url: &str,
) -> ProbeReport {
    let platform = Platform::detect(url);
    let identifier = platform.extract_id(url);
    let fetcher = MetadataFetcher::new(&config.downloader, default_fps, executor);
    let metadata = fetcher.fetch(url.trim()).await;
    let suggested_name = SavePrompt::new(platform, &identifier, OutputMode::Gif).suggested_name;
    ProbeReport {
        url: url.to_string(),
        platform,
        identifier,
        frame_rate: metadata.frame_rate,
        detected: metadata.detected,
        suggested_name,
    }
}

#[derive(Debug, Serialize)]
pub struct PrefsView {
    pub path: PathBuf,
    pub default_save_location: Option<PathBuf>,
    pub preferred_output_format: String,
    pub fps_settings: u32,
}

impl PrefsView {
    fn from_store(store: &PreferenceStore) -> Self {
        Self {
            path: store.path().to_path_buf(),
            default_save_location: store.default_save_location().map(Path::to_path_buf),
            preferred_output_format: store.output_mode().as_preference().to_string(),
            fps_settings: store.fps(),
        }
    }
}

pub fn prefs(store: &mut PreferenceStore, command: &PrefsCommands) -> Result<PrefsView> {
    match command {
        PrefsCommands::Show => {}
        PrefsCommands::SetSaveDir { dir } => store.set_default_save_location(dir)?,
        PrefsCommands::SetFormat { format } => {
            store.set_output_format(format)?;
        }
        PrefsCommands::SetFps { fps } => {
            store.set_fps(*fps)?;
        }
    }
    Ok(PrefsView::from_store(store))
}

#[derive(Debug, Serialize)]
pub struct ToolCheck {
    pub name: String,
    pub configured: PathBuf,
    pub resolved: Option<PathBuf>,
}

pub fn doctor(config: &AppConfig) -> Vec<ToolCheck> {
    [
        ("downloader", &config.downloader.binary),
        ("ffmpeg", &config.transcoder.ffmpeg),
        ("ffprobe", &config.transcoder.ffprobe),
    ]
    .into_iter()
    .map(|(name, configured)| ToolCheck {
        name: name.to_string(),
        configured: configured.clone(),
        resolved: locate(configured),
    })
    .collect()
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for RunReport {
    fn display(&self) -> String {
        let mut lines = vec![self.outcome.message(self.mode)];
        lines.push(format!("run: {} ({})", self.run_id, self.platform));
        if let Some(fps) = self.frame_rate {
            lines.push(format!("frame rate: {fps} fps"));
        }
        if let WorkflowOutcome::Failed { detail, .. } = &self.outcome {
            lines.push(format!("detail: {detail}"));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for ProbeReport {
    fn display(&self) -> String {
        let source = if self.detected { "detected" } else { "default" };
        [
            format!("platform: {}", self.platform),
            format!("identifier: {}", self.identifier),
            format!("frame rate: {} fps ({source})", self.frame_rate),
            format!("suggested file: {}", self.suggested_name),
        ]
        .join("\n")
    }
}

impl DisplayFallback for PrefsView {
    fn display(&self) -> String {
        let location = self
            .default_save_location
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        [
            format!("file: {}", self.path.display()),
            format!("save location: {location}"),
            format!("output format: {}", self.preferred_output_format),
            format!("fps: {}", self.fps_settings),
        ]
        .join("\n")
    }
}

impl DisplayFallback for Vec<ToolCheck> {
    fn display(&self) -> String {
        self.iter()
            .map(|check| match &check.resolved {
                Some(path) => format!("[ok] {} -> {}", check.name, path.display()),
                None => format!(
                    "[missing] {} ({} not on PATH)",
                    check.name,
                    check.configured.display()
                ),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

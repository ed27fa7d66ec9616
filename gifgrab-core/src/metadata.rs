use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DownloaderSection;
use crate::process::{CommandExecutor, ProcessOutput};

pub const FPS_FIELD: &str = "fps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
    pub frame_rate: u32,
    /// False when the probe degraded to the configured fallback.
    pub detected: bool,
}

impl VideoMetadata {
    pub fn fallback(frame_rate: u32) -> Self {
        Self {
            frame_rate,
            detected: false,
        }
    }
}

#[derive(Clone)]
pub struct MetadataFetcher {
    executor: Arc<dyn CommandExecutor>,
    binary: PathBuf,
    probe_format: String,
    default_fps: u32,
}

impl MetadataFetcher {
    pub fn new(
        config: &DownloaderSection,
        default_fps: u32,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            executor,
            binary: config.binary.clone(),
            probe_format: config.probe_format.clone(),
            default_fps,
        }
    }

    pub fn with_default_fps(mut self, default_fps: u32) -> Self {
        self.default_fps = default_fps;
        self
    }

    pub fn default_fps(&self) -> u32 {
        self.default_fps
    }

    pub fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "--print-json".to_string(),
            "-f".to_string(),
            self.probe_format.clone(),
            "--skip-download".to_string(),
            url.to_string(),
        ]
    }

    /// Best effort: every probe problem resolves to the fallback frame rate.
    pub async fn fetch(&self, url: &str) -> VideoMetadata {
        let args = self.probe_args(url);
        match self.executor.run(&self.binary, &args).await {
            Ok(output) => parse_probe_output(&output, self.default_fps),
            Err(err) => {
                warn!(binary = %self.binary.display(), error = %err, "metadata probe could not start");
                VideoMetadata::fallback(self.default_fps)
            }
        }
    }
}

pub fn parse_probe_output(output: &ProcessOutput, default_fps: u32) -> VideoMetadata {
    if !output.success() {
        debug!(exit_code = ?output.exit_code, "metadata probe failed, using default fps");
        return VideoMetadata::fallback(default_fps);
    }
    let stdout = output.stdout.trim();
    if stdout.is_empty() {
        return VideoMetadata::fallback(default_fps);
    }
    let info: Value = match serde_json::from_str(stdout) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "metadata probe output is not json");
            return VideoMetadata::fallback(default_fps);
        }
    };
    match info.get(FPS_FIELD).and_then(frame_rate_from) {
        Some(frame_rate) => VideoMetadata {
            frame_rate,
            detected: true,
        },
        None => VideoMetadata::fallback(default_fps),
    }
}

fn frame_rate_from(value: &Value) -> Option<u32> {
    let raw = value.as_f64()?;
    if !raw.is_finite() {
        return None;
    }
    let rounded = raw.round();
    if rounded < 1.0 || rounded > f64::from(u32::MAX) {
        return None;
    }
    Some(rounded as u32)
}

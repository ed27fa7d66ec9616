use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tracing::{debug, info};

use crate::config::TranscoderSection;
use crate::process::{CommandExecutor, ProcessOutput};

use super::error::{TranscodeError, TranscodeResult};
use super::{MediaClip, Transcoder};

#[derive(Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    max_width: Option<u32>,
    executor: Arc<dyn CommandExecutor>,
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscoderSection, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
            max_width: config.max_width,
            executor,
        }
    }

    fn probe_args(input: &Path) -> Vec<String> {
        vec![
            "-v".into(),
            "error".into(),
            "-select_streams".into(),
            "v:0".into(),
            "-show_entries".into(),
            "stream=codec_name,width,height".into(),
            "-of".into(),
            "json".into(),
            input.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn open(&self, input: &Path) -> TranscodeResult<Box<dyn MediaClip>> {
        let file = File::open(input)
            .await
            .map_err(|source| TranscodeError::Io {
                path: input.to_path_buf(),
                source,
            })?;
        let size = file
            .metadata()
            .await
            .map_err(|source| TranscodeError::Io {
                path: input.to_path_buf(),
                source,
            })?
            .len();
        if size == 0 {
            return Err(TranscodeError::Open {
                path: input.to_path_buf(),
                reason: "file is empty".into(),
            });
        }

        let output = self
            .executor
            .run(&self.ffprobe, &Self::probe_args(input))
            .await
            .map_err(|err| TranscodeError::Open {
                path: input.to_path_buf(),
                reason: format!("ffprobe could not be started: {err}"),
            })?;
        let stream = video_stream(input, &output)?;
        debug!(
            path = %input.display(),
            codec = stream.codec_name.as_deref().unwrap_or("unknown"),
            width = stream.width,
            height = stream.height,
            "media handle opened"
        );

        Ok(Box::new(FfmpegClip {
            input: input.to_path_buf(),
            file: Some(file),
            ffmpeg: self.ffmpeg.clone(),
            max_width: self.max_width,
            executor: Arc::clone(&self.executor),
        }))
    }
}

pub struct FfmpegClip {
    input: PathBuf,
    file: Option<File>,
    ffmpeg: PathBuf,
    max_width: Option<u32>,
    executor: Arc<dyn CommandExecutor>,
}

impl FfmpegClip {
    fn encode_args(&self, output: &Path, fps: u32) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostats".into(),
            "-y".into(),
            "-i".into(),
            self.input.to_string_lossy().into_owned(),
            "-vf".into(),
            gif_filter(fps, self.max_width),
            "-loop".into(),
            "0".into(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl MediaClip for FfmpegClip {
    async fn write_gif(&mut self, output: &Path, fps: u32) -> TranscodeResult<()> {
        if self.file.is_none() {
            return Err(TranscodeError::Encode("media handle already closed".into()));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::metadata(parent)
                .await
                .map_err(|source| TranscodeError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let args = self.encode_args(output, fps);
        let result = self
            .executor
            .run(&self.ffmpeg, &args)
            .await
            .map_err(|err| TranscodeError::Encode(format!("ffmpeg could not be started: {err}")))?;
        if !result.success() {
            return Err(TranscodeError::Encode(last_line(&result.stderr).unwrap_or_else(
                || format!("ffmpeg exited with status {:?}", result.exit_code),
            )));
        }
        info!(output = %output.display(), fps, "gif written");
        Ok(())
    }

    fn close(&mut self) -> TranscodeResult<()> {
        self.file.take();
        Ok(())
    }
}

/// Single-pass palette filter graph for a good-looking GIF at `fps`.
pub fn gif_filter(fps: u32, max_width: Option<u32>) -> String {
    let mut filter = format!("fps={fps}");
    if let Some(width) = max_width {
        filter.push_str(&format!(",scale={width}:-1:flags=lanczos"));
    }
    filter.push_str(",split[a][b];[a]palettegen[p];[b][p]paletteuse");
    filter
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

fn video_stream(input: &Path, output: &ProcessOutput) -> TranscodeResult<ProbeStream> {
    let open_error = |reason: String| TranscodeError::Open {
        path: input.to_path_buf(),
        reason,
    };
    if !output.success() {
        return Err(open_error(
            last_line(&output.stderr).unwrap_or_else(|| "ffprobe rejected the file".into()),
        ));
    }
    let parsed: ProbeOutput = serde_json::from_str(&output.stdout)
        .map_err(|err| open_error(format!("unreadable probe output: {err}")))?;
    parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| open_error("no video stream found".into()))
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

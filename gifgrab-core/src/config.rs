use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEFAULT_GIF_FPS: u32 = 15;
pub const DEFAULT_PROBE_FORMAT: &str = "bestvideo[ext=mp4]";
pub const DEFAULT_FETCH_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AppConfig {
    pub downloader: DownloaderSection,
    pub transcoder: TranscoderSection,
    pub workflow: WorkflowSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    pub fn temp_root(&self) -> PathBuf {
        self.workflow
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloaderSection {
    pub binary: PathBuf,
    pub probe_format: String,
    pub fetch_format: String,
}

impl Default for DownloaderSection {
    fn default() -> Self {
        Self {
            binary: platform_binary("yt-dlp"),
            probe_format: DEFAULT_PROBE_FORMAT.to_string(),
            fetch_format: DEFAULT_FETCH_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscoderSection {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub default_fps: u32,
    pub max_width: Option<u32>,
}

impl Default for TranscoderSection {
    fn default() -> Self {
        Self {
            ffmpeg: platform_binary("ffmpeg"),
            ffprobe: platform_binary("ffprobe"),
            default_fps: DEFAULT_GIF_FPS,
            max_width: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowSection {
    pub temp_dir: Option<PathBuf>,
    pub strict_platforms: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn platform_binary(name: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(format!("{name}.exe"))
    } else {
        PathBuf::from(name)
    }
}

pub fn load_app_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    load_toml(path)
}

pub(crate) fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

pub(crate) fn save_toml<T, P>(value: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = toml::to_string_pretty(value).map_err(|source| ConfigError::Serialize {
        source,
        path: path.to_path_buf(),
    })?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/gifgrab.toml");
        let config = load_app_config(path).expect("fixture config should parse");
        assert_eq!(config.transcoder.default_fps, 15);
        assert_eq!(config.downloader.probe_format, DEFAULT_PROBE_FORMAT);
        assert_eq!(config.transcoder.max_width, Some(480));
        assert!(!config.workflow.strict_platforms);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str("[transcoder]\ndefault_fps = 24\n").unwrap();
        assert_eq!(config.transcoder.default_fps, 24);
        assert_eq!(config.downloader.fetch_format, DEFAULT_FETCH_FORMAT);
        assert_eq!(config.logging.level, "info");
        assert!(config.workflow.temp_dir.is_none());
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match load_app_config(&path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn temp_root_prefers_configured_directory() {
        let mut config = AppConfig::default();
        assert_eq!(config.temp_root(), std::env::temp_dir());
        config.workflow.temp_dir = Some(PathBuf::from("/var/tmp/gifgrab"));
        assert_eq!(config.temp_root(), PathBuf::from("/var/tmp/gifgrab"));
    }
}

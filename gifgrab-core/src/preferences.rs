use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{load_toml, save_toml, DEFAULT_GIF_FPS};
use crate::error::Result;
use crate::workflow::OutputMode;

pub const PREFERENCES_FILE_NAME: &str = ".gifgrab.toml";
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_save_location: Option<PathBuf>,
    pub preferred_output_format: String,
    pub fps_settings: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_save_location: None,
            preferred_output_format: OutputMode::Gif.as_preference().to_string(),
            fps_settings: DEFAULT_GIF_FPS,
        }
    }
}

/// Per-user settings persisted next to the user's home directory.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    preferences: Preferences,
}

impl PreferenceStore {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(PREFERENCES_FILE_NAME))
    }

    /// Loads the file at `path`. A missing file is created with defaults; an
    /// unreadable one is logged and replaced in memory by defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            info!(path = %path.display(), "preferences not found, creating defaults");
            let store = Self {
                path,
                preferences: Preferences::default(),
            };
            if let Err(err) = store.save() {
                error!(error = %err, "failed to write default preferences");
            }
            return store;
        }
        let preferences = match load_toml::<Preferences, _>(&path) {
            Ok(preferences) => preferences,
            Err(err) => {
                error!(error = %err, "failed to load preferences, using defaults");
                Preferences::default()
            }
        };
        Self { path, preferences }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn default_save_location(&self) -> Option<&Path> {
        self.preferences
            .default_save_location
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_preference(&self.preferences.preferred_output_format).unwrap_or_default()
    }

    pub fn fps(&self) -> u32 {
        self.preferences.fps_settings.clamp(MIN_FPS, MAX_FPS)
    }

    pub fn set_default_save_location(&mut self, location: impl Into<PathBuf>) -> Result<()> {
        self.preferences.default_save_location = Some(location.into());
        self.save()
    }

    /// Accepts `gif` or `mp4`; anything else is stored as `gif`.
    pub fn set_output_format(&mut self, format: &str) -> Result<OutputMode> {
        let mode = OutputMode::from_preference(format).unwrap_or_else(|| {
            warn!(requested = format, "invalid output format, defaulting to gif");
            OutputMode::Gif
        });
        self.preferences.preferred_output_format = mode.as_preference().to_string();
        self.save()?;
        Ok(mode)
    }

    pub fn set_fps(&mut self, fps: i64) -> Result<u32> {
        let clamped = fps.clamp(i64::from(MIN_FPS), i64::from(MAX_FPS)) as u32;
        if i64::from(clamped) != fps {
            warn!(fps, clamped, "fps must be between 1 and 60, clamping");
        }
        self.preferences.fps_settings = clamped;
        self.save()?;
        Ok(clamped)
    }

    pub fn save(&self) -> Result<()> {
        save_toml(&self.preferences, &self.path)
    }
}

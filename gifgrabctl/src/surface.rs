use std::path::PathBuf;

use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use gifgrab_core::{InteractiveSurface, RunReport, SavePrompt, SaveTarget, Severity};
use tracing::{debug, warn};

/// Terminal rendition of the interactive surface. Status goes to stderr so
/// stdout stays reserved for the rendered report.
pub struct TerminalSurface {
    preset: Option<PathBuf>,
    progress: f32,
    trigger_enabled: bool,
}

impl TerminalSurface {
    /// With a preset destination the save prompt is answered without asking.
    pub fn new(preset: Option<PathBuf>) -> Self {
        Self {
            preset,
            progress: 0.0,
            trigger_enabled: true,
        }
    }

    pub fn trigger_enabled(&self) -> bool {
        self.trigger_enabled
    }

    /// Blocks on stdin, so the worker thread is handed over to the runtime first.
    /// Needs the multi-threaded runtime `main` starts.
    fn ask(&self, prompt: &SavePrompt) -> SaveTarget {
        let answer: Result<String, _> = tokio::task::block_in_place(|| {
            Input::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "{} ({}, leave empty to cancel)",
                    prompt.title, prompt.filter_label
                ))
                .with_initial_text(prompt.suggested_path().to_string_lossy())
                .allow_empty(true)
                .interact_text()
        });
        match answer {
            Ok(text) if text.trim().is_empty() => SaveTarget::cancelled(),
            Ok(text) => SaveTarget::chosen(with_extension(text.trim(), &prompt.extension)),
            Err(err) => {
                warn!(error = %err, "save prompt unavailable, cancelling");
                SaveTarget::cancelled()
            }
        }
    }
}

impl InteractiveSurface for TerminalSurface {
    fn show_status(&mut self, message: &str, severity: Severity) {
        let percent = (self.progress * 100.0).round() as u32;
        let marker = match severity {
            Severity::Info => ' ',
            Severity::Neutral => '-',
            Severity::Success => '+',
            Severity::Error => '!',
        };
        eprintln!("[{percent:>3}%] {marker} {message}");
    }

    fn show_progress(&mut self, fraction: f32) {
        self.progress = fraction;
    }

    fn set_trigger_enabled(&mut self, enabled: bool) {
        debug!(enabled, "trigger state");
        self.trigger_enabled = enabled;
    }

    fn choose_save_target(&mut self, prompt: &SavePrompt) -> SaveTarget {
        match &self.preset {
            Some(path) => SaveTarget::chosen(with_extension(
                &path.to_string_lossy(),
                &prompt.extension,
            )),
            None => self.ask(prompt),
        }
    }

    fn run_finished(&mut self, report: &RunReport) {
        debug!(run_id = %report.run_id, "run finished");
    }
}

/// Keeps the answer when it already ends in the expected extension (any case),
/// otherwise appends it: `clip.v2` becomes `clip.v2.gif`.
fn with_extension(answer: &str, extension: &str) -> PathBuf {
    let path = PathBuf::from(answer);
    let matches = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
    if matches {
        return path;
    }
    let mut appended = path.into_os_string();
    appended.push(".");
    appended.push(extension);
    PathBuf::from(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifgrab_core::{OutputMode, Platform};

    #[test]
    fn preset_destination_answers_the_prompt() {
        let mut surface = TerminalSurface::new(Some(PathBuf::from("/tmp/clip")));
        let prompt = SavePrompt::new(Platform::Twitter, "42", OutputMode::Gif);
        assert_eq!(
            surface.choose_save_target(&prompt),
            SaveTarget::chosen("/tmp/clip.gif")
        );
    }

    #[test]
    fn matching_extension_is_kept() {
        assert_eq!(with_extension("out.GIF", "gif"), PathBuf::from("out.GIF"));
        assert_eq!(with_extension("video", "mp4"), PathBuf::from("video.mp4"));
    }

    #[test]
    fn foreign_extension_gets_the_expected_one_appended() {
        assert_eq!(with_extension("clip.v2", "gif"), PathBuf::from("clip.v2.gif"));
        assert_eq!(with_extension("clip.gif", "mp4"), PathBuf::from("clip.gif.mp4"));
    }

    #[test]
    fn preset_with_foreign_extension_is_corrected() {
        let mut surface = TerminalSurface::new(Some(PathBuf::from("/tmp/clip.v2")));
        let prompt = SavePrompt::new(Platform::Twitter, "42", OutputMode::Gif);
        assert_eq!(
            surface.choose_save_target(&prompt),
            SaveTarget::chosen("/tmp/clip.v2.gif")
        );
    }

    #[test]
    fn tracks_trigger_state() {
        let mut surface = TerminalSurface::new(None);
        surface.set_trigger_enabled(false);
        assert!(!surface.trigger_enabled());
        surface.set_trigger_enabled(true);
        assert!(surface.trigger_enabled());
    }
}

use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::workflow::{
    RunReport, SavePrompt, SaveTarget, Severity, WorkflowError, WorkflowResult,
};

/// Everything a background run can ask of the interactive surface.
#[derive(Debug)]
pub enum UiEvent {
    Status {
        run_id: Uuid,
        message: String,
        severity: Severity,
    },
    Progress {
        run_id: Uuid,
        fraction: f32,
    },
    TriggerEnabled(bool),
    PromptSaveTarget {
        run_id: Uuid,
        prompt: SavePrompt,
        reply: oneshot::Sender<SaveTarget>,
    },
    Finished(RunReport),
}

pub type UiSender = mpsc::UnboundedSender<UiEvent>;
pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;

pub fn ui_channel() -> (UiSender, UiReceiver) {
    mpsc::unbounded_channel()
}

/// Sending half handed to one run. Delivery is fire-and-forget.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    run_id: Uuid,
    sender: UiSender,
}

impl StatusReporter {
    pub fn new(run_id: Uuid, sender: UiSender) -> Self {
        Self { run_id, sender }
    }

    pub fn report(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        debug!(run_id = %self.run_id, ?severity, %message, "status");
        self.send(UiEvent::Status {
            run_id: self.run_id,
            message,
            severity,
        });
    }

    pub fn progress(&self, fraction: f32) {
        self.send(UiEvent::Progress {
            run_id: self.run_id,
            fraction: fraction.clamp(0.0, 1.0),
        });
    }

    pub fn set_trigger_enabled(&self, enabled: bool) {
        self.send(UiEvent::TriggerEnabled(enabled));
    }

    pub async fn request_save_target(&self, prompt: SavePrompt) -> WorkflowResult<SaveTarget> {
        let (reply, answer) = oneshot::channel();
        self.send(UiEvent::PromptSaveTarget {
            run_id: self.run_id,
            prompt,
            reply,
        });
        answer.await.map_err(|_| WorkflowError::PromptAbandoned)
    }

    pub fn finish(&self, report: RunReport) {
        self.send(UiEvent::Finished(report));
    }

    fn send(&self, event: UiEvent) {
        if self.sender.send(event).is_err() {
            debug!(run_id = %self.run_id, "interactive surface is gone, dropping event");
        }
    }
}

/// The UI side. Only `InteractiveLoop` calls into it, always from the thread that owns it.
pub trait InteractiveSurface {
    fn show_status(&mut self, message: &str, severity: Severity);
    fn show_progress(&mut self, fraction: f32);
    fn set_trigger_enabled(&mut self, enabled: bool);
    fn choose_save_target(&mut self, prompt: &SavePrompt) -> SaveTarget;
    fn run_finished(&mut self, _report: &RunReport) {}
}

pub struct InteractiveLoop<S> {
    surface: S,
    events: UiReceiver,
}

impl<S: InteractiveSurface> InteractiveLoop<S> {
    pub fn new(surface: S, events: UiReceiver) -> Self {
        Self { surface, events }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Applies queued events without waiting. Suited to hosts that poll once per frame.
    pub fn drain_pending(&mut self) -> Vec<RunReport> {
        let mut finished = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Some(report) = self.dispatch(event) {
                finished.push(report);
            }
        }
        finished
    }

    /// Applies events until a run reports `Finished`. Returns `None` once every sender is gone.
    pub async fn run_until_finished(&mut self) -> Option<RunReport> {
        while let Some(event) = self.events.recv().await {
            if let Some(report) = self.dispatch(event) {
                return Some(report);
            }
        }
        None
    }

    fn dispatch(&mut self, event: UiEvent) -> Option<RunReport> {
        match event {
            UiEvent::Status {
                message, severity, ..
            } => self.surface.show_status(&message, severity),
            UiEvent::Progress { fraction, .. } => self.surface.show_progress(fraction),
            UiEvent::TriggerEnabled(enabled) => self.surface.set_trigger_enabled(enabled),
            UiEvent::PromptSaveTarget {
                run_id,
                prompt,
                reply,
            } => {
                let target = self.surface.choose_save_target(&prompt);
                if reply.send(target).is_err() {
                    debug!(%run_id, "run ended before the save target arrived");
                }
            }
            UiEvent::Finished(report) => {
                self.surface.run_finished(&report);
                return Some(report);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::platform::Platform;
    use crate::workflow::OutputMode;

    #[derive(Default)]
    struct RecordingSurface {
        log: Vec<String>,
        answer: Option<PathBuf>,
    }

    impl InteractiveSurface for RecordingSurface {
        fn show_status(&mut self, message: &str, severity: Severity) {
            self.log.push(format!("{}:{message}", severity.color()));
        }

        fn show_progress(&mut self, fraction: f32) {
            self.log.push(format!("progress:{fraction}"));
        }

        fn set_trigger_enabled(&mut self, enabled: bool) {
            self.log.push(format!("trigger:{enabled}"));
        }

        fn choose_save_target(&mut self, prompt: &SavePrompt) -> SaveTarget {
            self.log.push(format!("prompt:{}", prompt.suggested_name));
            SaveTarget {
                destination: self.answer.clone(),
            }
        }
    }

    #[test]
    fn drains_events_in_send_order() {
        let (sender, receiver) = ui_channel();
        let reporter = StatusReporter::new(Uuid::new_v4(), sender);
        reporter.set_trigger_enabled(false);
        reporter.report("Fetching video info...", Severity::Info);
        reporter.progress(1.5);

        let mut ui = InteractiveLoop::new(RecordingSurface::default(), receiver);
        assert!(ui.drain_pending().is_empty());
        assert_eq!(
            ui.surface().log,
            vec![
                "trigger:false",
                "white:Fetching video info...",
                "progress:1"
            ]
        );
    }

    #[tokio::test]
    async fn save_prompt_round_trips_through_the_loop() {
        let (sender, receiver) = ui_channel();
        let reporter = StatusReporter::new(Uuid::new_v4(), sender);
        let surface = RecordingSurface {
            answer: Some(PathBuf::from("/tmp/out.gif")),
            ..Default::default()
        };
        let mut ui = InteractiveLoop::new(surface, receiver);

        let prompt = SavePrompt::new(Platform::Twitter, "42", OutputMode::Gif);
        let pending = tokio::spawn(async move { reporter.request_save_target(prompt).await });
        // the spawned request only runs once this task yields inside recv()
        let ui_task = async {
            while ui.surface().log.is_empty() {
                if let Some(event) = ui.events.recv().await {
                    ui.dispatch(event);
                }
            }
        };
        ui_task.await;

        let target = pending.await.unwrap().unwrap();
        assert_eq!(target, SaveTarget::chosen("/tmp/out.gif"));
        assert_eq!(ui.surface().log, vec!["prompt:42.gif"]);
    }

    #[tokio::test]
    async fn dropped_prompt_is_reported_as_abandoned() {
        let (sender, receiver) = ui_channel();
        let reporter = StatusReporter::new(Uuid::new_v4(), sender);
        drop(receiver);
        let prompt = SavePrompt::new(Platform::Generic, "tweet_video", OutputMode::Gif);
        let err = reporter.request_save_target(prompt).await.unwrap_err();
        assert!(matches!(err, WorkflowError::PromptAbandoned));
    }

    #[tokio::test]
    async fn run_until_finished_stops_when_senders_close() {
        let (sender, receiver) = ui_channel();
        let reporter = StatusReporter::new(Uuid::new_v4(), sender);
        reporter.report("Download cancelled.", Severity::Neutral);
        drop(reporter);
        let mut ui = InteractiveLoop::new(RecordingSurface::default(), receiver);
        assert!(ui.run_until_finished().await.is_none());
        assert_eq!(ui.surface().log, vec!["gray:Download cancelled."]);
    }
}

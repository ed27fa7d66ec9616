use serde::Serialize;

use super::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    FetchingInfo,
    AwaitingSaveTarget,
    Downloading,
    Converting,
    Cleanup,
    Succeeded,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Cancelled | RunState::Failed
        )
    }

    /// Whether the surface should accept a new trigger while a run sits in this state.
    pub fn trigger_enabled(self) -> bool {
        self == RunState::Idle || self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Triggered,
    Rejected,
    InfoResolved,
    TargetChosen,
    Declined,
    DownloadCompleted { convert: bool },
    DownloadFailed,
    ConversionFinished,
    ConversionFailed,
    CleanedUp { succeeded: bool },
    Failed,
}

pub fn transition(state: RunState, event: RunEvent) -> Option<RunState> {
    use RunEvent as E;
    use RunState as S;

    let next = match (state, event) {
        (S::Idle, E::Triggered) => S::FetchingInfo,
        (S::Idle, E::Rejected) => S::Failed,
        (S::FetchingInfo, E::InfoResolved) => S::AwaitingSaveTarget,
        (S::FetchingInfo, E::Failed) => S::Failed,
        (S::AwaitingSaveTarget, E::Declined) => S::Cancelled,
        (S::AwaitingSaveTarget, E::TargetChosen) => S::Downloading,
        (S::AwaitingSaveTarget, E::Failed) => S::Failed,
        (S::Downloading, E::DownloadCompleted { convert: true }) => S::Converting,
        (S::Downloading, E::DownloadCompleted { convert: false }) => S::Cleanup,
        (S::Downloading, E::DownloadFailed) => S::Cleanup,
        (S::Converting, E::ConversionFinished | E::ConversionFailed) => S::Cleanup,
        (S::Cleanup, E::CleanedUp { succeeded: true }) => S::Succeeded,
        (S::Cleanup, E::CleanedUp { succeeded: false }) => S::Failed,
        _ => return None,
    };
    Some(next)
}

/// Walks the state machine for one run and keeps every visited state.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: RunState,
    visited: Vec<RunState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: RunState::Idle,
            visited: vec![RunState::Idle],
        }
    }

    pub fn current(&self) -> RunState {
        self.current
    }

    pub fn visited(&self) -> &[RunState] {
        &self.visited
    }

    pub fn apply(&mut self, event: RunEvent) -> WorkflowResult<RunState> {
        let next = transition(self.current, event).ok_or(WorkflowError::IllegalTransition {
            state: self.current,
            event,
        })?;
        self.current = next;
        self.visited.push(next);
        Ok(next)
    }

    pub fn into_states(self) -> Vec<RunState> {
        self.visited
    }
}

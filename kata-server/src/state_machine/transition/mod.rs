//! Pure state transition function.
//!
//! `transition` takes the current moderation state and an event and returns
//! the new state plus the effects to run. It performs no I/O.
//!
//! Each state has its own handler module with co-located tests:
//! - `pending`: Pending transitions
//! - `approved`: Approved transitions, including cross-post annotations
//! - `rejected`: Rejected transitions

mod approved;
mod pending;
mod rejected;

use super::effect::{Effect, LogLevel, StatusNotice};
use super::event::Event;
use super::state::{ModerationState, SubmissionStatus};

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub state: ModerationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ModerationState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    pub fn no_change(state: ModerationState) -> Self {
        Self {
            state,
            effects: vec![],
        }
    }

    /// True when the transition moved to a different status.
    pub fn changes_status_from(&self, previous: &ModerationState) -> bool {
        self.state.status() != previous.status()
    }
}

pub fn transition(state: ModerationState, event: Event) -> TransitionResult {
    match &state {
        ModerationState::Pending => pending::handle(state, event),
        ModerationState::Approved { .. } => approved::handle(state, event),
        ModerationState::Rejected => rejected::handle(state, event),
    }
}

pub(crate) fn notify(notice: StatusNotice, status: SubmissionStatus) -> Effect {
    Effect::NotifyStatusChange { notice, status }
}

pub(crate) fn log(level: LogLevel, message: impl Into<String>) -> Effect {
    Effect::Log {
        level,
        message: message.into(),
    }
}

/// Shared handling for cross-post events outside the approved state.
pub(crate) fn ignore_cross_post(state: ModerationState, event: &Event) -> TransitionResult {
    let message = format!(
        "Ignoring {} for {} submission",
        event.log_summary(),
        state.status()
    );
    TransitionResult::new(state, vec![log(LogLevel::Warn, message)])
}

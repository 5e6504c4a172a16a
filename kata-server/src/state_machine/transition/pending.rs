//! Pending state transitions.

use super::{ignore_cross_post, log, notify, TransitionResult};
use crate::state_machine::effect::LogLevel;
use crate::state_machine::event::Event;
use crate::state_machine::state::{ModerationState, SubmissionStatus};

/// Handle transitions from `Pending`, the state every submission starts in.
pub fn handle(state: ModerationState, event: Event) -> TransitionResult {
    match event {
        Event::ApproveRequested { at, notice } => TransitionResult::new(
            ModerationState::approved(at),
            vec![
                notify(notice, SubmissionStatus::Approved),
                log(LogLevel::Info, "Submission approved"),
            ],
        ),

        Event::RejectRequested { notice } => TransitionResult::new(
            ModerationState::Rejected,
            vec![
                notify(notice, SubmissionStatus::Rejected),
                log(LogLevel::Info, "Submission rejected"),
            ],
        ),

        event @ (Event::CrossPostRequested { .. }
        | Event::CrossPostSucceeded { .. }
        | Event::CrossPostFailed { .. }) => ignore_cross_post(state, &event),
    }
}

//! Rejected state transitions.

use super::{ignore_cross_post, log, notify, TransitionResult};
use crate::state_machine::effect::LogLevel;
use crate::state_machine::event::Event;
use crate::state_machine::state::{ModerationState, SubmissionStatus};

pub fn handle(state: ModerationState, event: Event) -> TransitionResult {
    match event {
        Event::ApproveRequested { at, notice } => TransitionResult::new(
            ModerationState::approved(at),
            vec![
                notify(notice, SubmissionStatus::Approved),
                log(LogLevel::Warn, "Rejected submission reversed to approved"),
            ],
        ),

        Event::RejectRequested { .. } => TransitionResult::new(
            state,
            vec![log(LogLevel::Debug, "Submission already rejected")],
        ),

        event @ (Event::CrossPostRequested { .. }
        | Event::CrossPostSucceeded { .. }
        | Event::CrossPostFailed { .. }) => ignore_cross_post(state, &event),
    }
}

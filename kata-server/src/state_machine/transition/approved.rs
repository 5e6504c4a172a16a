//! Approved state transitions.
//!
//! Approval is terminal for display, but the cross-post annotation keeps
//! changing and a moderator may still reverse the decision.

use super::{log, notify, TransitionResult};
use crate::state_machine::effect::{Effect, LogLevel};
use crate::state_machine::event::Event;
use crate::state_machine::state::{ModerationState, SocialPost, SubmissionStatus};

pub fn handle(state: ModerationState, event: Event) -> TransitionResult {
    let ModerationState::Approved { approved_at, social } = &state else {
        return TransitionResult::no_change(state);
    };
    let approved_at = *approved_at;
    let published = social.published();
    let already_posted = published.is_some();

    match event {
        // Repeated approval keeps the original timestamp and sends nothing
        Event::ApproveRequested { .. } => TransitionResult::new(
            state,
            vec![log(LogLevel::Debug, "Submission already approved")],
        ),

        Event::RejectRequested { notice } => TransitionResult::new(
            ModerationState::Rejected,
            vec![
                notify(notice, SubmissionStatus::Rejected),
                log(LogLevel::Warn, "Approved submission reversed to rejected"),
            ],
        ),

        Event::CrossPostRequested { submission_id } => {
            if already_posted {
                // Not deduplicated: the cross-post service decides what a repeat means
                TransitionResult::new(
                    state,
                    vec![
                        log(LogLevel::Warn, "Submission was already cross-posted"),
                        Effect::CrossPost { submission_id },
                    ],
                )
            } else {
                TransitionResult::new(state, vec![Effect::CrossPost { submission_id }])
            }
        }

        Event::CrossPostSucceeded { links, at } => TransitionResult::new(
            ModerationState::Approved {
                approved_at,
                social: SocialPost::Posted {
                    links,
                    posted_at: at,
                },
            },
            vec![log(LogLevel::Info, "Submission cross-posted")],
        ),

        Event::CrossPostFailed { error } => TransitionResult::new(
            ModerationState::Approved {
                approved_at,
                social: SocialPost::Failed {
                    error: error.clone(),
                    previous: published,
                },
            },
            vec![log(LogLevel::Warn, format!("Cross-post failed: {}", error))],
        ),
    }
}

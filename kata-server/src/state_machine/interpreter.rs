//! Effect interpreter.
//!
//! The boundary between the pure moderation machine and the collaborator
//! services. Effects go in, result events come out.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::effect::{Effect, LogLevel};
use super::event::Event;
use crate::collaborators::{CollaboratorError, Collaborators};

/// Events produced by running effects, plus any authorization failure seen.
#[derive(Debug, Default)]
pub struct EffectOutcome {
    pub events: Vec<Event>,
    /// Set when a collaborator rejected our credentials.
    pub unauthorized: Option<CollaboratorError>,
}

/// Execute effects sequentially and collect result events.
///
/// Notification failures are logged and otherwise ignored: the state change
/// that caused them has already been persisted.
pub async fn execute_effects(
    collaborators: &dyn Collaborators,
    effects: Vec<Effect>,
) -> EffectOutcome {
    let mut outcome = EffectOutcome::default();

    for effect in effects {
        match effect {
            Effect::NotifyStatusChange { notice, status } => {
                if let Err(e) = collaborators.notify_status_change(&notice, status).await {
                    warn!("Status notification failed ({}): {}", status, e);
                }
            }

            Effect::CrossPost { submission_id } => {
                match collaborators.cross_post(submission_id).await {
                    Ok(links) => outcome.events.push(Event::CrossPostSucceeded {
                        links,
                        at: Utc::now(),
                    }),
                    Err(e) => {
                        warn!("Cross-post for {} failed: {}", submission_id, e);
                        if matches!(e, CollaboratorError::Unauthorized { .. }) {
                            outcome.unauthorized = Some(e.clone());
                        }
                        outcome.events.push(Event::CrossPostFailed {
                            error: e.to_string(),
                        });
                    }
                }
            }

            Effect::Log { level, message } => match level {
                LogLevel::Debug => debug!("{}", message),
                LogLevel::Info => info!("{}", message),
                LogLevel::Warn => warn!("{}", message),
            },
        }
    }

    outcome
}

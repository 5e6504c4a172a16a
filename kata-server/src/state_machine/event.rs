//! Events that trigger moderation transitions.
//!
//! Moderator requests and cross-post results are inputs to the pure
//! transition function.

use chrono::{DateTime, Utc};

use super::effect::StatusNotice;
use super::state::SocialLinks;
use crate::model::SubmissionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // =========================================================================
    // Moderator requests
    // =========================================================================
    ApproveRequested {
        at: DateTime<Utc>,
        notice: StatusNotice,
    },

    RejectRequested {
        notice: StatusNotice,
    },

    CrossPostRequested {
        submission_id: SubmissionId,
    },

    // =========================================================================
    // Collaborator results
    // =========================================================================
    CrossPostSucceeded {
        links: SocialLinks,
        at: DateTime<Utc>,
    },

    CrossPostFailed {
        error: String,
    },
}

impl Event {
    /// Short description for logs; omits contact details.
    pub fn log_summary(&self) -> String {
        match self {
            Event::ApproveRequested { at, .. } => format!("ApproveRequested {{ at: {} }}", at),
            Event::RejectRequested { .. } => "RejectRequested".to_string(),
            Event::CrossPostRequested { submission_id } => {
                format!("CrossPostRequested {{ id: {} }}", submission_id)
            }
            Event::CrossPostSucceeded { .. } => "CrossPostSucceeded".to_string(),
            Event::CrossPostFailed { error } => format!("CrossPostFailed {{ error: {} }}", error),
        }
    }
}

//! Per-submission moderation history.
//!
//! Uses serde's adjacently tagged representation so stored rows read as
//! `{ "type": "StatusChanged", "data": { ... } }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::SubmissionId;
use crate::state_machine::SubmissionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ModerationEventType {
    /// Created through the public form.
    Submitted { dojo_name: Option<String> },

    StatusChanged {
        from: SubmissionStatus,
        to: SubmissionStatus,
        /// Moderator email.
        actor: String,
        /// True when applied as part of a bulk action.
        bulk: bool,
    },

    NoteUpdated { actor: String },

    CrossPostCompleted,

    CrossPostFailed { error: String },

    Deleted { actor: String },
}

impl ModerationEventType {
    /// Variant name, stored in its own column for filtering.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "Submitted",
            Self::StatusChanged { .. } => "StatusChanged",
            Self::NoteUpdated { .. } => "NoteUpdated",
            Self::CrossPostCompleted => "CrossPostCompleted",
            Self::CrossPostFailed { .. } => "CrossPostFailed",
            Self::Deleted { .. } => "Deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionEvent {
    pub id: i64,
    pub submission_id: SubmissionId,
    pub event_type: ModerationEventType,
    pub recorded_at: DateTime<Utc>,
}

//! Effects (side effects as data).
//!
//! Effects describe what should happen after a transition. The interpreter
//! executes them against the collaborator services, which keeps the transition
//! logic testable without HTTP.

use serde::{Deserialize, Serialize};

use super::state::SubmissionStatus;
use crate::model::SubmissionId;

/// Facts the notification service needs about a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotice {
    pub email: String,
    pub country: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Email the submitter about a status change. Fire-and-forget.
    NotifyStatusChange {
        notice: StatusNotice,
        status: SubmissionStatus,
    },

    /// Ask the cross-posting service to publish the video.
    CrossPost { submission_id: SubmissionId },

    Log { level: LogLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

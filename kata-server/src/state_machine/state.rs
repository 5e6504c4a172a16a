//! State types for the submission moderation machine.
//!
//! `approved_at` and the social cross-post annotation only exist inside the
//! `Approved` variant, so an approved submission without an approval time
//! cannot be constructed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Moderation status as stored and exchanged over the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A moderator's verdict on a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> SubmissionStatus {
        match self {
            Self::Approve => SubmissionStatus::Approved,
            Self::Reject => SubmissionStatus::Rejected,
        }
    }
}

/// URLs of the cross-posted copies of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub youtube_url: Option<String>,
}

/// Cross-posting annotation on an approved submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SocialPost {
    #[default]
    NotPosted,
    Posted {
        links: SocialLinks,
        posted_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        /// The last successful post, kept when a repeat attempt fails.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<PublishedPost>,
    },
}

/// Links and time of a successful cross-post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub links: SocialLinks,
    pub posted_at: DateTime<Utc>,
}

impl SocialPost {
    /// The most recent successful post, whether or not a later attempt failed.
    pub fn published(&self) -> Option<PublishedPost> {
        match self {
            Self::NotPosted => None,
            Self::Posted { links, posted_at } => Some(PublishedPost {
                links: links.clone(),
                posted_at: *posted_at,
            }),
            Self::Failed { previous, .. } => previous.clone(),
        }
    }
}

/// Where a submission is in moderation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModerationState {
    /// Awaiting a moderator.
    #[default]
    Pending,

    /// Accepted for display. Notes and cross-posting can still change.
    Approved {
        approved_at: DateTime<Utc>,
        #[serde(default)]
        social: SocialPost,
    },

    Rejected,
}

impl ModerationState {
    pub fn approved(approved_at: DateTime<Utc>) -> Self {
        Self::Approved {
            approved_at,
            social: SocialPost::NotPosted,
        }
    }

    pub fn status(&self) -> SubmissionStatus {
        match self {
            Self::Pending => SubmissionStatus::Pending,
            Self::Approved { .. } => SubmissionStatus::Approved,
            Self::Rejected => SubmissionStatus::Rejected,
        }
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Approved { approved_at, .. } => Some(*approved_at),
            _ => None,
        }
    }

    pub fn social(&self) -> Option<&SocialPost> {
        match self {
            Self::Approved { social, .. } => Some(social),
            _ => None,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

impl fmt::Display for ModerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

//! Domain records: dojos, submissions, and listing queries.

use chrono::{DateTime, Utc};
use kata_core::VideoRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::{ModerationState, StatusNotice, SubmissionStatus};

/// Newtype for submission ids to prevent mixing with dojo ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SubmissionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Newtype for dojo ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DojoId(pub Uuid);

impl DojoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DojoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DojoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kata level, 1 through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Level::new(raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "level must be between {} and {}",
                Level::MIN,
                Level::MAX
            ))
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity triple used to find an existing dojo.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DojoKey {
    pub name: String,
    pub country: String,
    pub city: String,
}

impl DojoKey {
    pub fn new(name: &str, country: &str, city: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            country: country.trim().to_string(),
            city: city.trim().to_string(),
        }
    }
}

/// Dojo details collected on first submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDojo {
    pub key: DojoKey,
    pub province: Option<String>,
    pub instructor_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub student_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dojo {
    pub id: DojoId,
    pub name: String,
    pub city: String,
    pub province: Option<String>,
    pub country: String,
    pub instructor_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub student_count: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Dojo {
    pub fn from_new(id: DojoId, new: &NewDojo, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.key.name.clone(),
            city: new.key.city.clone(),
            province: new.province.clone(),
            country: new.key.country.clone(),
            instructor_name: new.instructor_name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            website: new.website.clone(),
            student_count: new.student_count,
            created_at,
        }
    }

    pub fn key(&self) -> DojoKey {
        DojoKey::new(&self.name, &self.country, &self.city)
    }
}

/// A kata video submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub dojo_id: Option<DojoId>,
    pub country: String,
    pub email: String,
    pub video: VideoRef,
    pub level: Level,
    pub participant_names: Option<String>,
    pub message: Option<String>,
    pub moderation: ModerationState,
    pub submitted_at: DateTime<Utc>,
    pub admin_note: Option<String>,
}

impl Submission {
    pub fn status(&self) -> SubmissionStatus {
        self.moderation.status()
    }

    /// Facts sent along with status-change notifications.
    pub fn notice(&self) -> StatusNotice {
        StatusNotice {
            email: self.email.clone(),
            country: self.country.clone(),
            level: self.level.get(),
        }
    }
}

/// Submission together with its dojo, as shown to moderators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub dojo: Option<Dojo>,
}

/// Default page size for listings.
pub const DEFAULT_LIMIT: usize = 50;

/// Largest page a caller may request.
pub const MAX_LIMIT: usize = 200;

/// Offset/limit listing with optional status filter and text search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmissionQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub status: Option<SubmissionStatus>,
    pub search: Option<String>,
    /// Client sequence number, echoed back so stale responses can be dropped.
    pub seq: Option<u64>,
}

impl SubmissionQuery {
    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Search needle, or `None` for blank input. Case folding is ASCII only,
    /// matching SQLite's `lower()`, so "É" and "é" stay distinct.
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// Whether a submission (with its dojo name, if any) passes the filters.
    pub fn matches(&self, submission: &Submission, dojo_name: Option<&str>) -> bool {
        if let Some(status) = self.status {
            if submission.status() != status {
                return false;
            }
        }
        let Some(needle) = self.needle() else {
            return true;
        };
        [
            Some(submission.email.as_str()),
            Some(submission.country.as_str()),
            submission.participant_names.as_deref(),
            dojo_name,
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_ascii_lowercase().contains(&needle))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

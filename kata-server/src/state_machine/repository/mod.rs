//! Repository abstraction for submission persistence.
//!
//! This module defines the `Repository` trait that abstracts storage of
//! dojos, submissions, their moderation history and curated content.
//! Implementations can provide different backends (in-memory, SQLite).
//!
//! Every mutating call returns the number of rows it affected so callers can
//! detect writes that were silently dropped.

mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use super::state::ModerationState;
use crate::audit::{ModerationEventType, SubmissionEvent};
use crate::curated::CuratedKind;
use crate::model::{Dojo, DojoId, NewDojo, Submission, SubmissionId, SubmissionQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryErrorKind {
    /// Generic storage failure.
    Storage,
    /// A stored row could not be decoded into a valid record.
    Corruption,
    /// The store refused the operation for lack of privileges.
    PermissionDenied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    pub kind: RepositoryErrorKind,
    pub operation: &'static str,
    pub message: String,
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: RepositoryErrorKind::Storage,
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self {
            kind: RepositoryErrorKind::Corruption,
            operation: "decode",
            message: what.into(),
        }
    }

    pub fn permission_denied(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: RepositoryErrorKind::PermissionDenied,
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RepositoryErrorKind::Corruption => write!(f, "corrupt record: {}", self.message),
            RepositoryErrorKind::Storage | RepositoryErrorKind::PermissionDenied => {
                write!(f, "{} failed: {}", self.operation, self.message)
            }
        }
    }
}

impl std::error::Error for RepositoryError {}

/// A curated content record as stored, with its item still encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedRow {
    pub kind: CuratedKind,
    pub id: Uuid,
    pub order_index: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait Repository: Send + Sync {
    // Dojos

    /// Return the dojo with the same trimmed (name, country, city), creating
    /// it from `new` when absent.
    async fn find_or_create_dojo(&self, new: &NewDojo) -> Result<Dojo, RepositoryError>;

    async fn get_dojo(&self, id: DojoId) -> Result<Option<Dojo>, RepositoryError>;

    async fn list_dojos(&self) -> Result<Vec<Dojo>, RepositoryError>;

    // Submissions

    async fn insert_submission(&self, submission: &Submission) -> Result<(), RepositoryError>;

    /// Fails with a corruption error when the stored row is invalid.
    async fn get_submission(&self, id: SubmissionId)
        -> Result<Option<Submission>, RepositoryError>;

    /// Fetch several submissions. Missing ids are absent from the result.
    async fn get_submissions(
        &self,
        ids: &[SubmissionId],
    ) -> Result<Vec<Submission>, RepositoryError>;

    /// One page of submissions, newest first, plus the total matching count.
    /// Corrupt rows are skipped.
    async fn list_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> Result<(Vec<Submission>, usize), RepositoryError>;

    /// Every readable submission, newest first.
    async fn all_submissions(&self) -> Result<Vec<Submission>, RepositoryError>;

    async fn save_moderation(
        &self,
        id: SubmissionId,
        state: &ModerationState,
    ) -> Result<usize, RepositoryError>;

    /// Write the same moderation state to every id in one statement.
    async fn bulk_save_moderation(
        &self,
        ids: &[SubmissionId],
        state: &ModerationState,
    ) -> Result<usize, RepositoryError>;

    async fn update_note(
        &self,
        id: SubmissionId,
        note: Option<&str>,
    ) -> Result<usize, RepositoryError>;

    async fn delete_submission(&self, id: SubmissionId) -> Result<usize, RepositoryError>;

    async fn count_approved_for_dojo(&self, id: DojoId) -> Result<u64, RepositoryError>;

    // Moderation history

    async fn log_event(
        &self,
        submission_id: SubmissionId,
        event: &ModerationEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Most recent events for a submission, newest first.
    async fn get_events(
        &self,
        submission_id: SubmissionId,
        limit: usize,
    ) -> Result<Vec<SubmissionEvent>, RepositoryError>;

    // Curated content

    /// All rows of a kind in display order (order_index, then created_at).
    async fn list_curated(&self, kind: CuratedKind) -> Result<Vec<CuratedRow>, RepositoryError>;

    async fn get_curated(
        &self,
        kind: CuratedKind,
        id: Uuid,
    ) -> Result<Option<CuratedRow>, RepositoryError>;

    /// Insert or replace by (kind, id).
    async fn put_curated(&self, row: &CuratedRow) -> Result<(), RepositoryError>;

    async fn delete_curated(&self, kind: CuratedKind, id: Uuid) -> Result<usize, RepositoryError>;

    /// Set `order_index` to each id's position in `ids`.
    async fn set_curated_order(
        &self,
        kind: CuratedKind,
        ids: &[Uuid],
    ) -> Result<usize, RepositoryError>;
}

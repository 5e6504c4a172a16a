//! In-memory implementation of `Repository`.
//!
//! All data is held in maps behind `RwLock`s and lost on restart. Used by
//! tests and by the router tests in `tests/`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CuratedRow, Repository, RepositoryError};
use crate::audit::{ModerationEventType, SubmissionEvent};
use crate::curated::CuratedKind;
use crate::model::{Dojo, DojoId, DojoKey, NewDojo, Submission, SubmissionId, SubmissionQuery};
use crate::state_machine::state::ModerationState;

/// In-memory repository.
pub struct InMemoryRepository {
    dojos: RwLock<HashMap<DojoId, Dojo>>,
    submissions: RwLock<HashMap<SubmissionId, Submission>>,
    events: RwLock<Vec<SubmissionEvent>>,
    curated: RwLock<HashMap<(CuratedKind, Uuid), CuratedRow>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            dojos: RwLock::new(HashMap::new()),
            submissions: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            curated: RwLock::new(HashMap::new()),
        }
    }

    /// Submissions newest first, ties broken by id for a stable order.
    fn sorted(submissions: impl Iterator<Item = Submission>) -> Vec<Submission> {
        let mut all: Vec<Submission> = submissions.collect();
        all.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_or_create_dojo(&self, new: &NewDojo) -> Result<Dojo, RepositoryError> {
        let mut dojos = self.dojos.write().await;
        let key = DojoKey::new(&new.key.name, &new.key.country, &new.key.city);
        if let Some(existing) = dojos.values().find(|d| d.key() == key) {
            return Ok(existing.clone());
        }
        let mut normalized = new.clone();
        normalized.key = key;
        let dojo = Dojo::from_new(DojoId::new(), &normalized, Utc::now());
        dojos.insert(dojo.id, dojo.clone());
        Ok(dojo)
    }

    async fn get_dojo(&self, id: DojoId) -> Result<Option<Dojo>, RepositoryError> {
        Ok(self.dojos.read().await.get(&id).cloned())
    }

    async fn list_dojos(&self) -> Result<Vec<Dojo>, RepositoryError> {
        let mut dojos: Vec<Dojo> = self.dojos.read().await.values().cloned().collect();
        dojos.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(dojos)
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), RepositoryError> {
        let mut submissions = self.submissions.write().await;
        if submissions.contains_key(&submission.id) {
            return Err(RepositoryError::storage(
                "insert submission",
                format!("submission {} already exists", submission.id),
            ));
        }
        submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn get_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.submissions.read().await.get(&id).cloned())
    }

    async fn get_submissions(
        &self,
        ids: &[SubmissionId],
    ) -> Result<Vec<Submission>, RepositoryError> {
        let submissions = self.submissions.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| submissions.get(id).cloned())
            .collect())
    }

    async fn list_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> Result<(Vec<Submission>, usize), RepositoryError> {
        let dojos = self.dojos.read().await;
        let submissions = self.submissions.read().await;
        let matching = Self::sorted(
            submissions
                .values()
                .filter(|s| {
                    let dojo_name = s
                        .dojo_id
                        .and_then(|id| dojos.get(&id))
                        .map(|d| d.name.as_str());
                    query.matches(s, dojo_name)
                })
                .cloned(),
        );
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();
        Ok((page, total))
    }

    async fn all_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        let submissions = self.submissions.read().await;
        Ok(Self::sorted(submissions.values().cloned()))
    }

    async fn save_moderation(
        &self,
        id: SubmissionId,
        state: &ModerationState,
    ) -> Result<usize, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&id) {
            Some(submission) => {
                submission.moderation = state.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn bulk_save_moderation(
        &self,
        ids: &[SubmissionId],
        state: &ModerationState,
    ) -> Result<usize, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        let mut affected = 0;
        for id in ids {
            if let Some(submission) = submissions.get_mut(id) {
                submission.moderation = state.clone();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn update_note(
        &self,
        id: SubmissionId,
        note: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&id) {
            Some(submission) => {
                submission.admin_note = note.map(str::to_string);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_submission(&self, id: SubmissionId) -> Result<usize, RepositoryError> {
        let removed = self.submissions.write().await.remove(&id);
        Ok(usize::from(removed.is_some()))
    }

    async fn count_approved_for_dojo(&self, id: DojoId) -> Result<u64, RepositoryError> {
        let submissions = self.submissions.read().await;
        Ok(submissions
            .values()
            .filter(|s| s.dojo_id == Some(id) && s.moderation.is_approved())
            .count() as u64)
    }

    async fn log_event(
        &self,
        submission_id: SubmissionId,
        event: &ModerationEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        let id = events.len() as i64 + 1;
        events.push(SubmissionEvent {
            id,
            submission_id,
            event_type: event.clone(),
            recorded_at,
        });
        Ok(())
    }

    async fn get_events(
        &self,
        submission_id: SubmissionId,
        limit: usize,
    ) -> Result<Vec<SubmissionEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .rev()
            .filter(|e| e.submission_id == submission_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_curated(&self, kind: CuratedKind) -> Result<Vec<CuratedRow>, RepositoryError> {
        let curated = self.curated.read().await;
        let mut rows: Vec<CuratedRow> = curated
            .values()
            .filter(|row| row.kind == kind)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn get_curated(
        &self,
        kind: CuratedKind,
        id: Uuid,
    ) -> Result<Option<CuratedRow>, RepositoryError> {
        Ok(self.curated.read().await.get(&(kind, id)).cloned())
    }

    async fn put_curated(&self, row: &CuratedRow) -> Result<(), RepositoryError> {
        self.curated
            .write()
            .await
            .insert((row.kind, row.id), row.clone());
        Ok(())
    }

    async fn delete_curated(&self, kind: CuratedKind, id: Uuid) -> Result<usize, RepositoryError> {
        let removed = self.curated.write().await.remove(&(kind, id));
        Ok(usize::from(removed.is_some()))
    }

    async fn set_curated_order(
        &self,
        kind: CuratedKind,
        ids: &[Uuid],
    ) -> Result<usize, RepositoryError> {
        let mut curated = self.curated.write().await;
        let mut affected = 0;
        for (position, id) in ids.iter().enumerate() {
            if let Some(row) = curated.get_mut(&(kind, *id)) {
                row.order_index = position as i64;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

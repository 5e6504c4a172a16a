//! Moderator operations on submissions.
//!
//! Every operation takes the caller's [`Session`] and refuses anything but a
//! signed-in moderator. Status changes go through the pure transition
//! function; the resulting state is persisted before any effect runs, so a
//! failed notification never undoes a decision.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{ModerationEventType, SubmissionEvent};
use crate::auth::{Moderator, Session};
use crate::collaborators::{Collaborators, InvitationReport, InvitationRequest};
use crate::error::{ModerationError, ValidationError};
use crate::export::submissions_csv;
use crate::intake::is_valid_email;
use crate::model::{Page, Submission, SubmissionId, SubmissionQuery, SubmissionView};
use crate::state_machine::repository::{Repository, RepositoryErrorKind};
use crate::state_machine::{
    execute_effects, transition, Decision, Event, ModerationState, TransitionResult,
};

/// Most history entries returned for one submission.
pub const EVENT_HISTORY_LIMIT: usize = 100;

/// Largest invitation batch accepted in one call.
pub const MAX_INVITATIONS: usize = 100;

/// Outcome of a bulk status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub requested: usize,
    /// Rows now in the target status, including ones already there.
    pub updated: usize,
    /// Rows whose status actually changed.
    pub changed: usize,
}

pub struct ModerationService {
    repo: Arc<dyn Repository>,
    collaborators: Arc<dyn Collaborators>,
}

fn decision_event(decision: Decision, submission: &Submission, at: DateTime<Utc>) -> Event {
    match decision {
        Decision::Approve => Event::ApproveRequested {
            at,
            notice: submission.notice(),
        },
        Decision::Reject => Event::RejectRequested {
            notice: submission.notice(),
        },
    }
}

impl ModerationService {
    pub fn new(repo: Arc<dyn Repository>, collaborators: Arc<dyn Collaborators>) -> Self {
        Self {
            repo,
            collaborators,
        }
    }

    async fn load(&self, id: SubmissionId) -> Result<Submission, ModerationError> {
        self.repo
            .get_submission(id)
            .await?
            .ok_or_else(|| ModerationError::not_found("submission", id))
    }

    /// Append to the history. A failure here is logged, never surfaced: the
    /// change it describes has already happened.
    async fn record(&self, id: SubmissionId, event: ModerationEventType) {
        if let Err(e) = self.repo.log_event(id, &event, Utc::now()).await {
            warn!(
                "Failed to record {} event for {}: {}",
                event.variant_name(),
                id,
                e
            );
        }
    }

    async fn record_status_change(
        &self,
        id: SubmissionId,
        previous: &ModerationState,
        result: &TransitionResult,
        moderator: &Moderator,
        bulk: bool,
    ) {
        self.record(
            id,
            ModerationEventType::StatusChanged {
                from: previous.status(),
                to: result.state.status(),
                actor: moderator.email.clone(),
                bulk,
            },
        )
        .await;
    }

    /// Approve or reject one submission.
    pub async fn set_status(
        &self,
        session: &Session,
        id: SubmissionId,
        decision: Decision,
    ) -> Result<Submission, ModerationError> {
        let moderator = session.require_moderator()?;
        let mut submission = self.load(id).await?;

        let previous = submission.moderation.clone();
        let result = transition(
            previous.clone(),
            decision_event(decision, &submission, Utc::now()),
        );

        if result.state != previous {
            let affected = self.repo.save_moderation(id, &result.state).await?;
            if affected == 0 {
                return Err(ModerationError::not_found("submission", id));
            }
            if result.changes_status_from(&previous) {
                self.record_status_change(id, &previous, &result, moderator, false)
                    .await;
                info!(
                    "{} moved submission {} from {} to {}",
                    moderator.email,
                    id,
                    previous.status(),
                    result.state.status()
                );
            }
        }

        submission.moderation = result.state;
        execute_effects(self.collaborators.as_ref(), result.effects).await;
        Ok(submission)
    }

    /// Apply one decision to many submissions with a single storage write.
    ///
    /// Rows already in the target status count as updated. When fewer rows
    /// end up in the target status than were requested the whole call
    /// reports `BulkIncomplete`. History and notifications still go out for
    /// the rows a re-read shows did move.
    pub async fn bulk_set_status(
        &self,
        session: &Session,
        ids: &[SubmissionId],
        decision: Decision,
    ) -> Result<BulkReport, ModerationError> {
        let moderator = session.require_moderator()?;
        if ids.is_empty() {
            return Err(ValidationError::single("ids", "select at least one submission").into());
        }

        let mut seen = HashSet::new();
        let ids: Vec<SubmissionId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let requested = ids.len();

        let submissions = self.repo.get_submissions(&ids).await?;
        let at = Utc::now();

        let mut already = 0;
        let mut changed: Vec<(Submission, TransitionResult)> = Vec::new();
        for submission in submissions {
            let result = transition(
                submission.moderation.clone(),
                decision_event(decision, &submission, at),
            );
            if result.changes_status_from(&submission.moderation) {
                changed.push((submission, result));
            } else {
                already += 1;
            }
        }

        let mut affected = 0;
        if let Some((_, first)) = changed.first() {
            // Every changed row lands in the same state: Approved at `at` or Rejected
            let target = first.state.clone();
            let changed_ids: Vec<SubmissionId> = changed.iter().map(|(s, _)| s.id).collect();
            affected = self
                .repo
                .bulk_save_moderation(&changed_ids, &target)
                .await?;

            let landed: Vec<&(Submission, TransitionResult)> = if affected == changed.len() {
                changed.iter().collect()
            } else {
                warn!(
                    "Bulk {} wrote {} of {} changed rows; re-reading to find them",
                    decision.target_status(),
                    affected,
                    changed.len()
                );
                let reread = self.repo.get_submissions(&changed_ids).await;
                let moved: HashSet<SubmissionId> = match reread {
                    Ok(stored) => stored
                        .into_iter()
                        .filter(|s| s.moderation.status() == decision.target_status())
                        .map(|s| s.id)
                        .collect(),
                    Err(e) => {
                        warn!("Failed to re-read bulk rows, skipping notifications: {}", e);
                        HashSet::new()
                    }
                };
                changed.iter().filter(|(s, _)| moved.contains(&s.id)).collect()
            };

            for (submission, result) in landed.iter() {
                self.record_status_change(
                    submission.id,
                    &submission.moderation,
                    result,
                    moderator,
                    true,
                )
                .await;
            }
            for (_, result) in landed.iter() {
                execute_effects(self.collaborators.as_ref(), result.effects.clone()).await;
            }
        }

        let updated = already + affected;
        info!(
            "{} bulk-set {} of {} submissions to {}",
            moderator.email,
            updated,
            requested,
            decision.target_status()
        );
        if updated != requested {
            return Err(ModerationError::BulkIncomplete { requested, updated });
        }
        Ok(BulkReport {
            requested,
            updated,
            changed: affected,
        })
    }

    /// Set or clear (blank input) the moderator note.
    pub async fn update_note(
        &self,
        session: &Session,
        id: SubmissionId,
        note: Option<&str>,
    ) -> Result<Submission, ModerationError> {
        let moderator = session.require_moderator()?;
        let mut submission = self.load(id).await?;
        let note = note.map(str::trim).filter(|n| !n.is_empty());

        let affected = self.repo.update_note(id, note).await?;
        if affected == 0 {
            return Err(ModerationError::not_found("submission", id));
        }
        self.record(
            id,
            ModerationEventType::NoteUpdated {
                actor: moderator.email.clone(),
            },
        )
        .await;

        submission.admin_note = note.map(str::to_string);
        Ok(submission)
    }

    /// Cross-post an approved submission to social media.
    ///
    /// The outcome is stored on the submission either way. A failure is also
    /// returned to the caller.
    pub async fn cross_post(
        &self,
        session: &Session,
        id: SubmissionId,
    ) -> Result<Submission, ModerationError> {
        let moderator = session.require_moderator()?;
        let mut submission = self.load(id).await?;
        if !submission.moderation.is_approved() {
            return Err(ModerationError::InvalidState {
                message: format!(
                    "Only approved submissions can be cross-posted; submission {} is {}",
                    id,
                    submission.status()
                ),
            });
        }
        info!("{} requested cross-post of {}", moderator.email, id);

        let result = transition(
            submission.moderation.clone(),
            Event::CrossPostRequested { submission_id: id },
        );
        let mut state = result.state;
        let outcome = execute_effects(self.collaborators.as_ref(), result.effects).await;

        let mut failure = None;
        for event in outcome.events {
            if let Event::CrossPostFailed { error } = &event {
                failure = Some(error.clone());
            }
            let next = transition(state, event);
            state = next.state;
            execute_effects(self.collaborators.as_ref(), next.effects).await;
        }

        let affected = self.repo.save_moderation(id, &state).await?;
        if affected == 0 {
            return Err(ModerationError::not_found("submission", id));
        }
        let history = match &failure {
            Some(error) => ModerationEventType::CrossPostFailed {
                error: error.clone(),
            },
            None => ModerationEventType::CrossPostCompleted,
        };
        self.record(id, history).await;
        submission.moderation = state;

        if let Some(e) = outcome.unauthorized {
            return Err(e.into());
        }
        if let Some(message) = failure {
            return Err(ModerationError::Remote { message });
        }
        Ok(submission)
    }

    /// Hard-delete a submission, confirming the store actually removed it.
    pub async fn delete(&self, session: &Session, id: SubmissionId) -> Result<(), ModerationError> {
        let moderator = session.require_moderator()?;

        // A row that no longer decodes still exists and may be deleted
        match self.repo.get_submission(id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ModerationError::not_found("submission", id)),
            Err(e) if e.kind == RepositoryErrorKind::Corruption => {}
            Err(e) => return Err(e.into()),
        }

        let affected = self.repo.delete_submission(id).await?;
        if affected == 0 {
            warn!("Delete of submission {} affected no rows", id);
            return Err(ModerationError::DeleteNotApplied {
                what: "submission",
                id: id.to_string(),
            });
        }

        self.record(
            id,
            ModerationEventType::Deleted {
                actor: moderator.email.clone(),
            },
        )
        .await;
        info!("{} deleted submission {}", moderator.email, id);
        Ok(())
    }

    /// One page of submissions with their dojos.
    pub async fn list(
        &self,
        session: &Session,
        query: &SubmissionQuery,
    ) -> Result<Page<SubmissionView>, ModerationError> {
        session.require_moderator()?;
        let (submissions, total) = self.repo.list_submissions(query).await?;
        let dojos: HashMap<_, _> = self
            .repo
            .list_dojos()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let items = submissions
            .into_iter()
            .map(|submission| {
                let dojo = submission.dojo_id.and_then(|id| dojos.get(&id).cloned());
                SubmissionView { submission, dojo }
            })
            .collect();

        Ok(Page {
            items,
            total,
            offset: query.offset(),
            limit: query.limit(),
            seq: query.seq,
        })
    }

    pub async fn events(
        &self,
        session: &Session,
        id: SubmissionId,
    ) -> Result<Vec<SubmissionEvent>, ModerationError> {
        session.require_moderator()?;
        Ok(self.repo.get_events(id, EVENT_HISTORY_LIMIT).await?)
    }

    pub async fn export_csv(&self, session: &Session) -> Result<String, ModerationError> {
        let moderator = session.require_moderator()?;
        let submissions = self.repo.all_submissions().await?;
        let dojos = self.repo.list_dojos().await?;
        info!(
            "{} exported {} submissions",
            moderator.email,
            submissions.len()
        );
        Ok(submissions_csv(&submissions, &dojos))
    }

    /// Send challenge invitations through the invitation service.
    pub async fn send_invitations(
        &self,
        session: &Session,
        request: InvitationRequest,
    ) -> Result<InvitationReport, ModerationError> {
        let moderator = session.require_moderator()?;

        let emails: Vec<String> = request
            .emails
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        let mut errors = ValidationError::new();
        if emails.is_empty() {
            errors.push("emails", "at least one address is required");
        } else if emails.len() > MAX_INVITATIONS {
            errors.push(
                "emails",
                format!("at most {} addresses per batch", MAX_INVITATIONS),
            );
        }
        let invalid: Vec<&str> = emails
            .iter()
            .filter(|e| !is_valid_email(e))
            .map(String::as_str)
            .collect();
        if !invalid.is_empty() {
            errors.push("emails", format!("invalid addresses: {}", invalid.join(", ")));
        }
        errors.into_result()?;

        let request = InvitationRequest {
            emails,
            message: request
                .message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        };
        let report = self.collaborators.send_invitations(&request).await?;
        info!(
            "{} sent {} invitations ({} failed)",
            moderator.email,
            report.sent,
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fake::FakeCollaborators;
    use crate::collaborators::{CollaboratorError, Service};
    use crate::model::Level;
    use crate::state_machine::repository::{InMemoryRepository, SqliteRepository};
    use crate::state_machine::{SocialLinks, SocialPost, SubmissionStatus};
    use chrono::Duration;
    use kata_core::VideoRef;

    fn moderator() -> Session {
        Session::Moderator(Moderator {
            email: "admin@example.com".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    fn submission(state: ModerationState) -> Submission {
        Submission {
            id: SubmissionId::new(),
            dojo_id: None,
            country: "Japan".to_string(),
            email: "judoka@example.com".to_string(),
            video: VideoRef::External {
                url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            },
            level: Level::new(1).unwrap(),
            participant_names: None,
            message: None,
            moderation: state,
            submitted_at: Utc::now(),
            admin_note: None,
        }
    }

    struct Harness {
        repo: Arc<InMemoryRepository>,
        fake: Arc<FakeCollaborators>,
        service: ModerationService,
    }

    fn harness_with(fake: FakeCollaborators) -> Harness {
        let repo = Arc::new(InMemoryRepository::new());
        let fake = Arc::new(fake);
        let service = ModerationService::new(repo.clone(), fake.clone());
        Harness {
            repo,
            fake,
            service,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeCollaborators::default())
    }

    async fn stored(h: &Harness, id: SubmissionId) -> Submission {
        h.repo.get_submission(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn approve_persists_and_notifies() {
        let h = harness();
        let s = submission(ModerationState::Pending);
        h.repo.insert_submission(&s).await.unwrap();

        let updated = h
            .service
            .set_status(&moderator(), s.id, Decision::Approve)
            .await
            .unwrap();

        assert!(updated.moderation.approved_at().is_some());
        assert_eq!(stored(&h, s.id).await.status(), SubmissionStatus::Approved);
        let notified = h.fake.notified();
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].1, SubmissionStatus::Approved);
        let events = h.repo.get_events(s.id, 10).await.unwrap();
        assert_eq!(events[0].event_type.variant_name(), "StatusChanged");
    }

    #[tokio::test]
    async fn reject_clears_approval() {
        let h = harness();
        let s = submission(ModerationState::approved(Utc::now()));
        h.repo.insert_submission(&s).await.unwrap();

        h.service
            .set_status(&moderator(), s.id, Decision::Reject)
            .await
            .unwrap();

        let after = stored(&h, s.id).await;
        assert_eq!(after.moderation, ModerationState::Rejected);
        assert_eq!(after.moderation.approved_at(), None);
    }

    #[tokio::test]
    async fn repeat_decision_is_silent() {
        let h = harness();
        let s = submission(ModerationState::Rejected);
        h.repo.insert_submission(&s).await.unwrap();

        h.service
            .set_status(&moderator(), s.id, Decision::Reject)
            .await
            .unwrap();

        assert!(h.fake.notified().is_empty());
        assert!(h.repo.get_events(s.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_keeps_the_decision() {
        let h = harness_with(FakeCollaborators {
            fail_notifications: true,
            ..Default::default()
        });
        let s = submission(ModerationState::Pending);
        h.repo.insert_submission(&s).await.unwrap();

        let result = h
            .service
            .set_status(&moderator(), s.id, Decision::Approve)
            .await;

        assert!(result.is_ok());
        assert_eq!(stored(&h, s.id).await.status(), SubmissionStatus::Approved);
    }

    #[tokio::test]
    async fn anonymous_and_expired_sessions_are_refused() {
        let h = harness();
        let s = submission(ModerationState::Pending);
        h.repo.insert_submission(&s).await.unwrap();

        let err = h
            .service
            .set_status(&Session::Anonymous, s.id, Decision::Approve)
            .await
            .unwrap_err();
        assert_eq!(err, ModerationError::Unauthenticated);

        let err = h.service.delete(&Session::Expired, s.id).await.unwrap_err();
        assert!(matches!(err, ModerationError::Unauthorized { .. }));
        assert_eq!(stored(&h, s.id).await.status(), SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn missing_submission_is_not_found() {
        let h = harness();
        let err = h
            .service
            .set_status(&moderator(), SubmissionId::new(), Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn bulk_approve_changes_and_notifies_each_row() {
        let h = harness();
        let a = submission(ModerationState::Pending);
        let b = submission(ModerationState::Rejected);
        let c = submission(ModerationState::approved(Utc::now()));
        for s in [&a, &b, &c] {
            h.repo.insert_submission(s).await.unwrap();
        }

        let report = h
            .service
            .bulk_set_status(&moderator(), &[a.id, b.id, c.id], Decision::Approve)
            .await
            .unwrap();

        assert_eq!(
            report,
            BulkReport {
                requested: 3,
                updated: 3,
                changed: 2
            }
        );
        assert_eq!(h.fake.notified().len(), 2);
        assert!(stored(&h, b.id).await.moderation.is_approved());
    }

    #[tokio::test]
    async fn bulk_with_unknown_id_is_incomplete() {
        let h = harness();
        let a = submission(ModerationState::Pending);
        h.repo.insert_submission(&a).await.unwrap();

        let err = h
            .service
            .bulk_set_status(&moderator(), &[a.id, SubmissionId::new()], Decision::Reject)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ModerationError::BulkIncomplete {
                requested: 2,
                updated: 1
            }
        );
        // The row that did change was still written and announced
        assert_eq!(stored(&h, a.id).await.status(), SubmissionStatus::Rejected);
        assert_eq!(h.fake.notified().len(), 1);
    }

    #[tokio::test]
    async fn bulk_requires_ids() {
        let h = harness();
        let err = h
            .service
            .bulk_set_status(&moderator(), &[], Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
    }

    #[tokio::test]
    async fn bulk_write_silently_dropped_is_reported() {
        let repo = Arc::new(SqliteRepository::new_in_memory().unwrap());
        let fake = Arc::new(FakeCollaborators::default());
        let service = ModerationService::new(repo.clone(), fake.clone());
        let a = submission(ModerationState::Pending);
        let b = submission(ModerationState::Pending);
        repo.insert_submission(&a).await.unwrap();
        repo.insert_submission(&b).await.unwrap();
        repo.conn
            .lock()
            .unwrap()
            .execute_batch(&format!(
                "CREATE TRIGGER drop_update BEFORE UPDATE ON submissions
                 WHEN OLD.id = '{}' BEGIN SELECT RAISE(IGNORE); END;",
                b.id
            ))
            .unwrap();

        let err = service
            .bulk_set_status(&moderator(), &[a.id, b.id], Decision::Approve)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ModerationError::BulkIncomplete {
                requested: 2,
                updated: 1
            }
        );
        // The row that did move still gets its history and notification
        let events = repo.get_events(a.id, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.variant_name(), "StatusChanged");
        assert_eq!(fake.notified().len(), 1);
        assert!(repo.get_events(b.id, 10).await.unwrap().is_empty());
        assert_eq!(
            repo.get_submission(b.id).await.unwrap().unwrap().status(),
            SubmissionStatus::Pending
        );
    }

    #[tokio::test]
    async fn delete_removes_and_records() {
        let h = harness();
        let s = submission(ModerationState::Pending);
        h.repo.insert_submission(&s).await.unwrap();

        h.service.delete(&moderator(), s.id).await.unwrap();

        assert!(h.repo.get_submission(s.id).await.unwrap().is_none());
        let events = h.repo.get_events(s.id, 10).await.unwrap();
        assert_eq!(events[0].event_type.variant_name(), "Deleted");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let h = harness();
        let err = h
            .service
            .delete(&moderator(), SubmissionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_affecting_no_rows_is_an_error() {
        let repo = Arc::new(SqliteRepository::new_in_memory().unwrap());
        let service = ModerationService::new(repo.clone(), Arc::new(FakeCollaborators::default()));
        let s = submission(ModerationState::Pending);
        repo.insert_submission(&s).await.unwrap();
        repo.conn
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER keep_rows BEFORE DELETE ON submissions
                 BEGIN SELECT RAISE(IGNORE); END;",
            )
            .unwrap();

        let err = service.delete(&moderator(), s.id).await.unwrap_err();

        assert!(matches!(err, ModerationError::DeleteNotApplied { .. }));
        assert!(err.to_string().contains("log out and log back in"));
        assert!(repo.get_submission(s.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn note_is_trimmed_and_blank_clears() {
        let h = harness();
        let s = submission(ModerationState::Pending);
        h.repo.insert_submission(&s).await.unwrap();

        let updated = h
            .service
            .update_note(&moderator(), s.id, Some("  check audio "))
            .await
            .unwrap();
        assert_eq!(updated.admin_note.as_deref(), Some("check audio"));

        h.service
            .update_note(&moderator(), s.id, Some("   "))
            .await
            .unwrap();
        assert_eq!(stored(&h, s.id).await.admin_note, None);
    }

    #[tokio::test]
    async fn cross_post_requires_approval() {
        let h = harness();
        let s = submission(ModerationState::Pending);
        h.repo.insert_submission(&s).await.unwrap();

        let err = h.service.cross_post(&moderator(), s.id).await.unwrap_err();

        assert!(matches!(err, ModerationError::InvalidState { .. }));
        assert!(h.fake.cross_posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cross_post_success_stores_links() {
        let links = SocialLinks {
            facebook_url: Some("https://facebook.example/p/1".to_string()),
            instagram_url: None,
            youtube_url: None,
        };
        let h = harness_with(FakeCollaborators {
            cross_post_result: Some(Ok(links.clone())),
            ..Default::default()
        });
        let s = submission(ModerationState::approved(Utc::now()));
        h.repo.insert_submission(&s).await.unwrap();

        let updated = h.service.cross_post(&moderator(), s.id).await.unwrap();

        assert!(matches!(
            updated.moderation.social(),
            Some(SocialPost::Posted { links: stored_links, .. }) if *stored_links == links
        ));
        assert_eq!(stored(&h, s.id).await.moderation, updated.moderation);
    }

    #[tokio::test]
    async fn cross_post_failure_is_stored_and_returned() {
        let h = harness_with(FakeCollaborators {
            cross_post_result: Some(Err(CollaboratorError::Http {
                service: Service::CrossPost,
                status: 500,
                body: "instagram down".to_string(),
            })),
            ..Default::default()
        });
        let s = submission(ModerationState::approved(Utc::now()));
        h.repo.insert_submission(&s).await.unwrap();

        let err = h.service.cross_post(&moderator(), s.id).await.unwrap_err();

        assert!(matches!(
            err,
            ModerationError::Remote { ref message } if message.contains("instagram down")
        ));
        assert!(matches!(
            stored(&h, s.id).await.moderation.social(),
            Some(SocialPost::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn failed_repost_keeps_earlier_links() {
        let h = harness_with(FakeCollaborators {
            cross_post_result: Some(Err(CollaboratorError::Http {
                service: Service::CrossPost,
                status: 502,
                body: "upstream gone".to_string(),
            })),
            ..Default::default()
        });
        let links = SocialLinks {
            facebook_url: Some("https://fb.example/1".to_string()),
            instagram_url: None,
            youtube_url: None,
        };
        let s = submission(ModerationState::Approved {
            approved_at: Utc::now(),
            social: SocialPost::Posted {
                links: links.clone(),
                posted_at: Utc::now(),
            },
        });
        h.repo.insert_submission(&s).await.unwrap();

        h.service.cross_post(&moderator(), s.id).await.unwrap_err();

        let social = stored(&h, s.id).await.moderation.social().cloned();
        assert!(matches!(social, Some(SocialPost::Failed { .. })));
        let published = social.and_then(|p| p.published()).map(|p| p.links);
        assert_eq!(published, Some(links));
    }

    #[tokio::test]
    async fn cross_post_unauthorized_asks_to_reauthenticate() {
        let h = harness_with(FakeCollaborators {
            cross_post_result: Some(Err(CollaboratorError::Unauthorized {
                service: Service::CrossPost,
            })),
            ..Default::default()
        });
        let s = submission(ModerationState::approved(Utc::now()));
        h.repo.insert_submission(&s).await.unwrap();

        let err = h.service.cross_post(&moderator(), s.id).await.unwrap_err();

        assert!(matches!(err, ModerationError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn list_echoes_seq_and_attaches_dojo() {
        let h = harness();
        for _ in 0..3 {
            h.repo
                .insert_submission(&submission(ModerationState::Pending))
                .await
                .unwrap();
        }
        let query = SubmissionQuery {
            limit: Some(2),
            seq: Some(7),
            ..Default::default()
        };

        let page = h.service.list(&moderator(), &query).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert_eq!(page.seq, Some(7));
    }

    #[tokio::test]
    async fn export_includes_every_submission() {
        let h = harness();
        h.repo
            .insert_submission(&submission(ModerationState::Pending))
            .await
            .unwrap();
        h.repo
            .insert_submission(&submission(ModerationState::Rejected))
            .await
            .unwrap();

        let csv = h.service.export_csv(&moderator()).await.unwrap();

        assert_eq!(csv.matches("\r\n").count(), 3);
    }

    #[tokio::test]
    async fn invitations_are_validated_then_sent() {
        let h = harness();
        let err = h
            .service
            .send_invitations(
                &moderator(),
                InvitationRequest {
                    emails: vec!["ok@example.com".to_string(), "nope".to_string()],
                    message: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
        assert!(h.fake.invitations.lock().unwrap().is_empty());

        let report = h
            .service
            .send_invitations(
                &moderator(),
                InvitationRequest {
                    emails: vec![" a@example.com ".to_string(), "".to_string()],
                    message: Some("Join the kata challenge".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(
            h.fake.invitations.lock().unwrap()[0].emails,
            vec!["a@example.com".to_string()]
        );
    }
}

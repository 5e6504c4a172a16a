//! Public submission form.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::ModerationEventType;
use crate::error::{ModerationError, ValidationError};
use crate::model::{DojoKey, Level, NewDojo, Submission, SubmissionId};
use crate::state_machine::repository::Repository;
use crate::state_machine::ModerationState;
use kata_core::VideoRef;

/// Raw form input. Every field defaults so that missing input is reported as
/// a field error rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionForm {
    pub dojo_name: String,
    pub city: String,
    pub province: Option<String>,
    pub country: String,
    pub instructor_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub student_count: Option<u32>,
    pub video_url: String,
    pub level: Option<i64>,
    pub participant_names: Option<String>,
    pub message: Option<String>,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub dojo: NewDojo,
    pub email: String,
    pub video_url: String,
    pub level: Level,
    pub participant_names: Option<String>,
    pub message: Option<String>,
}

fn required(errors: &mut ValidationError, field: &'static str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(field, "is required");
    }
    value.to_string()
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Loose address check: one `@`, a non-empty local part and a dotted domain.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

pub(crate) fn is_http_url(value: &str) -> bool {
    matches!(
        url::Url::parse(value),
        Ok(u) if (u.scheme() == "http" || u.scheme() == "https") && u.host().is_some()
    )
}

impl SubmissionForm {
    /// Check every field, reporting all problems at once.
    pub fn validate(&self) -> Result<ValidSubmission, ValidationError> {
        let mut errors = ValidationError::new();

        let dojo_name = required(&mut errors, "dojo_name", &self.dojo_name);
        let city = required(&mut errors, "city", &self.city);
        let country = required(&mut errors, "country", &self.country);
        let instructor_name = required(&mut errors, "instructor_name", &self.instructor_name);

        let email = required(&mut errors, "email", &self.email);
        if !email.is_empty() && !is_valid_email(&email) {
            errors.push("email", "is not a valid email address");
        }

        let video_url = required(&mut errors, "video_url", &self.video_url);
        if !video_url.is_empty() && !is_http_url(&video_url) {
            errors.push("video_url", "must be an absolute http(s) URL");
        }

        let website = optional(&self.website);
        if let Some(site) = &website {
            if !is_http_url(site) {
                errors.push("website", "must be an absolute http(s) URL");
            }
        }

        let level = match self.level {
            None => {
                errors.push("level", "is required");
                None
            }
            Some(raw) => {
                let level = Level::new(raw);
                if level.is_none() {
                    errors.push(
                        "level",
                        format!("must be between {} and {}", Level::MIN, Level::MAX),
                    );
                }
                level
            }
        };

        errors.into_result()?;
        let Some(level) = level else {
            return Err(ValidationError::single("level", "is required"));
        };

        Ok(ValidSubmission {
            dojo: NewDojo {
                key: DojoKey::new(&dojo_name, &country, &city),
                province: optional(&self.province),
                instructor_name,
                email: email.clone(),
                phone: optional(&self.phone),
                website,
                student_count: self.student_count,
            },
            email,
            video_url,
            level,
            participant_names: optional(&self.participant_names),
            message: optional(&self.message),
        })
    }
}

pub struct IntakeService {
    repo: Arc<dyn Repository>,
}

impl IntakeService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Validate the form, register the dojo if new, and store a pending
    /// submission.
    pub async fn submit(&self, form: SubmissionForm) -> Result<Submission, ModerationError> {
        let valid = form.validate()?;

        let dojo = self.repo.find_or_create_dojo(&valid.dojo).await?;
        let submission = Submission {
            id: SubmissionId::new(),
            dojo_id: Some(dojo.id),
            country: dojo.country.clone(),
            email: valid.email,
            video: VideoRef::External {
                url: valid.video_url,
            },
            level: valid.level,
            participant_names: valid.participant_names,
            message: valid.message,
            moderation: ModerationState::Pending,
            submitted_at: Utc::now(),
            admin_note: None,
        };
        self.repo.insert_submission(&submission).await?;

        let event = ModerationEventType::Submitted {
            dojo_name: Some(dojo.name.clone()),
        };
        if let Err(e) = self.repo.log_event(submission.id, &event, Utc::now()).await {
            warn!("Failed to record submission event for {}: {}", submission.id, e);
        }

        info!(
            "Received level {} submission {} from {} ({})",
            submission.level, submission.id, dojo.name, dojo.country
        );
        Ok(submission)
    }
}

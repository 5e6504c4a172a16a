//! User-facing error taxonomy.
//!
//! Every operation reports one of these. Authorization failures from storage
//! or collaborators are folded into `Unauthorized` by kind, never by matching
//! message text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::collaborators::CollaboratorError;
use crate::state_machine::repository::{RepositoryError, RepositoryErrorKind};

/// Hint shown whenever a request is refused for authorization reasons.
pub const REAUTH_HINT: &str = "Permission denied. Please log out and log back in, then try again.";

/// A single invalid form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All validation problems found in one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(field, message);
        err
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `Ok(())` if nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "invalid input ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationError {
    /// Input rejected before any I/O.
    Validation(ValidationError),
    /// No session at all.
    Unauthenticated,
    /// Login with a wrong email or password.
    InvalidCredentials,
    /// Session expired, or storage/collaborator refused our credentials.
    Unauthorized { detail: String },
    NotFound { what: &'static str, id: String },
    /// The store accepted a delete that matched no rows.
    DeleteNotApplied { what: &'static str, id: String },
    /// A bulk update touched fewer rows than requested.
    BulkIncomplete { requested: usize, updated: usize },
    /// The operation does not apply to the record's current state.
    InvalidState { message: String },
    /// A collaborator call failed.
    Remote { message: String },
    Storage { message: String },
}

impl ModerationError {
    pub fn not_found(what: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::DeleteNotApplied { .. }
            | Self::BulkIncomplete { .. }
            | Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::Remote { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ModerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{}", e),
            Self::Unauthenticated => write!(f, "Sign in required"),
            Self::InvalidCredentials => write!(f, "Invalid email or password"),
            Self::Unauthorized { .. } => write!(f, "{}", REAUTH_HINT),
            Self::NotFound { what, id } => write!(f, "{} {} not found", what, id),
            Self::DeleteNotApplied { what, id } => write!(
                f,
                "Delete of {} {} was not applied: no rows were affected. {}",
                what, id, REAUTH_HINT
            ),
            Self::BulkIncomplete { requested, updated } => write!(
                f,
                "Bulk update incomplete: {} of {} submissions updated",
                updated, requested
            ),
            Self::InvalidState { message } => write!(f, "{}", message),
            Self::Remote { message } => write!(f, "{}", message),
            Self::Storage { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ModerationError {}

impl From<ValidationError> for ModerationError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<RepositoryError> for ModerationError {
    fn from(e: RepositoryError) -> Self {
        match e.kind {
            RepositoryErrorKind::PermissionDenied => Self::Unauthorized {
                detail: e.to_string(),
            },
            RepositoryErrorKind::Storage | RepositoryErrorKind::Corruption => Self::Storage {
                message: e.to_string(),
            },
        }
    }
}

impl From<CollaboratorError> for ModerationError {
    fn from(e: CollaboratorError) -> Self {
        match e {
            CollaboratorError::Unauthorized { .. } => Self::Unauthorized {
                detail: e.to_string(),
            },
            other => Self::Remote {
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let mut body = json!({ "error": self.to_string() });
        if let Self::Validation(v) = &self {
            body["fields"] = json!(v.fields);
        }
        (status, Json(body)).into_response()
    }
}

//! Outbound calls to the notification, invitation and cross-posting services.
//!
//! Each service is an opaque HTTP endpoint that accepts a JSON body. The
//! `Collaborators` trait is the seam the interpreter and moderation service
//! call through; tests substitute an in-process fake.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::model::SubmissionId;
use crate::state_machine::{SocialLinks, StatusNotice, SubmissionStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which collaborator a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Notification,
    Invitation,
    CrossPost,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notification => write!(f, "notification service"),
            Self::Invitation => write!(f, "invitation service"),
            Self::CrossPost => write!(f, "cross-post service"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// No endpoint configured for this service.
    NotConfigured { service: Service },
    /// The service refused our credentials (HTTP 401/403).
    Unauthorized { service: Service },
    /// Any other non-success response.
    Http {
        service: Service,
        status: u16,
        body: String,
    },
    /// The request never produced a response.
    Transport { service: Service, error: String },
    /// The response body did not match the expected shape.
    Decode { service: Service, error: String },
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured { service } => write!(f, "{} is not configured", service),
            Self::Unauthorized { service } => write!(f, "{} denied the request", service),
            Self::Http {
                service,
                status,
                body,
            } => write!(f, "{} returned HTTP {}: {}", service, status, body),
            Self::Transport { service, error } => {
                write!(f, "{} request failed: {}", service, error)
            }
            Self::Decode { service, error } => {
                write!(f, "{} sent an unexpected response: {}", service, error)
            }
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Batch of challenge invitations to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRequest {
    pub emails: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationReport {
    pub sent: usize,
    #[serde(default)]
    pub failed: Vec<String>,
}

#[async_trait]
pub trait Collaborators: Send + Sync {
    async fn notify_status_change(
        &self,
        notice: &StatusNotice,
        status: SubmissionStatus,
    ) -> Result<(), CollaboratorError>;

    async fn cross_post(&self, submission_id: SubmissionId)
        -> Result<SocialLinks, CollaboratorError>;

    async fn send_invitations(
        &self,
        request: &InvitationRequest,
    ) -> Result<InvitationReport, CollaboratorError>;
}

/// Endpoints of the collaborator services. Unset URLs disable that service.
#[derive(Debug, Clone, Default)]
pub struct CollaboratorEndpoints {
    pub notify_url: Option<String>,
    pub cross_post_url: Option<String>,
    pub invite_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
    email: &'a str,
    status: SubmissionStatus,
    country: &'a str,
    level: u8,
}

#[derive(Debug, Serialize)]
struct CrossPostBody {
    submission_id: SubmissionId,
}

/// HTTP implementation of [`Collaborators`].
#[derive(Clone)]
pub struct HttpCollaborators {
    client: Client,
    endpoints: CollaboratorEndpoints,
}

impl HttpCollaborators {
    pub fn new(endpoints: CollaboratorEndpoints) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, endpoints }
    }

    fn endpoint<'a>(
        &self,
        service: Service,
        url: &'a Option<String>,
    ) -> Result<&'a str, CollaboratorError> {
        url.as_deref()
            .ok_or(CollaboratorError::NotConfigured { service })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        service: Service,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.endpoints.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport {
                service,
                error: e.to_string(),
            })?;

        check_status(service, response).await
    }
}

async fn check_status(
    service: Service,
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CollaboratorError::Unauthorized { service });
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Http {
        service,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Collaborators for HttpCollaborators {
    async fn notify_status_change(
        &self,
        notice: &StatusNotice,
        status: SubmissionStatus,
    ) -> Result<(), CollaboratorError> {
        let service = Service::Notification;
        let url = self.endpoint(service, &self.endpoints.notify_url)?;
        let body = NotificationBody {
            email: &notice.email,
            status,
            country: &notice.country,
            level: notice.level,
        };
        self.post_json(service, url, &body).await?;
        info!("Sent {} notification", status);
        Ok(())
    }

    async fn cross_post(
        &self,
        submission_id: SubmissionId,
    ) -> Result<SocialLinks, CollaboratorError> {
        let service = Service::CrossPost;
        let url = self.endpoint(service, &self.endpoints.cross_post_url)?;
        let response = self
            .post_json(service, url, &CrossPostBody { submission_id })
            .await?;
        response
            .json::<SocialLinks>()
            .await
            .map_err(|e| CollaboratorError::Decode {
                service,
                error: e.to_string(),
            })
    }

    async fn send_invitations(
        &self,
        request: &InvitationRequest,
    ) -> Result<InvitationReport, CollaboratorError> {
        let service = Service::Invitation;
        let url = self.endpoint(service, &self.endpoints.invite_url)?;
        let response = self.post_json(service, url, request).await?;
        response
            .json::<InvitationReport>()
            .await
            .map_err(|e| CollaboratorError::Decode {
                service,
                error: e.to_string(),
            })
    }
}

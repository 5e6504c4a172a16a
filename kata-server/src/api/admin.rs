//! Moderator routes.
//!
//! Every handler except login turns the `Authorization` header into a
//! [`Session`] and hands it to the service, which decides whether the caller
//! may proceed.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{parse_kind, with_curated_kind};
use crate::auth::Session;
use crate::collaborators::InvitationRequest;
use crate::curated::CuratedInput;
use crate::error::{ModerationError, ValidationError};
use crate::model::{SubmissionId, SubmissionQuery};
use crate::state_machine::Decision;
use crate::AppState;

const EXPORT_FILENAME: &str = "kata-submissions.csv";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/submissions", get(list_submissions))
        .route("/api/admin/submissions/bulk", post(bulk_status))
        .route("/api/admin/submissions/:id", axum::routing::delete(delete_submission))
        .route("/api/admin/submissions/:id/approve", post(approve))
        .route("/api/admin/submissions/:id/reject", post(reject))
        .route("/api/admin/submissions/:id/note", put(update_note))
        .route("/api/admin/submissions/:id/cross-post", post(cross_post))
        .route("/api/admin/submissions/:id/events", get(submission_events))
        .route("/api/admin/export.csv", get(export_csv))
        .route("/api/admin/invitations", post(send_invitations))
        .route(
            "/api/admin/content/:kind",
            get(list_content).post(create_content),
        )
        .route("/api/admin/content/:kind/order", put(reorder_content))
        .route(
            "/api/admin/content/:kind/:id",
            put(update_content).delete(delete_content),
        )
}

fn session(state: &AppState, headers: &HeaderMap) -> Session {
    state.authenticator.session_from_headers(headers)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ModerationError> {
    let issued = state.authenticator.login(&request.email, &request.password)?;
    Ok(Json(issued).into_response())
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SubmissionQuery>,
) -> Result<Response, ModerationError> {
    let page = state
        .moderation
        .list(&session(&state, &headers), &query)
        .await?;
    Ok(Json(page).into_response())
}

async fn set_status(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    decision: Decision,
) -> Result<Response, ModerationError> {
    let submission = state
        .moderation
        .set_status(&session(state, headers), SubmissionId(id), decision)
        .await?;
    Ok(Json(submission).into_response())
}

async fn approve(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ModerationError> {
    set_status(&state, &headers, id, Decision::Approve).await
}

async fn reject(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ModerationError> {
    set_status(&state, &headers, id, Decision::Reject).await
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    ids: Vec<SubmissionId>,
    decision: Decision,
}

async fn bulk_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<BulkRequest>,
) -> Result<Response, ModerationError> {
    let report = state
        .moderation
        .bulk_set_status(&session(&state, &headers), &request.ids, request.decision)
        .await?;
    Ok(Json(report).into_response())
}

#[derive(Debug, Deserialize)]
struct NoteRequest {
    #[serde(default)]
    note: Option<String>,
}

async fn update_note(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<NoteRequest>,
) -> Result<Response, ModerationError> {
    let submission = state
        .moderation
        .update_note(
            &session(&state, &headers),
            SubmissionId(id),
            request.note.as_deref(),
        )
        .await?;
    Ok(Json(submission).into_response())
}

async fn cross_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ModerationError> {
    let submission = state
        .moderation
        .cross_post(&session(&state, &headers), SubmissionId(id))
        .await?;
    Ok(Json(submission).into_response())
}

async fn delete_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ModerationError> {
    state
        .moderation
        .delete(&session(&state, &headers), SubmissionId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submission_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ModerationError> {
    let events = state
        .moderation
        .events(&session(&state, &headers), SubmissionId(id))
        .await?;
    Ok(Json(events).into_response())
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ModerationError> {
    let csv = state
        .moderation
        .export_csv(&session(&state, &headers))
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        csv,
    )
        .into_response())
}

async fn send_invitations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<InvitationRequest>,
) -> Result<Response, ModerationError> {
    let report = state
        .moderation
        .send_invitations(&session(&state, &headers), request)
        .await?;
    Ok(Json(report).into_response())
}

// Curated content. Bodies are decoded per kind, so they arrive as raw JSON.

fn decode_input<T: serde::de::DeserializeOwned>(
    body: serde_json::Value,
) -> Result<CuratedInput<T>, ModerationError> {
    serde_json::from_value(body)
        .map_err(|e| ValidationError::single("body", e.to_string()).into())
}

async fn list_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<String>,
) -> Result<Response, ModerationError> {
    session(&state, &headers).require_moderator()?;
    let kind = parse_kind(&kind)?;
    with_curated_kind!(kind, Item => {
        let records = state.curated::<Item>().list(false).await?;
        Ok(Json(records).into_response())
    })
}

async fn create_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ModerationError> {
    let session = session(&state, &headers);
    let kind = parse_kind(&kind)?;
    with_curated_kind!(kind, Item => {
        let input = decode_input::<Item>(body)?;
        let record = state.curated::<Item>().create(&session, input).await?;
        Ok((StatusCode::CREATED, Json(record)).into_response())
    })
}

async fn update_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ModerationError> {
    let session = session(&state, &headers);
    let kind = parse_kind(&kind)?;
    with_curated_kind!(kind, Item => {
        let input = decode_input::<Item>(body)?;
        let record = state.curated::<Item>().update(&session, id, input).await?;
        Ok(Json(record).into_response())
    })
}

async fn delete_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ModerationError> {
    let session = session(&state, &headers);
    let kind = parse_kind(&kind)?;
    with_curated_kind!(kind, Item => {
        state.curated::<Item>().delete(&session, id).await?;
        Ok(StatusCode::NO_CONTENT)
    })
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    ids: Vec<Uuid>,
}

async fn reorder_content(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<Response, ModerationError> {
    let session = session(&state, &headers);
    let kind = parse_kind(&kind)?;
    with_curated_kind!(kind, Item => {
        let records = state.curated::<Item>().reorder(&session, &request.ids).await?;
        Ok(Json(records).into_response())
    })
}

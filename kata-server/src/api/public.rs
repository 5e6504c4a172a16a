//! Public routes: intake, challenge stats, gallery, badges and curated
//! content.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::{parse_kind, with_curated_kind};
use crate::error::ModerationError;
use crate::intake::SubmissionForm;
use crate::model::DojoId;
use crate::stats::{challenge_stats, gallery, hall_of_fame};
use crate::AppState;
use kata_core::{badge_report, extract_video_id, BadgeReport};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/help", get(help_handler))
        .route("/api/submissions", post(submit))
        .route("/api/stats", get(stats))
        .route("/api/hall-of-fame", get(hall_of_fame_handler))
        .route("/api/gallery", get(gallery_handler))
        .route("/api/badges", get(badges))
        .route("/api/dojos/:id/badges", get(dojo_badges))
        .route("/api/video-id", get(video_id))
        .route("/api/content/:kind", get(published_content))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "kata-server"
    }))
}

async fn help_handler() -> Json<serde_json::Value> {
    let version = crate::get_service_version();
    Json(json!({
        "service": "kata-server",
        "version": version,
        "description": "Kata challenge submissions, moderation and public content",
        "endpoints": [
            { "path": "/health", "method": "GET", "authentication": "None" },
            { "path": "/api/submissions", "method": "POST", "authentication": "None" },
            { "path": "/api/stats", "method": "GET", "authentication": "None" },
            { "path": "/api/hall-of-fame", "method": "GET", "authentication": "None" },
            { "path": "/api/gallery", "method": "GET", "authentication": "None" },
            { "path": "/api/badges?count=N", "method": "GET", "authentication": "None" },
            { "path": "/api/dojos/:id/badges", "method": "GET", "authentication": "None" },
            { "path": "/api/video-id?url=", "method": "GET", "authentication": "None" },
            { "path": "/api/content/:kind", "method": "GET", "authentication": "None" },
            { "path": "/api/admin/login", "method": "POST", "authentication": "None" },
            { "path": "/api/admin/*", "method": "*", "authentication": "Bearer session token" }
        ],
        "configuration": {
            "required_env_vars": [
                "ADMIN_EMAIL",
                "ADMIN_PASSWORD_HASH",
                "SESSION_SECRET"
            ],
            "optional_env_vars": [
                "PORT (default: 3000)",
                "STATE_DIR (default: current directory)",
                "SESSION_TTL_SECS (default: 28800)",
                "NOTIFY_URL",
                "CROSS_POST_URL",
                "INVITE_URL",
                "FUNCTIONS_API_KEY"
            ]
        }
    }))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Json(form): Json<SubmissionForm>,
) -> Result<Response, ModerationError> {
    let submission = state.intake.submit(form).await?;
    Ok((StatusCode::CREATED, Json(submission)).into_response())
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Response, ModerationError> {
    let submissions = state.repo.all_submissions().await?;
    Ok(Json(challenge_stats(&submissions)).into_response())
}

async fn hall_of_fame_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ModerationError> {
    let submissions = state.repo.all_submissions().await?;
    let dojos = state.repo.list_dojos().await?;
    Ok(Json(hall_of_fame(&submissions, &dojos)).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    offset: Option<usize>,
    limit: Option<usize>,
}

async fn gallery_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Response, ModerationError> {
    let submissions = state.repo.all_submissions().await?;
    let dojos = state.repo.list_dojos().await?;
    Ok(Json(gallery(&submissions, &dojos, params.offset, params.limit)).into_response())
}

#[derive(Debug, Deserialize)]
struct BadgeParams {
    #[serde(default)]
    count: u32,
}

async fn badges(Query(params): Query<BadgeParams>) -> Json<BadgeReport> {
    Json(badge_report(params.count))
}

#[derive(Debug, Serialize)]
struct DojoBadges {
    dojo_id: DojoId,
    dojo_name: String,
    #[serde(flatten)]
    report: BadgeReport,
}

async fn dojo_badges(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ModerationError> {
    let id = DojoId(id);
    let dojo = state
        .repo
        .get_dojo(id)
        .await?
        .ok_or_else(|| ModerationError::not_found("dojo", id))?;
    let approved = state.repo.count_approved_for_dojo(id).await?;
    let count = u32::try_from(approved).unwrap_or(u32::MAX);
    Ok(Json(DojoBadges {
        dojo_id: dojo.id,
        dojo_name: dojo.name,
        report: badge_report(count),
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
struct VideoIdParams {
    #[serde(default)]
    url: String,
}

async fn video_id(Query(params): Query<VideoIdParams>) -> Json<serde_json::Value> {
    Json(json!({ "video_id": extract_video_id(&params.url) }))
}

async fn published_content(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Response, ModerationError> {
    let kind = parse_kind(&kind)?;
    with_curated_kind!(kind, Item => {
        let records = state.curated::<Item>().list(true).await?;
        Ok(Json(records).into_response())
    })
}

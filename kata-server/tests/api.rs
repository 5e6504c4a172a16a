use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use kata_server::api::router;
use kata_server::auth::hash_password;
use kata_server::collaborators::{
    CollaboratorError, Collaborators, InvitationReport, InvitationRequest,
};
use kata_server::model::SubmissionId;
use kata_server::state_machine::{SocialLinks, StatusNotice, SubmissionStatus};
use kata_server::{AppState, Authenticator, InMemoryRepository};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Collaborators that accept everything and do nothing.
struct QuietCollaborators;

#[async_trait]
impl Collaborators for QuietCollaborators {
    async fn notify_status_change(
        &self,
        _notice: &StatusNotice,
        _status: SubmissionStatus,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn cross_post(
        &self,
        _submission_id: SubmissionId,
    ) -> Result<SocialLinks, CollaboratorError> {
        Ok(SocialLinks {
            youtube_url: Some("https://youtube.example/v/1".to_string()),
            ..Default::default()
        })
    }

    async fn send_invitations(
        &self,
        request: &InvitationRequest,
    ) -> Result<InvitationReport, CollaboratorError> {
        Ok(InvitationReport {
            sent: request.emails.len(),
            failed: vec![],
        })
    }
}

fn app() -> Router {
    let hash = hash_password(ADMIN_PASSWORD).unwrap();
    let authenticator = Authenticator::new(
        ADMIN_EMAIL,
        &hash,
        "test-session-secret",
        chrono::Duration::hours(1),
    );
    let state = AppState::new(
        Arc::new(InMemoryRepository::new()),
        Arc::new(QuietCollaborators),
        authenticator,
    );
    router(Arc::new(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn form() -> Value {
    json!({
        "dojo_name": "Kodokan",
        "city": "Tokyo",
        "country": "Japan",
        "instructor_name": "Kano Jigoro",
        "email": "sensei@kodokan.example",
        "video_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "level": 2
    })
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        with_json(
            "POST",
            "/api/admin/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn submit(app: &Router) -> String {
    let (status, body) = send(app, with_json("POST", "/api/submissions", None, form())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_and_help() {
    let app = app();
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/help", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "kata-server");
}

#[tokio::test]
async fn invalid_submission_reports_fields() {
    let app = app();
    let (status, body) = send(
        &app,
        with_json(
            "POST",
            "/api/submissions",
            None,
            json!({ "email": "nope", "level": 9 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"level"));
}

#[tokio::test]
async fn submission_appears_in_stats_as_pending() {
    let app = app();
    submit(&app).await;

    let (status, body) = send(&app, get("/api/stats", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["pending"], 1);
    assert_eq!(body["approved"], 0);
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let app = app();
    let (status, _) = send(&app, get("/api/admin/submissions", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/api/admin/submissions", Some("garbage"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("log out and log back in"));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = app();
    let (status, _) = send(
        &app,
        with_json(
            "POST",
            "/api/admin/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": "guess" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn approval_flows_to_gallery_and_badges() {
    let app = app();
    let token = login(&app).await;
    let id = submit(&app).await;

    let (status, body) = send(
        &app,
        with_json(
            "POST",
            &format!("/api/admin/submissions/{}/approve", id),
            Some(&token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moderation"]["status"], "approved");

    let (_, gallery) = send(&app, get("/api/gallery", None)).await;
    assert_eq!(gallery["total"], 1);
    assert_eq!(gallery["items"][0]["video"]["mode"], "embedded");
    assert_eq!(gallery["items"][0]["video"]["video_id"], "dQw4w9WgXcQ");

    let (_, fame) = send(&app, get("/api/hall-of-fame", None)).await;
    assert_eq!(fame[0]["dojo_name"], "Kodokan");
    assert_eq!(fame[0]["approved_count"], 1);
    let dojo_id = fame[0]["dojo_id"].as_str().unwrap().to_string();

    let (status, badges) = send(&app, get(&format!("/api/dojos/{}/badges", dojo_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(badges["count"], 1);
    assert_eq!(badges["earned"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn listing_echoes_seq() {
    let app = app();
    let token = login(&app).await;
    submit(&app).await;

    let (status, body) = send(
        &app,
        get(
            "/api/admin/submissions?status=pending&search=kodokan&seq=42",
            Some(&token),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["seq"], 42);
    assert_eq!(body["items"][0]["dojo"]["name"], "Kodokan");
}

#[tokio::test]
async fn bulk_with_unknown_id_conflicts() {
    let app = app();
    let token = login(&app).await;
    let id = submit(&app).await;

    let (status, body) = send(
        &app,
        with_json(
            "POST",
            "/api/admin/submissions/bulk",
            Some(&token),
            json!({
                "ids": [id, "00000000-0000-0000-0000-000000000000"],
                "decision": "reject"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("1 of 2"));
}

#[tokio::test]
async fn delete_then_not_found() {
    let app = app();
    let token = login(&app).await;
    let id = submit(&app).await;
    let uri = format!("/api/admin/submissions/{}", id);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The history outlives the submission
    let (_, events) = send(
        &app,
        get(&format!("{}/events", uri), Some(&token)),
    )
    .await;
    assert_eq!(events[0]["event_type"]["type"], "Deleted");
}

#[tokio::test]
async fn export_is_csv_attachment() {
    let app = app();
    let token = login(&app).await;
    submit(&app).await;

    let response = app
        .clone()
        .oneshot(get("/api/admin/export.csv", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("attachment"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("id,submitted_at,status"));
    assert_eq!(text.lines().count(), 2);
}

#[tokio::test]
async fn video_id_lookup() {
    let app = app();
    let uri = "/api/video-id?url=https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ";
    let (_, body) = send(&app, get(uri, None)).await;
    assert_eq!(body["video_id"], "dQw4w9WgXcQ");

    let (_, body) = send(&app, get("/api/video-id?url=https%3A%2F%2Fvimeo.com%2F1", None)).await;
    assert_eq!(body["video_id"], Value::Null);
}

#[tokio::test]
async fn badges_for_arbitrary_count() {
    let app = app();
    let (status, body) = send(&app, get("/api/badges?count=3", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["target"], 5);
    assert_eq!(body["progress"]["percentage"], 50);
}

#[tokio::test]
async fn curated_content_round_trip() {
    let app = app();
    let token = login(&app).await;

    let (status, _) = send(&app, get("/api/content/recipes", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, created) = send(
        &app,
        with_json(
            "POST",
            "/api/admin/content/founders",
            Some(&token),
            json!({ "name": "Kano Jigoro", "role": "Founder", "bio": "Created judo." }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, hidden) = send(
        &app,
        with_json(
            "POST",
            "/api/admin/content/founders",
            Some(&token),
            json!({ "name": "Draft", "role": "Founder", "bio": "Not yet.", "published": false }),
        ),
    )
    .await;

    let (_, public) = send(&app, get("/api/content/founders", None)).await;
    assert_eq!(public.as_array().unwrap().len(), 1);
    assert_eq!(public[0]["name"], "Kano Jigoro");

    let (status, reordered) = send(
        &app,
        with_json(
            "PUT",
            "/api/admin/content/founders/order",
            Some(&token),
            json!({ "ids": [hidden["id"], id] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reordered[0]["name"], "Draft");

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/content/founders/{}", id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

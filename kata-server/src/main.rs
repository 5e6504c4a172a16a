use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};

use kata_server::api::router;
use kata_server::config::Config;
use kata_server::{AppState, Authenticator, HttpCollaborators, SqliteRepository};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!(
        "Starting kata challenge server ({})",
        kata_server::get_service_version()
    );

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    let endpoints = &config.collaborators;
    for (name, url) in [
        ("NOTIFY_URL", &endpoints.notify_url),
        ("CROSS_POST_URL", &endpoints.cross_post_url),
        ("INVITE_URL", &endpoints.invite_url),
    ] {
        if url.is_none() {
            warn!("{} is not set; that collaborator is disabled", name);
        }
    }

    let db_path = config.state_dir.join("kata.db");
    info!("Using state database: {}", db_path.display());
    let repo = SqliteRepository::new(&db_path)
        .with_context(|| format!("Failed to initialize SQLite database at {}", db_path.display()))?;

    let authenticator = Authenticator::new(
        &config.admin_email,
        &config.admin_password_hash,
        &config.session_secret,
        config.session_ttl,
    );

    let app_state = Arc::new(AppState::new(
        Arc::new(repo),
        Arc::new(HttpCollaborators::new(config.collaborators.clone())),
        authenticator,
    ));

    let app = router(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

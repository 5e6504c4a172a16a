use anyhow::{bail, Context, Result};
use argon2::password_hash::PasswordHash;
use std::env;
use std::path::PathBuf;

use crate::collaborators::CollaboratorEndpoints;

/// Default session lifetime: eight hours.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 60 * 60;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub admin_email: String,
    /// Argon2 PHC string for the moderator password.
    pub admin_password_hash: String,
    /// Key used to sign session tokens.
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    pub collaborators: CollaboratorEndpoints,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let admin_email = env::var("ADMIN_EMAIL")
            .context("ADMIN_EMAIL environment variable is required")?
            .trim()
            .to_lowercase();
        if admin_email.is_empty() {
            bail!("ADMIN_EMAIL must not be blank");
        }

        let admin_password_hash = env::var("ADMIN_PASSWORD_HASH")
            .context("ADMIN_PASSWORD_HASH environment variable is required")?
            .trim()
            .to_string();
        parse_password_hash(&admin_password_hash)?;

        let session_secret = parse_optional(env::var("SESSION_SECRET").ok())
            .context("SESSION_SECRET environment variable is required and must not be blank")?;

        let session_ttl = parse_session_ttl(env::var("SESSION_TTL_SECS").ok())?;

        let collaborators = CollaboratorEndpoints {
            notify_url: parse_optional(env::var("NOTIFY_URL").ok()),
            cross_post_url: parse_optional(env::var("CROSS_POST_URL").ok()),
            invite_url: parse_optional(env::var("INVITE_URL").ok()),
            api_key: parse_optional(env::var("FUNCTIONS_API_KEY").ok()),
        };

        Ok(Config {
            port,
            state_dir,
            admin_email,
            admin_password_hash,
            session_secret,
            session_ttl,
            collaborators,
        })
    }
}

/// Treat a missing, empty, or whitespace-only value as unset.
pub fn parse_optional(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Session lifetime in seconds; must be positive.
pub fn parse_session_ttl(value: Option<String>) -> Result<chrono::Duration> {
    let Some(raw) = parse_optional(value) else {
        return Ok(chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS));
    };
    let secs = raw
        .trim()
        .parse::<i64>()
        .context("SESSION_TTL_SECS must be a whole number of seconds")?;
    if secs <= 0 {
        bail!("SESSION_TTL_SECS must be positive");
    }
    Ok(chrono::Duration::seconds(secs))
}

/// Fail at startup rather than on the first login.
pub fn parse_password_hash(value: &str) -> Result<()> {
    PasswordHash::new(value.trim())
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("ADMIN_PASSWORD_HASH is not a valid PHC string: {}", e))
}

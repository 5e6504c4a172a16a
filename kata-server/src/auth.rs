//! Moderator sessions.
//!
//! A moderator signs in with email and password (verified against an argon2
//! PHC hash) and receives a signed HS256 token. Each request turns its bearer
//! token into exactly one [`Session`], which admin operations take explicitly.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ModerationError;

const MODERATOR_ROLE: &str = "moderator";

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// No credentials presented.
    Anonymous,
    /// A token was presented but is expired or invalid.
    Expired,
    Moderator(Moderator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moderator {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn require_moderator(&self) -> Result<&Moderator, ModerationError> {
        match self {
            Session::Moderator(m) => Ok(m),
            Session::Anonymous => Err(ModerationError::Unauthenticated),
            Session::Expired => Err(ModerationError::Unauthorized {
                detail: "session token expired or invalid".to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Token returned from a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Verifies moderator credentials and session tokens.
pub struct Authenticator {
    admin_email: String,
    password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl Authenticator {
    pub fn new(admin_email: &str, password_hash: &str, secret: &str, ttl: Duration) -> Self {
        Self {
            admin_email: admin_email.trim().to_lowercase(),
            password_hash: password_hash.to_string(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<IssuedToken, ModerationError> {
        let email = email.trim().to_lowercase();
        let password_ok = match verify_password(password, &self.password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                warn!("Configured admin password hash is unusable: {}", e);
                false
            }
        };
        if email != self.admin_email || !password_ok {
            warn!("Rejected login attempt");
            return Err(ModerationError::InvalidCredentials);
        }
        info!("Moderator signed in");
        self.issue(&email)
    }

    pub fn issue(&self, email: &str) -> Result<IssuedToken, ModerationError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: email.to_string(),
            role: MODERATOR_ROLE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(
            |e| ModerationError::Storage {
                message: format!("failed to sign session token: {}", e),
            },
        )?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn session_from_token(&self, token: &str) -> Session {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) if data.claims.role == MODERATOR_ROLE => {
                let expires_at =
                    DateTime::from_timestamp(data.claims.exp, 0).unwrap_or_else(Utc::now);
                Session::Moderator(Moderator {
                    email: data.claims.sub,
                    expires_at,
                })
            }
            Ok(_) => Session::Expired,
            Err(e) => {
                if !matches!(e.kind(), ErrorKind::ExpiredSignature) {
                    warn!("Rejected session token: {}", e);
                }
                Session::Expired
            }
        }
    }

    /// Session for a request, from its `Authorization: Bearer` header.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Session {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Session::Anonymous;
        };
        match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => self.session_from_token(token.trim()),
            _ => Session::Expired,
        }
    }
}

/// Hash a password with argon2id, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String, ModerationError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ModerationError::Storage {
            message: format!("failed to hash password: {}", e),
        })
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, ModerationError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ModerationError::Storage {
        message: format!("invalid password hash format: {}", e),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn authenticator(ttl: Duration) -> Authenticator {
        let hash = hash_password("correct-horse").unwrap();
        Authenticator::new("Admin@Example.com", &hash, "test-secret", ttl)
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("hajime").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hajime", &hash).unwrap());
        assert!(!verify_password("matte", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn login_issues_moderator_session() {
        let auth = authenticator(Duration::hours(1));

        let issued = auth.login(" admin@example.com ", "correct-horse").unwrap();

        match auth.session_from_token(&issued.token) {
            Session::Moderator(m) => assert_eq!(m.email, "admin@example.com"),
            other => panic!("expected moderator session, got {:?}", other),
        }
    }

    #[test]
    fn wrong_credentials_are_rejected() {
        let auth = authenticator(Duration::hours(1));
        assert_eq!(
            auth.login("admin@example.com", "wrong").unwrap_err(),
            ModerationError::InvalidCredentials
        );
        assert_eq!(
            auth.login("someone@example.com", "correct-horse").unwrap_err(),
            ModerationError::InvalidCredentials
        );
    }

    #[test]
    fn expired_token_yields_expired_session() {
        // Past the default 60s validation leeway
        let auth = authenticator(Duration::minutes(-5));
        let issued = auth.issue("admin@example.com").unwrap();
        assert_eq!(auth.session_from_token(&issued.token), Session::Expired);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let auth = authenticator(Duration::hours(1));
        let hash = hash_password("x").unwrap();
        let other = Authenticator::new("admin@example.com", &hash, "other", Duration::hours(1));
        let issued = other.issue("admin@example.com").unwrap();
        assert_eq!(auth.session_from_token(&issued.token), Session::Expired);
    }

    #[test]
    fn headers_map_to_sessions() {
        let auth = authenticator(Duration::hours(1));
        assert_eq!(auth.session_from_headers(&HeaderMap::new()), Session::Anonymous);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(auth.session_from_headers(&headers), Session::Expired);

        let issued = auth.issue("admin@example.com").unwrap();
        let value = HeaderValue::from_str(&format!("Bearer {}", issued.token)).unwrap();
        headers.insert(header::AUTHORIZATION, value);
        assert!(matches!(
            auth.session_from_headers(&headers),
            Session::Moderator(_)
        ));
    }

    #[test]
    fn require_moderator_distinguishes_missing_and_expired() {
        assert_eq!(
            Session::Anonymous.require_moderator().unwrap_err(),
            ModerationError::Unauthenticated
        );
        assert!(matches!(
            Session::Expired.require_moderator().unwrap_err(),
            ModerationError::Unauthorized { .. }
        ));
    }
}

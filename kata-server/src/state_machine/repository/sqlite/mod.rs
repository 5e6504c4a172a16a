//! SQLite implementation of `Repository`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Row decoding
//!
//! Submissions are stored as flat columns and decoded into typed records
//! here. A row that cannot be decoded (unknown status, level out of range,
//! approved without an approval time) is corrupt: single-row reads fail,
//! list reads skip it with a warning.

mod curated;
mod events;


use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kata_core::VideoRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use tracing::{error, warn};
use uuid::Uuid;

use super::{CuratedRow, Repository, RepositoryError};
use crate::audit::{ModerationEventType, SubmissionEvent};
use crate::curated::CuratedKind;
use crate::model::{
    Dojo, DojoId, DojoKey, Level, NewDojo, Submission, SubmissionId, SubmissionQuery,
};
use crate::state_machine::state::{
    ModerationState, PublishedPost, SocialLinks, SocialPost, SubmissionStatus,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
pub(crate) const CURRENT_SCHEMA_VERSION: i64 = 2;

const SUBMISSION_COLUMNS: &str = "s.id, s.dojo_id, s.country, s.email, s.video_url, s.video_path, \
     s.level, s.participant_names, s.message, s.status, s.approved_at, s.submitted_at, \
     s.admin_note, s.facebook_url, s.instagram_url, s.youtube_url, s.social_posted_at, \
     s.upload_error";

const DOJO_COLUMNS: &str = "id, name, city, province, country, instructor_name, email, phone, \
     website, student_count, created_at";

/// SQLite-backed repository.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` for durability
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref).map_err(|e| sqlite_error("open database", e))?;

        // Submitter emails and phone numbers live here
        #[cfg(unix)]
        if !is_in_memory && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        // SQLite can silently keep DELETE mode on filesystems without shared
        // memory support. In-memory databases report "memory".
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| sqlite_error("set journal_mode", e))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| sqlite_error("configure pragmas", e))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| sqlite_error("create schema_version table", e))?;

        // 0 for a fresh database
        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| sqlite_error("get schema version", e))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        // Version 1: dojos, submissions and curated content
        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS dojos (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    city TEXT NOT NULL,
                    province TEXT,
                    country TEXT NOT NULL,
                    instructor_name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    phone TEXT,
                    website TEXT,
                    student_count INTEGER,
                    created_at TEXT NOT NULL,
                    UNIQUE (name, country, city)
                );

                CREATE TABLE IF NOT EXISTS submissions (
                    id TEXT PRIMARY KEY,
                    dojo_id TEXT REFERENCES dojos(id),
                    country TEXT NOT NULL,
                    email TEXT NOT NULL,
                    video_url TEXT,
                    video_path TEXT,
                    level INTEGER NOT NULL,
                    participant_names TEXT,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    approved_at TEXT,
                    submitted_at TEXT NOT NULL,
                    admin_note TEXT,
                    facebook_url TEXT,
                    instagram_url TEXT,
                    youtube_url TEXT,
                    social_posted_at TEXT,
                    upload_error TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_submissions_submitted_at
                    ON submissions(submitted_at DESC);
                CREATE INDEX IF NOT EXISTS idx_submissions_status
                    ON submissions(status);
                CREATE INDEX IF NOT EXISTS idx_submissions_dojo
                    ON submissions(dojo_id);

                CREATE TABLE IF NOT EXISTS curated_items (
                    kind TEXT NOT NULL,
                    id TEXT NOT NULL,
                    order_index INTEGER NOT NULL DEFAULT 0,
                    published INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    PRIMARY KEY (kind, id)
                );
                "#,
            )
            .map_err(|e| sqlite_error("migration v1", e))?;
        }

        // Version 2: per-submission moderation history
        if from_version < 2 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS submission_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    submission_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    event_data TEXT NOT NULL,
                    recorded_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_submission_events_lookup
                    ON submission_events(submission_id, id DESC);
                "#,
            )
            .map_err(|e| sqlite_error("migration v2", e))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| sqlite_error("update schema version", e))?;

        Ok(())
    }

    /// Create a new in-memory SQLite repository (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Run `f` against the connection on the blocking pool.
    pub(super) async fn with_conn<T, F>(
        &self,
        operation: &'static str,
        f: F,
    ) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn, operation)?;
            f(&guard)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

fn lock<'a>(
    conn: &'a Mutex<Connection>,
    operation: &'static str,
) -> Result<MutexGuard<'a, Connection>, RepositoryError> {
    conn.lock()
        .map_err(|_| RepositoryError::storage(operation, "database connection lock poisoned"))
}

/// Classify a rusqlite error. Privilege failures get their own kind so the
/// caller can ask the user to sign in again.
pub(super) fn sqlite_error(operation: &'static str, e: rusqlite::Error) -> RepositoryError {
    if let rusqlite::Error::SqliteFailure(ffi_error, _) = &e {
        if matches!(
            ffi_error.code,
            ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::AuthorizationForStatementDenied
        ) {
            error!("{} refused by database: {}", operation, e);
            return RepositoryError::permission_denied(operation, e.to_string());
        }
    }
    error!("{} failed: {}", operation, e);
    RepositoryError::storage(operation, e.to_string())
}

pub(super) fn usize_to_i64(value: usize, operation: &'static str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| {
        RepositoryError::storage(
            operation,
            format!("value {} exceeds maximum storable value ({})", value, i64::MAX),
        )
    })
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(raw).map_err(|_| RepositoryError::corruption(format!("{} id '{}'", what, raw)))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// =============================================================================
// Row mapping
// =============================================================================

fn dojo_from_row(row: &Row<'_>) -> rusqlite::Result<(String, Dojo)> {
    let id: String = row.get(0)?;
    let student_count: Option<i64> = row.get(9)?;
    Ok((
        id,
        Dojo {
            id: DojoId(Uuid::nil()),
            name: row.get(1)?,
            city: row.get(2)?,
            province: row.get(3)?,
            country: row.get(4)?,
            instructor_name: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
            website: row.get(8)?,
            student_count: student_count.and_then(|n| u32::try_from(n).ok()),
            created_at: row.get(10)?,
        },
    ))
}

fn decode_dojo((raw_id, mut dojo): (String, Dojo)) -> Result<Dojo, RepositoryError> {
    dojo.id = DojoId(parse_uuid(&raw_id, "dojo")?);
    Ok(dojo)
}

/// Submission columns exactly as stored.
struct SubmissionRow {
    id: String,
    dojo_id: Option<String>,
    country: String,
    email: String,
    video_url: Option<String>,
    video_path: Option<String>,
    level: i64,
    participant_names: Option<String>,
    message: Option<String>,
    status: String,
    approved_at: Option<DateTime<Utc>>,
    submitted_at: DateTime<Utc>,
    admin_note: Option<String>,
    facebook_url: Option<String>,
    instagram_url: Option<String>,
    youtube_url: Option<String>,
    social_posted_at: Option<DateTime<Utc>>,
    upload_error: Option<String>,
}

impl SubmissionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            dojo_id: row.get(1)?,
            country: row.get(2)?,
            email: row.get(3)?,
            video_url: row.get(4)?,
            video_path: row.get(5)?,
            level: row.get(6)?,
            participant_names: row.get(7)?,
            message: row.get(8)?,
            status: row.get(9)?,
            approved_at: row.get(10)?,
            submitted_at: row.get(11)?,
            admin_note: row.get(12)?,
            facebook_url: row.get(13)?,
            instagram_url: row.get(14)?,
            youtube_url: row.get(15)?,
            social_posted_at: row.get(16)?,
            upload_error: row.get(17)?,
        })
    }

    fn into_submission(self) -> Result<Submission, RepositoryError> {
        let id = SubmissionId(parse_uuid(&self.id, "submission")?);
        let dojo_id = match self.dojo_id.as_deref() {
            Some(raw) => Some(DojoId(parse_uuid(raw, "dojo")?)),
            None => None,
        };
        let level = Level::new(self.level).ok_or_else(|| {
            RepositoryError::corruption(format!("submission {}: level {}", id, self.level))
        })?;
        let status = SubmissionStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::corruption(format!("submission {}: status '{}'", id, self.status))
        })?;

        let moderation = match status {
            SubmissionStatus::Pending => ModerationState::Pending,
            SubmissionStatus::Rejected => ModerationState::Rejected,
            SubmissionStatus::Approved => {
                let approved_at = self.approved_at.ok_or_else(|| {
                    RepositoryError::corruption(format!(
                        "submission {}: approved without approved_at",
                        id
                    ))
                })?;
                let published = self.social_posted_at.map(|posted_at| PublishedPost {
                    links: SocialLinks {
                        facebook_url: self.facebook_url,
                        instagram_url: self.instagram_url,
                        youtube_url: self.youtube_url,
                    },
                    posted_at,
                });
                let social = match (self.upload_error, published) {
                    (Some(error), previous) => SocialPost::Failed { error, previous },
                    (None, Some(PublishedPost { links, posted_at })) => {
                        SocialPost::Posted { links, posted_at }
                    }
                    (None, None) => SocialPost::NotPosted,
                };
                ModerationState::Approved {
                    approved_at,
                    social,
                }
            }
        };

        if self.video_url.is_some() && self.video_path.is_some() {
            warn!("Submission {} has both a video URL and a hosted path; using the URL", id);
        }

        Ok(Submission {
            id,
            dojo_id,
            country: self.country,
            email: self.email,
            video: VideoRef::from_columns(self.video_url, self.video_path),
            level,
            participant_names: self.participant_names,
            message: self.message,
            moderation,
            submitted_at: self.submitted_at,
            admin_note: self.admin_note,
        })
    }
}

/// Decode rows, skipping corrupt ones.
fn decode_all(rows: Vec<SubmissionRow>) -> Vec<Submission> {
    rows.into_iter()
        .filter_map(|row| match row.into_submission() {
            Ok(submission) => Some(submission),
            Err(e) => {
                warn!("Skipping unreadable submission row: {}", e);
                None
            }
        })
        .collect()
}

/// Column values written for a moderation state.
struct ModerationColumns {
    status: &'static str,
    approved_at: Option<DateTime<Utc>>,
    facebook_url: Option<String>,
    instagram_url: Option<String>,
    youtube_url: Option<String>,
    social_posted_at: Option<DateTime<Utc>>,
    upload_error: Option<String>,
}

impl ModerationColumns {
    fn new(state: &ModerationState) -> Self {
        let mut columns = Self {
            status: state.status().as_str(),
            approved_at: state.approved_at(),
            facebook_url: None,
            instagram_url: None,
            youtube_url: None,
            social_posted_at: None,
            upload_error: None,
        };
        let Some(social) = state.social() else {
            return columns;
        };
        if let Some(PublishedPost { links, posted_at }) = social.published() {
            columns.facebook_url = links.facebook_url;
            columns.instagram_url = links.instagram_url;
            columns.youtube_url = links.youtube_url;
            columns.social_posted_at = Some(posted_at);
        }
        if let SocialPost::Failed { error, .. } = social {
            columns.upload_error = Some(error.clone());
        }
        columns
    }

    const SET_CLAUSE: &'static str = "status = ?1, approved_at = ?2, facebook_url = ?3, \
         instagram_url = ?4, youtube_url = ?5, social_posted_at = ?6, upload_error = ?7";

    fn values(&self) -> [&dyn ToSql; 7] {
        [
            &self.status,
            &self.approved_at,
            &self.facebook_url,
            &self.instagram_url,
            &self.youtube_url,
            &self.social_posted_at,
            &self.upload_error,
        ]
    }
}

fn query_submissions(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<SubmissionRow>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(|e| sqlite_error(operation, e))?;
    let rows = stmt
        .query_map(params, SubmissionRow::from_row)
        .map_err(|e| sqlite_error(operation, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| sqlite_error(operation, e))?;
    Ok(rows)
}

// =============================================================================
// Repository trait implementation
// =============================================================================

#[async_trait]
impl Repository for SqliteRepository {
    async fn find_or_create_dojo(&self, new: &NewDojo) -> Result<Dojo, RepositoryError> {
        let key = DojoKey::new(&new.key.name, &new.key.country, &new.key.city);
        let mut normalized = new.clone();
        normalized.key = key.clone();
        let candidate = Dojo::from_new(DojoId::new(), &normalized, Utc::now());
        let student_count = candidate.student_count.map(i64::from);

        self.with_conn("find or create dojo", move |conn| {
            conn.execute(
                "INSERT INTO dojos (id, name, city, province, country, instructor_name,
                                    email, phone, website, student_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(name, country, city) DO NOTHING",
                params![
                    candidate.id.to_string(),
                    candidate.name,
                    candidate.city,
                    candidate.province,
                    candidate.country,
                    candidate.instructor_name,
                    candidate.email,
                    candidate.phone,
                    candidate.website,
                    student_count,
                    candidate.created_at,
                ],
            )
            .map_err(|e| sqlite_error("insert dojo", e))?;

            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM dojos WHERE name = ?1 AND country = ?2 AND city = ?3",
                        DOJO_COLUMNS
                    ),
                    params![key.name, key.country, key.city],
                    dojo_from_row,
                )
                .map_err(|e| sqlite_error("find dojo", e))?;
            decode_dojo(raw)
        })
        .await
    }

    async fn get_dojo(&self, id: DojoId) -> Result<Option<Dojo>, RepositoryError> {
        self.with_conn("get dojo", move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {} FROM dojos WHERE id = ?1", DOJO_COLUMNS),
                    params![id.to_string()],
                    dojo_from_row,
                )
                .optional()
                .map_err(|e| sqlite_error("get dojo", e))?;
            raw.map(decode_dojo).transpose()
        })
        .await
    }

    async fn list_dojos(&self) -> Result<Vec<Dojo>, RepositoryError> {
        self.with_conn("list dojos", |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM dojos ORDER BY name, id", DOJO_COLUMNS))
                .map_err(|e| sqlite_error("list dojos", e))?;
            let raw = stmt
                .query_map([], dojo_from_row)
                .map_err(|e| sqlite_error("list dojos", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("list dojos", e))?;
            Ok(raw
                .into_iter()
                .filter_map(|r| match decode_dojo(r) {
                    Ok(dojo) => Some(dojo),
                    Err(e) => {
                        warn!("Skipping unreadable dojo row: {}", e);
                        None
                    }
                })
                .collect())
        })
        .await
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), RepositoryError> {
        let s = submission.clone();
        let columns = ModerationColumns::new(&s.moderation);

        self.with_conn("insert submission", move |conn| {
            conn.execute(
                "INSERT INTO submissions (id, dojo_id, country, email, video_url, video_path,
                     level, participant_names, message, submitted_at, admin_note,
                     status, approved_at, facebook_url, instagram_url, youtube_url,
                     social_posted_at, upload_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    s.id.to_string(),
                    s.dojo_id.map(|id| id.to_string()),
                    s.country,
                    s.email,
                    s.video.url(),
                    s.video.path(),
                    i64::from(s.level.get()),
                    s.participant_names,
                    s.message,
                    s.submitted_at,
                    s.admin_note,
                    columns.status,
                    columns.approved_at,
                    columns.facebook_url,
                    columns.instagram_url,
                    columns.youtube_url,
                    columns.social_posted_at,
                    columns.upload_error,
                ],
            )
            .map_err(|e| sqlite_error("insert submission", e))?;
            Ok(())
        })
        .await
    }

    async fn get_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, RepositoryError> {
        self.with_conn("get submission", move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM submissions s WHERE s.id = ?1", SUBMISSION_COLUMNS),
                    params![id.to_string()],
                    SubmissionRow::from_row,
                )
                .optional()
                .map_err(|e| sqlite_error("get submission", e))?;
            row.map(SubmissionRow::into_submission).transpose()
        })
        .await
    }

    async fn get_submissions(
        &self,
        ids: &[SubmissionId],
    ) -> Result<Vec<Submission>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

        self.with_conn("get submissions", move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM submissions s WHERE s.id IN ({})",
                SUBMISSION_COLUMNS, placeholders
            );
            let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
            let rows = query_submissions(conn, "get submissions", &sql, &params)?;
            Ok(decode_all(rows))
        })
        .await
    }

    async fn list_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> Result<(Vec<Submission>, usize), RepositoryError> {
        let status = query.status.map(|s| s.as_str());
        let pattern = query.needle().map(|needle| like_pattern(&needle));
        let limit = usize_to_i64(query.limit(), "list submissions")?;
        let offset = usize_to_i64(query.offset(), "list submissions")?;

        self.with_conn("list submissions", move |conn| {
            let filter = "FROM submissions s LEFT JOIN dojos d ON d.id = s.dojo_id
                 WHERE (?1 IS NULL OR s.status = ?1)
                   AND (?2 IS NULL
                        OR lower(s.email) LIKE ?2 ESCAPE '\\'
                        OR lower(s.country) LIKE ?2 ESCAPE '\\'
                        OR lower(COALESCE(s.participant_names, '')) LIKE ?2 ESCAPE '\\'
                        OR lower(COALESCE(d.name, '')) LIKE ?2 ESCAPE '\\')";

            let total: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) {}", filter),
                    params![status, pattern],
                    |row| row.get(0),
                )
                .map_err(|e| sqlite_error("count submissions", e))?;

            let sql = format!(
                "SELECT {} {} ORDER BY s.submitted_at DESC, s.id LIMIT ?3 OFFSET ?4",
                SUBMISSION_COLUMNS, filter
            );
            let rows = query_submissions(
                conn,
                "list submissions",
                &sql,
                params![status, pattern, limit, offset],
            )?;

            Ok((decode_all(rows), usize::try_from(total).unwrap_or(0)))
        })
        .await
    }

    async fn all_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        self.with_conn("all submissions", |conn| {
            let sql = format!(
                "SELECT {} FROM submissions s ORDER BY s.submitted_at DESC, s.id",
                SUBMISSION_COLUMNS
            );
            let rows = query_submissions(conn, "all submissions", &sql, &[])?;
            Ok(decode_all(rows))
        })
        .await
    }

    async fn save_moderation(
        &self,
        id: SubmissionId,
        state: &ModerationState,
    ) -> Result<usize, RepositoryError> {
        let columns = ModerationColumns::new(state);
        let id = id.to_string();

        self.with_conn("save moderation", move |conn| {
            let sql = format!(
                "UPDATE submissions SET {} WHERE id = ?8",
                ModerationColumns::SET_CLAUSE
            );
            let mut values: Vec<&dyn ToSql> = columns.values().to_vec();
            values.push(&id);
            conn.execute(&sql, values.as_slice())
                .map_err(|e| sqlite_error("save moderation", e))
        })
        .await
    }

    async fn bulk_save_moderation(
        &self,
        ids: &[SubmissionId],
        state: &ModerationState,
    ) -> Result<usize, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let columns = ModerationColumns::new(state);
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

        self.with_conn("bulk save moderation", move |conn| {
            let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 8)).collect();
            let sql = format!(
                "UPDATE submissions SET {} WHERE id IN ({})",
                ModerationColumns::SET_CLAUSE,
                placeholders.join(", ")
            );
            let mut values: Vec<&dyn ToSql> = columns.values().to_vec();
            values.extend(ids.iter().map(|id| id as &dyn ToSql));
            conn.execute(&sql, values.as_slice())
                .map_err(|e| sqlite_error("bulk save moderation", e))
        })
        .await
    }

    async fn update_note(
        &self,
        id: SubmissionId,
        note: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        let note = note.map(str::to_string);
        self.with_conn("update note", move |conn| {
            conn.execute(
                "UPDATE submissions SET admin_note = ?1 WHERE id = ?2",
                params![note, id.to_string()],
            )
            .map_err(|e| sqlite_error("update note", e))
        })
        .await
    }

    async fn delete_submission(&self, id: SubmissionId) -> Result<usize, RepositoryError> {
        self.with_conn("delete submission", move |conn| {
            conn.execute(
                "DELETE FROM submissions WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| sqlite_error("delete submission", e))
        })
        .await
    }

    async fn count_approved_for_dojo(&self, id: DojoId) -> Result<u64, RepositoryError> {
        self.with_conn("count approved", move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM submissions
                     WHERE dojo_id = ?1 AND status = 'approved' AND approved_at IS NOT NULL",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| sqlite_error("count approved", e))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn log_event(
        &self,
        submission_id: SubmissionId,
        event: &ModerationEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.log_event_impl(submission_id, event, recorded_at).await
    }

    async fn get_events(
        &self,
        submission_id: SubmissionId,
        limit: usize,
    ) -> Result<Vec<SubmissionEvent>, RepositoryError> {
        self.get_events_impl(submission_id, limit).await
    }

    async fn list_curated(&self, kind: CuratedKind) -> Result<Vec<CuratedRow>, RepositoryError> {
        self.list_curated_impl(kind).await
    }

    async fn get_curated(
        &self,
        kind: CuratedKind,
        id: Uuid,
    ) -> Result<Option<CuratedRow>, RepositoryError> {
        self.get_curated_impl(kind, id).await
    }

    async fn put_curated(&self, row: &CuratedRow) -> Result<(), RepositoryError> {
        self.put_curated_impl(row).await
    }

    async fn delete_curated(&self, kind: CuratedKind, id: Uuid) -> Result<usize, RepositoryError> {
        self.delete_curated_impl(kind, id).await
    }

    async fn set_curated_order(
        &self,
        kind: CuratedKind,
        ids: &[Uuid],
    ) -> Result<usize, RepositoryError> {
        self.set_curated_order_impl(kind, ids).await
    }
}

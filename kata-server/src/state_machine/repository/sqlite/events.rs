//! Moderation history for the SQLite repository.
//!
//! Events are stored in the `submission_events` table with JSON-encoded
//! event data. The variant name gets its own column for querying.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::warn;

use super::super::RepositoryError;
use super::{parse_uuid, sqlite_error, usize_to_i64, SqliteRepository};
use crate::audit::{ModerationEventType, SubmissionEvent};
use crate::model::SubmissionId;

impl SqliteRepository {
    pub(super) async fn log_event_impl(
        &self,
        submission_id: SubmissionId,
        event: &ModerationEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let event_json = serde_json::to_string(event)
            .map_err(|e| RepositoryError::storage("log_event serialize", e.to_string()))?;
        let event_type_name = event.variant_name();

        self.with_conn("log_event", move |conn| {
            conn.execute(
                "INSERT INTO submission_events (submission_id, event_type, event_data, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    submission_id.to_string(),
                    event_type_name,
                    event_json,
                    recorded_at
                ],
            )
            .map_err(|e| sqlite_error("log_event", e))?;
            Ok(())
        })
        .await
    }

    pub(super) async fn get_events_impl(
        &self,
        submission_id: SubmissionId,
        limit: usize,
    ) -> Result<Vec<SubmissionEvent>, RepositoryError> {
        let limit = usize_to_i64(limit, "get_events")?;

        self.with_conn("get_events", move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, submission_id, event_data, recorded_at
                     FROM submission_events
                     WHERE submission_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2",
                )
                .map_err(|e| sqlite_error("get_events", e))?;

            let rows = stmt
                .query_map(params![submission_id.to_string(), limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                    ))
                })
                .map_err(|e| sqlite_error("get_events", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("get_events", e))?;

            let mut events = Vec::with_capacity(rows.len());
            for (id, raw_submission_id, event_json, recorded_at) in rows {
                let event_type = match serde_json::from_str(&event_json) {
                    Ok(event_type) => event_type,
                    Err(e) => {
                        // Written by a newer version, or hand-edited
                        warn!("Skipping unreadable event {}: {}", id, e);
                        continue;
                    }
                };
                events.push(SubmissionEvent {
                    id,
                    submission_id: SubmissionId(parse_uuid(&raw_submission_id, "submission")?),
                    event_type,
                    recorded_at,
                });
            }
            Ok(events)
        })
        .await
    }
}

//! Curated content storage for the SQLite repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;
use uuid::Uuid;

use super::super::{CuratedRow, RepositoryError};
use super::{parse_uuid, sqlite_error, usize_to_i64, SqliteRepository};
use crate::curated::CuratedKind;

type RawCuratedRow = (String, i64, bool, DateTime<Utc>, String);

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawCuratedRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode(kind: CuratedKind, raw: RawCuratedRow) -> Result<CuratedRow, RepositoryError> {
    let (id, order_index, published, created_at, payload) = raw;
    let id = parse_uuid(&id, kind.as_str())?;
    let payload = serde_json::from_str(&payload).map_err(|e| {
        RepositoryError::corruption(format!("{} record {}: {}", kind, id, e))
    })?;
    Ok(CuratedRow {
        kind,
        id,
        order_index,
        published,
        created_at,
        payload,
    })
}

impl SqliteRepository {
    pub(super) async fn list_curated_impl(
        &self,
        kind: CuratedKind,
    ) -> Result<Vec<CuratedRow>, RepositoryError> {
        self.with_conn("list curated", move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, order_index, published, created_at, payload
                     FROM curated_items
                     WHERE kind = ?1
                     ORDER BY order_index, created_at, id",
                )
                .map_err(|e| sqlite_error("list curated", e))?;
            let raw = stmt
                .query_map(params![kind.as_str()], raw_from_row)
                .map_err(|e| sqlite_error("list curated", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| sqlite_error("list curated", e))?;
            Ok(raw
                .into_iter()
                .filter_map(|r| match decode(kind, r) {
                    Ok(row) => Some(row),
                    Err(e) => {
                        warn!("Skipping unreadable curated row: {}", e);
                        None
                    }
                })
                .collect())
        })
        .await
    }

    pub(super) async fn get_curated_impl(
        &self,
        kind: CuratedKind,
        id: Uuid,
    ) -> Result<Option<CuratedRow>, RepositoryError> {
        self.with_conn("get curated", move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, order_index, published, created_at, payload
                     FROM curated_items WHERE kind = ?1 AND id = ?2",
                    params![kind.as_str(), id.to_string()],
                    raw_from_row,
                )
                .optional()
                .map_err(|e| sqlite_error("get curated", e))?;
            raw.map(|r| decode(kind, r)).transpose()
        })
        .await
    }

    pub(super) async fn put_curated_impl(&self, row: &CuratedRow) -> Result<(), RepositoryError> {
        let row = row.clone();
        let payload = serde_json::to_string(&row.payload)
            .map_err(|e| RepositoryError::storage("put curated serialize", e.to_string()))?;

        self.with_conn("put curated", move |conn| {
            conn.execute(
                "INSERT INTO curated_items (kind, id, order_index, published, created_at, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(kind, id) DO UPDATE SET
                     order_index = excluded.order_index,
                     published = excluded.published,
                     payload = excluded.payload",
                params![
                    row.kind.as_str(),
                    row.id.to_string(),
                    row.order_index,
                    row.published,
                    row.created_at,
                    payload
                ],
            )
            .map_err(|e| sqlite_error("put curated", e))?;
            Ok(())
        })
        .await
    }

    pub(super) async fn delete_curated_impl(
        &self,
        kind: CuratedKind,
        id: Uuid,
    ) -> Result<usize, RepositoryError> {
        self.with_conn("delete curated", move |conn| {
            conn.execute(
                "DELETE FROM curated_items WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id.to_string()],
            )
            .map_err(|e| sqlite_error("delete curated", e))
        })
        .await
    }

    /// All positions are written in one transaction.
    pub(super) async fn set_curated_order_impl(
        &self,
        kind: CuratedKind,
        ids: &[Uuid],
    ) -> Result<usize, RepositoryError> {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Ok((usize_to_i64(i, "set curated order")?, id.to_string())))
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        self.with_conn("set curated order", move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| sqlite_error("set curated order", e))?;
            let mut affected = 0;
            {
                let mut stmt = tx
                    .prepare(
                        "UPDATE curated_items SET order_index = ?1 WHERE kind = ?2 AND id = ?3",
                    )
                    .map_err(|e| sqlite_error("set curated order", e))?;
                for (position, id) in &positions {
                    affected += stmt
                        .execute(params![position, kind.as_str(), id])
                        .map_err(|e| sqlite_error("set curated order", e))?;
                }
            }
            tx.commit()
                .map_err(|e| sqlite_error("set curated order", e))?;
            Ok(affected)
        })
        .await
    }
}

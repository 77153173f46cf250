//! `thumb_status` table: per-file thumbnail generation status, owned
//! exclusively by the thumbnail engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::storage::timeout::with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbState {
    Pending,
    Exists,
    Failed,
}

impl ThumbState {
    pub fn as_str(self) -> &'static str {
        match self {
            ThumbState::Pending => "pending",
            ThumbState::Exists => "exists",
            ThumbState::Failed => "failed",
        }
    }
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ThumbState::Pending),
            "exists" => Some(ThumbState::Exists),
            "failed" => Some(ThumbState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbStatusRow {
    pub path: String,
    pub mtime: i64,
    pub status: ThumbState,
    pub last_checked: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct Raw {
    path: String,
    mtime: i64,
    status: String,
    last_checked: Option<i64>,
}

impl From<Raw> for ThumbStatusRow {
    fn from(r: Raw) -> Self {
        Self {
            path: r.path,
            mtime: r.mtime,
            status: ThumbState::from_str(&r.status).unwrap_or(ThumbState::Pending),
            last_checked: r.last_checked,
        }
    }
}

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS thumb_status (
            path TEXT PRIMARY KEY,
            mtime INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending','exists','failed')),
            last_checked INTEGER
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_thumb_status_status ON thumb_status(status, last_checked)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn upsert_pending(pool: &SqlitePool, path: &str, mtime: i64, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query(
            "INSERT INTO thumb_status (path, mtime, status, last_checked)
             VALUES (?, ?, 'pending', NULL)
             ON CONFLICT(path) DO UPDATE SET mtime = excluded.mtime, status = 'pending'",
        )
        .bind(path)
        .bind(mtime)
        .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn mark_exists(pool: &SqlitePool, path: &str, mtime: i64, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query(
            "INSERT INTO thumb_status (path, mtime, status, last_checked)
             VALUES (?, ?, 'exists', strftime('%s','now'))
             ON CONFLICT(path) DO UPDATE SET mtime = excluded.mtime, status = 'exists', last_checked = excluded.last_checked",
        )
        .bind(path)
        .bind(mtime)
        .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, path: &str, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query("UPDATE thumb_status SET status = 'failed', last_checked = strftime('%s','now') WHERE path = ?")
            .bind(path)
            .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn reset_to_pending(pool: &SqlitePool, path: &str, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("UPDATE thumb_status SET status = 'pending' WHERE path = ?").bind(path).execute(pool)).await?;
    Ok(())
}

pub async fn reset_all_exists_to_pending(pool: &SqlitePool, timeout: Duration) -> Result<u64> {
    let r = with_timeout(timeout, sqlx::query("UPDATE thumb_status SET status = 'pending' WHERE status = 'exists'").execute(pool))
        .await?;
    Ok(r.rows_affected())
}

pub async fn delete_by_paths(pool: &SqlitePool, paths: &[String], timeout: Duration) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for p in paths {
        with_timeout(timeout, sqlx::query("DELETE FROM thumb_status WHERE path = ?").bind(p).execute(&mut *tx)).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, path: &str, timeout: Duration) -> Result<Option<ThumbStatusRow>> {
    let row: Option<Raw> =
        with_timeout(timeout, sqlx::query_as("SELECT * FROM thumb_status WHERE path = ?").bind(path).fetch_optional(pool)).await?;
    Ok(row.map(ThumbStatusRow::from))
}

/// Sample of `status='exists'` rows for the startup self-heal check.
pub async fn sample_exists(pool: &SqlitePool, limit: i64, timeout: Duration) -> Result<Vec<ThumbStatusRow>> {
    let rows: Vec<Raw> = with_timeout(
        timeout,
        sqlx::query_as("SELECT * FROM thumb_status WHERE status = 'exists' LIMIT ?").bind(limit).fetch_all(pool),
    )
    .await?;
    Ok(rows.into_iter().map(ThumbStatusRow::from).collect())
}

/// A batch of `exists` rows for the reconciler to verify, ordered by
/// `last_checked` ascending (nulls first) so every row rotates through
/// fairly rather than a hot subset being repeatedly re-checked.
pub async fn reconciler_batch(pool: &SqlitePool, limit: i64, timeout: Duration) -> Result<Vec<ThumbStatusRow>> {
    let rows: Vec<Raw> = with_timeout(
        timeout,
        sqlx::query_as(
            "SELECT * FROM thumb_status WHERE status = 'exists'
             ORDER BY last_checked IS NOT NULL, last_checked ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool),
    )
    .await?;
    Ok(rows.into_iter().map(ThumbStatusRow::from).collect())
}

pub async fn touch_last_checked(pool: &SqlitePool, path: &str, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query("UPDATE thumb_status SET last_checked = strftime('%s','now') WHERE path = ?").bind(path).execute(pool),
    )
    .await?;
    Ok(())
}

/// Row counts per status, for the queue-depth metrics endpoint.
pub async fn count_by_status(pool: &SqlitePool, timeout: Duration) -> Result<(i64, i64, i64)> {
    let (pending,): (i64,) = with_timeout(
        timeout,
        sqlx::query_as("SELECT COUNT(*) FROM thumb_status WHERE status = 'pending'").fetch_one(pool),
    )
    .await?;
    let (exists,): (i64,) = with_timeout(
        timeout,
        sqlx::query_as("SELECT COUNT(*) FROM thumb_status WHERE status = 'exists'").fetch_one(pool),
    )
    .await?;
    let (failed,): (i64,) = with_timeout(
        timeout,
        sqlx::query_as("SELECT COUNT(*) FROM thumb_status WHERE status = 'failed'").fetch_one(pool),
    )
    .await?;
    Ok((pending, exists, failed))
}

/// Items missing a fresh thumbnail: no status row, a stale `mtime`, or a
/// `pending`/`failed` status, paged for the idle background generator.
pub async fn needs_generation(pool: &SqlitePool, after_id: i64, limit: i64, timeout: Duration) -> Result<Vec<(i64, String, i64)>> {
    let rows: Vec<(i64, String, i64)> = with_timeout(
        timeout,
        sqlx::query_as(
            "SELECT items.id, items.path, items.mtime FROM items
             LEFT JOIN thumb_status ON thumb_status.path = items.path
             WHERE items.type IN ('photo','video') AND items.id > ?
               AND (thumb_status.path IS NULL
                    OR thumb_status.mtime < items.mtime
                    OR thumb_status.status IN ('pending','failed'))
             ORDER BY items.id ASC
             LIMIT ?",
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(pool),
    )
    .await?;
    Ok(rows)
}

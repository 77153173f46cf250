//! `index_status` / `index_progress`: resumable full-rebuild bookkeeping.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::storage::timeout::with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPhase {
    Building,
    Complete,
}

impl IndexPhase {
    fn as_str(self) -> &'static str {
        match self {
            IndexPhase::Building => "building",
            IndexPhase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub status: IndexPhase,
    pub processed_files: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS index_status (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL CHECK (status IN ('building','complete')),
            processed_files INTEGER NOT NULL DEFAULT 0,
            started_at INTEGER,
            finished_at INTEGER
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE TABLE IF NOT EXISTS index_progress (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, timeout: Duration) -> Result<Option<IndexStatus>> {
    let row: Option<(String, i64, Option<i64>, Option<i64>)> = with_timeout(
        timeout,
        sqlx::query_as("SELECT status, processed_files, started_at, finished_at FROM index_status WHERE id = 1")
            .fetch_optional(pool),
    )
    .await?;
    Ok(row.map(|(status, processed_files, started_at, finished_at)| IndexStatus {
        status: if status == "complete" { IndexPhase::Complete } else { IndexPhase::Building },
        processed_files,
        started_at,
        finished_at,
    }))
}

pub async fn start_building(pool: &SqlitePool, now: i64, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query(
            "INSERT INTO index_status (id, status, processed_files, started_at, finished_at)
             VALUES (1, 'building', 0, ?, NULL)
             ON CONFLICT(id) DO UPDATE SET status = 'building', processed_files = 0, started_at = excluded.started_at, finished_at = NULL",
        )
        .bind(now)
        .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn set_processed_files(pool: &SqlitePool, count: i64, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("UPDATE index_status SET processed_files = ? WHERE id = 1").bind(count).execute(pool)).await?;
    Ok(())
}

pub async fn mark_complete(pool: &SqlitePool, now: i64, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query("UPDATE index_status SET status = 'complete', finished_at = ? WHERE id = 1").bind(now).execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn last_processed_path(pool: &SqlitePool, timeout: Duration) -> Result<Option<String>> {
    let row: Option<(String,)> = with_timeout(
        timeout,
        sqlx::query_as("SELECT value FROM index_progress WHERE key = 'last_processed_path'").fetch_optional(pool),
    )
    .await?;
    Ok(row.map(|(v,)| v))
}

pub async fn set_last_processed_path(pool: &SqlitePool, path: &str, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query(
            "INSERT INTO index_progress (key, value) VALUES ('last_processed_path', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(path)
        .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn clear_progress(pool: &SqlitePool, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("DELETE FROM index_progress WHERE key = 'last_processed_path'").execute(pool)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_for_the_wire() {
        let status = IndexStatus { status: IndexPhase::Building, processed_files: 42, started_at: Some(100), finished_at: None };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["processedFiles"], 42);
        assert_eq!(json["startedAt"], 100);
        assert_eq!(json["status"], "building");
    }
}

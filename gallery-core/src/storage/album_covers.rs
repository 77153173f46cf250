//! `album_covers` table: one row per non-empty album, precomputed so browse
//! and search never have to scan descendants on the request path.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::storage::timeout::with_timeout;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlbumCover {
    pub album_path: String,
    pub cover_path: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub mtime: i64,
}

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS album_covers (
            album_path TEXT PRIMARY KEY,
            cover_path TEXT NOT NULL,
            width INTEGER,
            height INTEGER,
            mtime INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, album_path: &str, timeout: Duration) -> Result<Option<AlbumCover>> {
    let row = with_timeout(
        timeout,
        sqlx::query_as("SELECT * FROM album_covers WHERE album_path = ?").bind(album_path).fetch_optional(pool),
    )
    .await?;
    Ok(row)
}

pub async fn get_many(pool: &SqlitePool, album_paths: &[String], timeout: Duration) -> Result<Vec<AlbumCover>> {
    if album_paths.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?").take(album_paths.len()).collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM album_covers WHERE album_path IN ({placeholders})");
    let mut q = sqlx::query_as(&sql);
    for p in album_paths {
        q = q.bind(p);
    }
    Ok(with_timeout(timeout, q.fetch_all(pool)).await?)
}

pub async fn upsert(pool: &SqlitePool, cover: &AlbumCover, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query(
            "INSERT INTO album_covers (album_path, cover_path, width, height, mtime)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(album_path) DO UPDATE SET
                cover_path = excluded.cover_path,
                width = excluded.width,
                height = excluded.height,
                mtime = excluded.mtime",
        )
        .bind(&cover.album_path)
        .bind(&cover.cover_path)
        .bind(cover.width)
        .bind(cover.height)
        .bind(cover.mtime)
        .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, album_path: &str, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("DELETE FROM album_covers WHERE album_path = ?").bind(album_path).execute(pool)).await?;
    Ok(())
}

pub async fn delete_all(pool: &SqlitePool, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("DELETE FROM album_covers").execute(pool)).await?;
    Ok(())
}

pub async fn list_cursor(pool: &SqlitePool, cursor: i64, limit: i64, timeout: Duration) -> Result<Vec<AlbumCover>> {
    Ok(with_timeout(
        timeout,
        sqlx::query_as("SELECT * FROM album_covers WHERE rowid > ? ORDER BY rowid ASC LIMIT ?").bind(cursor).bind(limit).fetch_all(pool),
    )
    .await?)
}

/// Same page as [`list_cursor`], but with each row's `rowid` alongside it so
/// the caller (the paginated HTTP endpoint) can hand back the last row's
/// `rowid` as the next cursor without a second query.
pub async fn list_cursor_with_rowid(
    pool: &SqlitePool,
    cursor: i64,
    limit: i64,
    timeout: Duration,
) -> Result<Vec<(i64, AlbumCover)>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        rowid: i64,
        album_path: String,
        cover_path: String,
        width: Option<i64>,
        height: Option<i64>,
        mtime: i64,
    }
    let rows: Vec<Row> = with_timeout(
        timeout,
        sqlx::query_as(
            "SELECT rowid, album_path, cover_path, width, height, mtime FROM album_covers
             WHERE rowid > ? ORDER BY rowid ASC LIMIT ?",
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(pool),
    )
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| {
            (
                r.rowid,
                AlbumCover { album_path: r.album_path, cover_path: r.cover_path, width: r.width, height: r.height, mtime: r.mtime },
            )
        })
        .collect())
}

pub async fn list_all(pool: &SqlitePool, timeout: Duration) -> Result<Vec<AlbumCover>> {
    Ok(with_timeout(timeout, sqlx::query_as("SELECT * FROM album_covers").fetch_all(pool)).await?)
}

//! Application-maintained FTS5 index. `items_fts` carries no triggers —
//! every insert, update and delete against `items` is mirrored here
//! explicitly by the indexer, keyed by `items.id` as the FTS `rowid` so the
//! two tables never need a join table between them.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::error::Result;
use crate::storage::timeout::with_timeout;

pub async fn clear_all(pool: &SqlitePool, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("DELETE FROM items_fts").execute(pool)).await?;
    Ok(())
}

pub async fn replace_row(pool: &SqlitePool, id: i64, tokens: &str, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("DELETE FROM items_fts WHERE rowid = ?").bind(id).execute(pool)).await?;
    with_timeout(
        timeout,
        sqlx::query("INSERT INTO items_fts (rowid, name) VALUES (?, ?)").bind(id).bind(tokens).execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn delete_rows(pool: &SqlitePool, ids: &[i64], timeout: Duration) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for id in ids {
        with_timeout(timeout, sqlx::query("DELETE FROM items_fts WHERE rowid = ?").bind(id).execute(&mut *tx)).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// `true` once at least one row has ever been indexed; used to distinguish
/// "index is still building" from "no results".
pub async fn has_any_rows(pool: &SqlitePool, timeout: Duration) -> Result<bool> {
    let row: Option<(i64,)> =
        with_timeout(timeout, sqlx::query_as("SELECT rowid FROM items_fts LIMIT 1").fetch_optional(pool)).await?;
    Ok(row.is_some())
}

/// Matches `items_fts` against an already-tokenized query, returning
/// `(item id, rank)` pairs ordered by FTS5's BM25-derived rank (ascending —
/// lower is a better match).
pub async fn search_ranked(pool: &SqlitePool, fts_query: &str, limit: i64, offset: i64, timeout: Duration) -> Result<Vec<(i64, f64)>> {
    let rows: Vec<(i64, f64)> = with_timeout(
        timeout,
        sqlx::query_as("SELECT rowid, rank FROM items_fts WHERE items_fts MATCH ? ORDER BY rank LIMIT ? OFFSET ?")
            .bind(fts_query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool),
    )
    .await?;
    Ok(rows)
}

pub async fn count_matches(pool: &SqlitePool, fts_query: &str, timeout: Duration) -> Result<i64> {
    let row: (i64,) = with_timeout(
        timeout,
        sqlx::query_as("SELECT COUNT(*) FROM items_fts WHERE items_fts MATCH ?").bind(fts_query).fetch_one(pool),
    )
    .await?;
    Ok(row.0)
}

/// Total indexed row count, for `/health`'s `database.fts` field.
pub async fn count_all(pool: &SqlitePool, timeout: Duration) -> Result<i64> {
    let row: (i64,) = with_timeout(timeout, sqlx::query_as("SELECT COUNT(*) FROM items_fts").fetch_one(pool)).await?;
    Ok(row.0)
}

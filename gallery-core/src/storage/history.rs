//! `view_history` table: per-user "last viewed" timestamps, propagated up
//! the full ancestor chain so parent albums surface recently-viewed media.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::error::Result;
use crate::path::RelPath;
use crate::storage::timeout::with_timeout;

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS view_history (
            user_id TEXT NOT NULL,
            item_path TEXT NOT NULL,
            viewed_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, item_path)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_view_history_path ON view_history(item_path)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Touches every ancestor path (the item itself plus every containing
/// album up to root) in one transaction, so "last viewed" propagates to
/// parent albums atomically.
pub async fn touch_ancestor_chain(pool: &SqlitePool, user_id: &str, path: &RelPath, now: i64, timeout: Duration) -> Result<()> {
    let mut tx = pool.begin().await?;
    let mut chain = vec![path.as_str().to_string()];
    chain.extend(path.ancestor_chain());
    for p in chain {
        with_timeout(
            timeout,
            sqlx::query(
                "INSERT INTO view_history (user_id, item_path, viewed_at) VALUES (?, ?, ?)
                 ON CONFLICT(user_id, item_path) DO UPDATE SET viewed_at = excluded.viewed_at",
            )
            .bind(user_id)
            .bind(&p)
            .bind(now)
            .execute(&mut *tx),
        )
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// `MAX(viewed_at)` per path, for the page of album paths being rendered
/// under `sort=viewed_desc`/`smart`. Kept as a second query against this
/// database rather than a cross-database join.
pub async fn max_viewed_for_paths(
    pool: &SqlitePool,
    user_id: &str,
    paths: &[String],
    timeout: Duration,
) -> Result<Vec<(String, i64)>> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?").take(paths.len()).collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT item_path, MAX(viewed_at) FROM view_history
         WHERE user_id = ? AND item_path IN ({placeholders})
         GROUP BY item_path"
    );
    let mut q = sqlx::query_as(&sql).bind(user_id);
    for p in paths {
        q = q.bind(p);
    }
    Ok(with_timeout(timeout, q.fetch_all(pool)).await?)
}

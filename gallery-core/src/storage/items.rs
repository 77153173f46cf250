//! `items` table: the authoritative record of every album, photo and video
//! under the media root. Owned exclusively by the indexer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::storage::timeout::with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Album,
    Photo,
    Video,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Album => "album",
            ItemType::Photo => "photo",
            ItemType::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "album" => Some(ItemType::Album),
            "photo" => Some(ItemType::Photo),
            "video" => Some(ItemType::Video),
            _ => None,
        }
    }

    pub fn is_media(self) -> bool {
        matches!(self, ItemType::Photo | ItemType::Video)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub mtime: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub cover_path: Option<String>,
    pub last_viewed_at: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    name: String,
    path: String,
    #[sqlx(rename = "type")]
    item_type: String,
    mtime: i64,
    width: Option<i64>,
    height: Option<i64>,
    cover_path: Option<String>,
    last_viewed_at: Option<i64>,
}

impl From<ItemRow> for Item {
    fn from(r: ItemRow) -> Self {
        Item {
            id: r.id,
            name: r.name,
            path: r.path,
            item_type: ItemType::from_str(&r.item_type).unwrap_or(ItemType::Photo),
            mtime: r.mtime,
            width: r.width,
            height: r.height,
            cover_path: r.cover_path,
            last_viewed_at: r.last_viewed_at,
        }
    }
}

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            path TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL CHECK (type IN ('album','photo','video')),
            mtime INTEGER NOT NULL,
            width INTEGER,
            height INTEGER,
            cover_path TEXT,
            last_viewed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_items_path ON items(path);
        CREATE INDEX IF NOT EXISTS idx_items_type_path ON items(type, path);",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_all(pool: &SqlitePool, timeout: Duration) -> Result<()> {
    with_timeout(timeout, sqlx::query("DELETE FROM items").execute(pool)).await?;
    Ok(())
}

pub async fn count(pool: &SqlitePool, timeout: Duration) -> Result<i64> {
    let row: (i64,) = with_timeout(timeout, sqlx::query_as("SELECT COUNT(*) FROM items").fetch_one(pool)).await?;
    Ok(row.0)
}

pub async fn by_path(pool: &SqlitePool, path: &str, timeout: Duration) -> Result<Option<Item>> {
    let row: Option<ItemRow> = with_timeout(
        timeout,
        sqlx::query_as("SELECT * FROM items WHERE path = ?").bind(path).fetch_optional(pool),
    )
    .await?;
    Ok(row.map(Item::from))
}

/// Direct children of `parent` — no deeper separators in the path suffix —
/// used by the browse service's single-pass listing query.
pub async fn direct_children(pool: &SqlitePool, parent: &str, timeout: Duration) -> Result<Vec<Item>> {
    let prefix = if parent.is_empty() { String::new() } else { format!("{parent}/") };
    let like_pattern = format!("{prefix}%");
    let rows: Vec<ItemRow> = with_timeout(
        timeout,
        sqlx::query_as(
            "SELECT * FROM items
             WHERE path LIKE ? ESCAPE '\\'
               AND path NOT LIKE ? ESCAPE '\\'
               AND path != ?",
        )
        .bind(&like_pattern)
        .bind(format!("{prefix}%/%"))
        .bind(parent)
        .fetch_all(pool),
    )
    .await?;
    Ok(rows.into_iter().map(Item::from).collect())
}

/// All media items ordered by `id`, for the thumbnail engine's background
/// fill-in to page through.
pub async fn all_media_paged(pool: &SqlitePool, after_id: i64, limit: i64, timeout: Duration) -> Result<Vec<Item>> {
    let rows: Vec<ItemRow> = with_timeout(
        timeout,
        sqlx::query_as("SELECT * FROM items WHERE type IN ('photo','video') AND id > ? ORDER BY id ASC LIMIT ?")
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool),
    )
    .await?;
    Ok(rows.into_iter().map(Item::from).collect())
}

/// Items whose `id` is in `ids`, in no particular order — the search
/// service's hydration step for a page of FTS hits.
pub async fn by_ids(pool: &SqlitePool, ids: &[i64], timeout: Duration) -> Result<Vec<Item>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM items WHERE id IN ({placeholders})");
    let mut q = sqlx::query_as::<_, ItemRow>(&sql);
    for id in ids {
        q = q.bind(id);
    }
    let rows: Vec<ItemRow> = with_timeout(timeout, q.fetch_all(pool)).await?;
    Ok(rows.into_iter().map(Item::from).collect())
}

/// Back-fills dimensions discovered by a lazy probe, called from the browse
/// service's cache-aside dimension lookup.
pub async fn set_dimensions(pool: &SqlitePool, id: i64, width: i64, height: i64, timeout: Duration) -> Result<()> {
    with_timeout(
        timeout,
        sqlx::query("UPDATE items SET width = ?, height = ? WHERE id = ?").bind(width).bind(height).bind(id).execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn delete_by_paths_and_prefixes(pool: &SqlitePool, paths: &[String], timeout: Duration) -> Result<u64> {
    if paths.is_empty() {
        return Ok(0);
    }
    let mut total = 0u64;
    let mut tx = pool.begin().await?;
    for path in paths {
        let r = with_timeout(
            timeout,
            sqlx::query("DELETE FROM items WHERE path = ? OR path LIKE ? ESCAPE '\\'")
                .bind(path)
                .bind(format!("{path}/%"))
                .execute(&mut *tx),
        )
        .await?;
        total += r.rows_affected();
    }
    tx.commit().await?;
    Ok(total)
}

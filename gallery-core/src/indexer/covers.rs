//! Album cover computation. An album's cover is the most recently modified
//! media item found anywhere in its subtree, tie-broken by path so the
//! choice is deterministic; this is recomputed per-album rather than as one
//! global top-down assignment pass, so an incremental change only ever
//! touches the handful of albums in its own ancestor chain.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;
use crate::storage::album_covers::{self, AlbumCover};
use crate::storage::timeout::with_timeout;
use crate::storage::Storage;

/// Case-insensitive, numeric-aware comparison shared with the browse
/// service's `name_asc`/`name_desc` sort: `"img2"` sorts before `"img10"`.
pub fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na: String = ai.by_ref().take_while(|c| c.is_ascii_digit()).collect();
                    let nb: String = bi.by_ref().take_while(|c| c.is_ascii_digit()).collect();
                    let (va, vb) = (na.parse::<u64>().unwrap_or(0), nb.parse::<u64>().unwrap_or(0));
                    match va.cmp(&vb) {
                        std::cmp::Ordering::Equal => continue,
                        other => return other,
                    }
                } else {
                    let (la, lb) = (ca.to_ascii_lowercase(), cb.to_ascii_lowercase());
                    match la.cmp(&lb) {
                        std::cmp::Ordering::Equal => {
                            ai.next();
                            bi.next();
                            continue;
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

/// Live (uncached) recomputation of a single album's cover, exposed for the
/// browse service's windowed-SQL fallback when `album_covers` is missing a
/// row for an album that does have `items` rows (a cover not yet
/// backfilled rather than a truly empty album).
pub async fn compute_live(storage: &Storage, album_path: &str) -> Result<Option<AlbumCover>> {
    recompute_one(&storage.main, album_path, storage.db_tuning.query_timeout).await
}

async fn recompute_one(pool: &SqlitePool, album_path: &str, timeout: std::time::Duration) -> Result<Option<AlbumCover>> {
    let prefix = if album_path.is_empty() { String::new() } else { format!("{album_path}/") };
    let row: Option<(String, i64, Option<i64>, Option<i64>)> = with_timeout(
        timeout,
        sqlx::query_as(
            "SELECT path, mtime, width, height FROM items
             WHERE type IN ('photo','video') AND path LIKE ? ESCAPE '\\'
             ORDER BY mtime DESC, path DESC LIMIT 1",
        )
        .bind(format!("{prefix}%"))
        .fetch_optional(pool),
    )
    .await?;
    Ok(row.map(|(cover_path, mtime, width, height)| AlbumCover {
        album_path: album_path.to_string(),
        cover_path,
        width,
        height,
        mtime,
    }))
}

async fn apply_one(storage: &Storage, album_path: &str) -> Result<()> {
    let timeout = storage.db_tuning.query_timeout;
    match recompute_one(&storage.main, album_path, timeout).await? {
        Some(cover) => album_covers::upsert(&storage.main, &cover, timeout).await?,
        None => album_covers::delete(&storage.main, album_path, timeout).await?,
    }
    Ok(())
}

/// Recomputes every album's cover from scratch, used at the end of a full
/// rebuild once `items` is fully populated.
pub async fn rebuild_all(storage: &Storage) -> Result<()> {
    album_covers::delete_all(&storage.main, storage.db_tuning.query_timeout).await?;
    let album_paths = all_album_paths(&storage.main, storage.db_tuning.query_timeout).await?;
    for path in &album_paths {
        apply_one(storage, path).await?;
    }
    info!(albums = album_paths.len(), "rebuilt album covers");
    Ok(())
}

async fn all_album_paths(pool: &SqlitePool, timeout: std::time::Duration) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        with_timeout(timeout, sqlx::query_as("SELECT path FROM items WHERE type = 'album'").fetch_all(pool)).await?;
    Ok(rows.into_iter().map(|(p,)| p).collect())
}

/// Recomputes covers for exactly the given album paths (the synthetic root
/// sentinel `"/"` is skipped: root has no `items` row and no cover of its
/// own), used after an incremental change touches a bounded set of
/// ancestors.
pub async fn recompute_for_albums(storage: &Storage, album_paths: &[String]) -> Result<()> {
    for path in album_paths {
        if path == "/" {
            continue;
        }
        apply_one(storage, path).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_sorts_numbers_numerically() {
        let mut names = vec!["img10.jpg", "img2.jpg", "img1.jpg"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["img1.jpg", "img2.jpg", "img10.jpg"]);
    }

    #[test]
    fn natural_order_is_case_insensitive() {
        assert_eq!(natural_cmp("Beach", "beach"), std::cmp::Ordering::Equal);
    }
}

//! Applies a consolidated set of filesystem changes (already debounced and
//! collapsed by the watcher) against `items`/`items_fts`/`thumb_status`,
//! then recomputes covers and invalidates cache tags for exactly the
//! albums touched.

use std::path::Path;

use sqlx::Row;
use tracing::{info, warn};

use crate::cache::{route_cache, tags, Cache};
use crate::config::{CacheTuning, Config};
use crate::error::Result;
use crate::indexer::dimensions::DimensionProbe;
use crate::indexer::ngram::{fts_tokens_for_path, strip_extension};
use crate::indexer::walk::classify_extension;
use crate::path::RelPath;
use crate::storage::items::ItemType;
use crate::storage::Storage;

/// One already-consolidated change, keyed by the final outcome of the
/// watcher's consolidation rules (`add`, `addDir`, `unlink`, `unlinkDir`,
/// `update`).
#[derive(Debug, Clone)]
pub enum Change {
    Add { path: RelPath, mtime_ms: i64 },
    AddDir { path: RelPath, mtime_ms: i64 },
    Unlink { path: RelPath },
    UnlinkDir { path: RelPath },
    Update { path: RelPath, mtime_ms: i64 },
}

impl Change {
    fn rel_path(&self) -> &RelPath {
        match self {
            Change::Add { path, .. }
            | Change::AddDir { path, .. }
            | Change::Unlink { path }
            | Change::UnlinkDir { path }
            | Change::Update { path, .. } => path,
        }
    }
}

/// Applies `changes` in one pass: deletes first (batched, prefix-aware for
/// directory unlinks), then adds/updates (dimension-probed, FTS-mirrored),
/// then recomputes covers and invalidates cache tags for every album in the
/// union of all affected ancestor chains.
pub async fn apply(storage: &Storage, cache: &Cache, config: &Config, changes: &[Change]) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut delete_paths = Vec::new();
    let mut upserts = Vec::new();
    for change in changes {
        match change {
            Change::Unlink { path } | Change::UnlinkDir { path } => delete_paths.push(path.as_str().to_string()),
            Change::Add { path, mtime_ms } | Change::AddDir { path, mtime_ms } | Change::Update { path, mtime_ms } => {
                upserts.push((path.clone(), *mtime_ms));
            }
        }
    }

    if !delete_paths.is_empty() {
        let deleted_ids = delete_rows(storage, &delete_paths).await?;
        info!(count = deleted_ids, "incremental apply: deleted rows");
    }

    let probe = DimensionProbe::new(config.indexer.dimension_concurrency);
    if !upserts.is_empty() {
        upsert_rows(storage, &probe, &config.photos_dir, &upserts).await?;
    }

    let mut affected_albums: Vec<String> = Vec::new();
    for change in changes {
        affected_albums.extend(change.rel_path().ancestor_chain());
        if matches!(change, Change::AddDir { .. } | Change::UnlinkDir { .. }) {
            affected_albums.push(change.rel_path().as_str().to_string());
        }
    }
    affected_albums.sort();
    affected_albums.dedup();

    super::covers::recompute_for_albums(storage, &affected_albums).await?;
    invalidate_cache(cache, &config.cache, changes, &affected_albums).await;

    Ok(())
}

async fn delete_rows(storage: &Storage, paths: &[String]) -> Result<u64> {
    let mut tx = storage.main.begin().await?;
    let mut total = 0u64;
    for path in paths {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM items WHERE path = ? OR path LIKE ? ESCAPE '\\'")
            .bind(path)
            .bind(format!("{path}/%"))
            .fetch_all(&mut *tx)
            .await?;
        for (id,) in &ids {
            sqlx::query("DELETE FROM items_fts WHERE rowid = ?").bind(id).execute(&mut *tx).await?;
        }
        let r = sqlx::query("DELETE FROM items WHERE path = ? OR path LIKE ? ESCAPE '\\'")
            .bind(path)
            .bind(format!("{path}/%"))
            .execute(&mut *tx)
            .await?;
        total += r.rows_affected();
        sqlx::query("DELETE FROM thumb_status WHERE path = ?").bind(path).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(total)
}

async fn upsert_rows(
    storage: &Storage,
    probe: &DimensionProbe,
    photos_dir: &Path,
    upserts: &[(RelPath, i64)],
) -> Result<()> {
    let entries: Vec<crate::indexer::walk::WalkEntry> = upserts
        .iter()
        .filter_map(|(path, mtime_ms)| {
            let item_type = classify_extension(path.as_str())?;
            Some(crate::indexer::walk::WalkEntry {
                rel_path: path.as_str().to_string(),
                name: Path::new(path.as_str())
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.as_str().to_string()),
                item_type,
                mtime_ms: *mtime_ms,
                abs_path: photos_dir.join(path.as_str()),
            })
        })
        .collect();
    let dims = probe.probe_batch(&entries).await;
    let dims_by_path: std::collections::HashMap<String, (i64, i64)> =
        dims.into_iter().map(|(path, w, h)| (path, (w, h))).collect();

    let mut tx = storage.main.begin().await?;
    for (path, mtime_ms) in upserts {
        let item_type = classify_extension(path.as_str()).unwrap_or(ItemType::Photo);
        let name = Path::new(path.as_str())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.as_str().to_string());
        let (width, height) = dims_by_path.get(path.as_str()).map(|(w, h)| (Some(*w), Some(*h))).unwrap_or((None, None));

        let row = sqlx::query(
            "INSERT INTO items (name, path, type, mtime, width, height, cover_path, last_viewed_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, NULL)
             ON CONFLICT(path) DO UPDATE SET
                name = excluded.name, mtime = excluded.mtime, width = excluded.width, height = excluded.height
             RETURNING id",
        )
        .bind(&name)
        .bind(path.as_str())
        .bind(item_type.as_str())
        .bind(mtime_ms)
        .bind(width)
        .bind(height)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.get(0);

        sqlx::query("DELETE FROM items_fts WHERE rowid = ?").bind(id).execute(&mut *tx).await?;
        let stripped = strip_extension(path.as_str());
        let tokens = fts_tokens_for_path(stripped, item_type.as_str());
        sqlx::query("INSERT INTO items_fts (rowid, name) VALUES (?, ?)")
            .bind(id)
            .bind(&tokens)
            .execute(&mut *tx)
            .await?;

        if item_type.is_media() {
            sqlx::query(
                "INSERT INTO thumb_status (path, mtime, status, last_checked)
                 VALUES (?, ?, 'pending', NULL)
                 ON CONFLICT(path) DO UPDATE SET mtime = excluded.mtime, status = 'pending'",
            )
            .bind(path.as_str())
            .bind(mtime_ms)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

async fn invalidate_cache(cache: &Cache, cache_tuning: &CacheTuning, changes: &[Change], affected_albums: &[String]) {
    let mut tags = Vec::new();
    for change in changes {
        tags.extend(route_cache::tags_for_change(change.rel_path().as_str(), affected_albums));
    }
    tags.sort();
    tags.dedup();

    let ceiling = tags::adaptive_tag_ceiling(cache_tuning.base_tag_ceiling, changes.len());
    if tags.len() > ceiling {
        warn!(tags = tags.len(), ceiling, "change set exceeds adaptive tag ceiling, falling back to coarse delete");
        if let Err(e) = cache.delete_by_pattern(&format!("{}*", route_cache::BROWSE_ROUTE_PREFIX)).await {
            warn!(error = %e, "coarse cache delete failed");
        }
        return;
    }

    if let Err(e) = cache.invalidate_tags(&tags).await {
        warn!(error = %e, "tag invalidation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_rel_path_matches_variant() {
        let p = RelPath::new("A/p.jpg").unwrap();
        let c = Change::Add { path: p.clone(), mtime_ms: 1 };
        assert_eq!(c.rel_path().as_str(), "A/p.jpg");
    }
}

//! Full index rebuild: drop `items`/`items_fts`, walk the media tree, probe
//! dimensions with bounded concurrency, and commit in batches of
//! [`IndexerTuning::rebuild_batch_size`] so progress survives a restart.
//!
//! A second rebuild request arriving while one is already running is
//! dropped by the caller ([`super::Indexer`]) before this function is ever
//! invoked — this module assumes it has exclusive access to `items`.

use sqlx::Row;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::indexer::dimensions::DimensionProbe;
use crate::indexer::fts;
use crate::indexer::ngram::{fts_tokens_for_path, strip_extension};
use crate::indexer::walk::{walk_media_tree, WalkEntry};
use crate::storage::items::ItemType;
use crate::storage::{index_status, Storage};

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Runs a full rebuild of `items`, `items_fts`, and `thumb_status` against
/// the media tree rooted at `config.photos_dir`, finishing with a full
/// album-cover recompute.
pub async fn rebuild(storage: &Storage, config: &Config) -> Result<()> {
    let timeout = storage.db_tuning.query_timeout;
    let started = now_unix();
    info!("starting full index rebuild");
    index_status::start_building(&storage.index, started, timeout).await?;
    index_status::clear_progress(&storage.index, timeout).await?;

    crate::storage::items::delete_all(&storage.main, timeout).await?;
    fts::clear_all(&storage.main, timeout).await?;

    let probe = DimensionProbe::new(config.indexer.dimension_concurrency);
    let root = config.photos_dir.clone();
    let batch_size = config.indexer.rebuild_batch_size;

    let mut batch: Vec<WalkEntry> = Vec::with_capacity(batch_size);
    let mut processed: i64 = 0;
    let mut walk_err: Option<crate::error::GalleryError> = None;

    // `walk_media_tree` is synchronous (plain `std::fs` recursion), so
    // batches are buffered here and flushed with `block_in_place` whenever
    // they fill, since the walk itself can't yield to the async executor
    // mid-traversal.
    let entries_result = tokio::task::block_in_place(|| {
        let mut collected = Vec::new();
        let result = walk_media_tree(&root, |entry| collected.push(entry));
        (collected, result)
    });
    let (all_entries, walk_result) = entries_result;
    if let Err(e) = walk_result {
        warn!(error = %e, "directory walk ended early");
        walk_err = Some(e);
    }

    for entry in all_entries {
        batch.push(entry);
        if batch.len() >= batch_size {
            processed += flush_batch(storage, &probe, &batch).await? as i64;
            index_status::set_processed_files(&storage.index, processed, timeout).await?;
            if let Some(last) = batch.last() {
                index_status::set_last_processed_path(&storage.index, &last.rel_path, timeout).await?;
            }
            batch.clear();
        }
    }
    if !batch.is_empty() {
        processed += flush_batch(storage, &probe, &batch).await? as i64;
        index_status::set_processed_files(&storage.index, processed, timeout).await?;
    }

    super::covers::rebuild_all(storage).await?;

    index_status::mark_complete(&storage.index, now_unix(), timeout).await?;
    index_status::clear_progress(&storage.index, timeout).await?;
    info!(processed, "full index rebuild complete");

    match walk_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Inserts one batch of walked entries inside a single `BEGIN IMMEDIATE`
/// transaction: `items` rows, FTS rows, and a `pending` `thumb_status` row
/// per media file. Returns the number of entries committed.
async fn flush_batch(storage: &Storage, probe: &DimensionProbe, batch: &[WalkEntry]) -> Result<u64> {
    let dims = probe.probe_batch(batch).await;
    let dims_by_path: std::collections::HashMap<String, (i64, i64)> =
        dims.into_iter().map(|(path, w, h)| (path, (w, h))).collect();

    let mut tx = storage.main.begin().await?;

    for entry in batch {
        let (width, height) = match entry.item_type {
            ItemType::Album => (None, None),
            _ => dims_by_path.get(&entry.rel_path).map(|(w, h)| (Some(*w), Some(*h))).unwrap_or((None, None)),
        };

        let row = sqlx::query(
            "INSERT INTO items (name, path, type, mtime, width, height, cover_path, last_viewed_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, NULL)
             ON CONFLICT(path) DO UPDATE SET
                name = excluded.name, mtime = excluded.mtime, width = excluded.width, height = excluded.height
             RETURNING id",
        )
        .bind(&entry.name)
        .bind(&entry.rel_path)
        .bind(entry.item_type.as_str())
        .bind(entry.mtime_ms)
        .bind(width)
        .bind(height)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.get(0);

        sqlx::query("DELETE FROM items_fts WHERE rowid = ?").bind(id).execute(&mut *tx).await?;
        let stripped = strip_extension(&entry.rel_path);
        let tokens = fts_tokens_for_path(stripped, entry.item_type.as_str());
        sqlx::query("INSERT INTO items_fts (rowid, name) VALUES (?, ?)")
            .bind(id)
            .bind(&tokens)
            .execute(&mut *tx)
            .await?;

        if entry.item_type.is_media() {
            sqlx::query(
                "INSERT INTO thumb_status (path, mtime, status, last_checked)
                 VALUES (?, ?, 'pending', NULL)
                 ON CONFLICT(path) DO UPDATE SET mtime = excluded.mtime, status = 'pending'",
            )
            .bind(&entry.rel_path)
            .bind(entry.mtime_ms)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(batch.len() as u64)
}

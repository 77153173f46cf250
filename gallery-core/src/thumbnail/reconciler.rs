//! Continuously verifies that rows marked `exists` in `thumb_status` still
//! have a thumbnail file on disk, resetting any that don't back to
//! `pending` so the worker pool regenerates them. Runs as its own
//! background loop, independent of the on-demand and idle-fill paths.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ThumbnailTuning;
use crate::storage::{thumb_status, Storage};

pub async fn run(storage: Storage, thumbnails_dir: std::path::PathBuf, tuning: ThumbnailTuning) {
    loop {
        match reconcile_once(&storage, &thumbnails_dir, &tuning).await {
            Ok(checked) if checked > 0 => debug!(checked, "reconciler pass complete"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "reconciler pass failed"),
        }
        tokio::time::sleep(tuning.reconcile_pause).await;
    }
}

async fn reconcile_once(storage: &Storage, thumbnails_dir: &Path, tuning: &ThumbnailTuning) -> crate::error::Result<usize> {
    let timeout = storage.db_tuning.query_timeout;
    let batch = thumb_status::reconciler_batch(&storage.main, tuning.reconcile_batch_size as i64, timeout).await?;
    for row in &batch {
        let thumb_path = thumbnails_dir.join(mirrored_thumb_path(&row.path));
        if !thumb_path.exists() {
            thumb_status::reset_to_pending(&storage.main, &row.path, timeout).await?;
        } else {
            thumb_status::touch_last_checked(&storage.main, &row.path, timeout).await?;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    Ok(batch.len())
}

/// Thumbnails mirror the source tree's relative path with a fixed
/// extension, so `A/B/clip.mp4` becomes `A/B/clip.jpg` under the
/// thumbnails root (photos use `.webp`, videos use `.jpg`).
pub fn mirrored_thumb_path(rel_path: &str) -> String {
    let ext = if super::video_extension(rel_path) { "jpg" } else { "webp" };
    match rel_path.rfind('.') {
        Some(idx) => format!("{}.{}", &rel_path[..idx], ext),
        None => format!("{rel_path}.{ext}"),
    }
}

/// Self-heal check run once at startup: if the thumbnails directory is
/// essentially empty (a fresh volume, a restored backup missing the
/// thumbnail cache) but `thumb_status` still claims rows `exists`, that
/// claim is stale and every such row is reset to `pending` in bulk rather
/// than discovered one slow reconciler pass at a time.
pub async fn self_heal_on_startup(storage: &Storage, thumbnails_dir: &Path) -> crate::error::Result<()> {
    if !looks_empty(thumbnails_dir) {
        return Ok(());
    }
    let timeout = storage.db_tuning.query_timeout;
    let sample = thumb_status::sample_exists(&storage.main, 50, timeout).await?;
    let all_missing = sample.iter().all(|row| !thumbnails_dir.join(mirrored_thumb_path(&row.path)).exists());
    if !sample.is_empty() && all_missing {
        let reset = thumb_status::reset_all_exists_to_pending(&storage.main, timeout).await?;
        tracing::warn!(reset, "thumbnails directory looked empty but thumb_status claimed rows exist; reset to pending");
    }
    Ok(())
}

fn looks_empty(dir: &Path) -> bool {
    let Ok(top) = std::fs::read_dir(dir) else { return true };
    for entry in top.flatten() {
        if entry.path().is_dir() {
            if let Ok(inner) = std::fs::read_dir(entry.path()) {
                if inner.flatten().next().is_some() {
                    return false;
                }
            }
        } else {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_video_to_jpg_and_photo_to_webp() {
        assert_eq!(mirrored_thumb_path("A/clip.mp4"), "A/clip.jpg");
        assert_eq!(mirrored_thumb_path("A/beach.jpg"), "A/beach.webp");
    }

    #[test]
    fn empty_two_level_tree_looks_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("A")).unwrap();
        assert!(looks_empty(tmp.path()));
        std::fs::write(tmp.path().join("A/x.webp"), b"x").unwrap();
        assert!(!looks_empty(tmp.path()));
    }
}

//! Thumbnail engine: a two-priority work queue, a fixed worker pool, an
//! idle background-fill generator, and a continuously-running reconciler.
//!
//! A fixed pool sized off the configured worker count drains the queue via
//! a `tokio::sync::Notify` wakeup, retrying failed generations with
//! exponential backoff before marking a path permanently failed.

pub mod image;
pub mod queue;
pub mod reconciler;
pub mod video;
pub mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::config::Config;
use crate::events::{EventBus, GalleryEvent};
use crate::indexer::walk::is_video_extension;
use crate::storage::{thumb_status, Storage};

pub use queue::{Priority, ThumbnailQueue, ThumbnailTask};
pub use worker::WorkerPool;

fn video_extension(rel_path: &str) -> bool {
    is_video_extension(rel_path)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ThumbnailStatus {
    Exists { url: String },
    Processing,
    Failed,
}

/// Entry point for every surface (HTTP handlers, idle fill, watcher
/// reactions) that needs a thumbnail to exist. Never generates inline —
/// the caller either gets an existing file's URL, a `processing` signal
/// after enqueueing, or a `failed` signal for a permanently-failed path.
#[derive(Clone)]
pub struct ThumbnailEngine {
    queue: Arc<ThumbnailQueue>,
    pool: WorkerPool,
    storage: Storage,
    cache: Cache,
    thumbnails_dir: PathBuf,
    photos_dir: PathBuf,
}

impl ThumbnailEngine {
    pub async fn start(storage: Storage, cache: Cache, events: EventBus, config: &Config) -> crate::error::Result<Self> {
        let thumbnails_dir = config.thumbnails_dir();
        std::fs::create_dir_all(&thumbnails_dir)?;

        reconciler::self_heal_on_startup(&storage, &thumbnails_dir).await?;

        let queue = Arc::new(ThumbnailQueue::new());
        let pool = WorkerPool::new(
            queue.clone(),
            storage.clone(),
            cache.clone(),
            events,
            config.photos_dir.clone(),
            thumbnails_dir.clone(),
            config.thumbnail.clone(),
        );
        pool.spawn();

        let engine = Self {
            queue,
            pool,
            storage: storage.clone(),
            cache: cache.clone(),
            thumbnails_dir,
            photos_dir: config.photos_dir.clone(),
        };

        tokio::spawn(reconciler::run(storage.clone(), engine.thumbnails_dir.clone(), config.thumbnail.clone()));
        tokio::spawn(engine.clone().run_idle_fill(config.thumbnail.idle_fill_batch_size, config.thumbnail.idle_fill_pause));

        Ok(engine)
    }

    /// `ensureThumbnailExists(abs, rel)`: checks the output file first, then
    /// the permanent-failure marker, and only enqueues (high-priority,
    /// head-of-line) as a last resort.
    pub async fn ensure_exists(&self, rel_path: &str, mtime_ms: i64) -> crate::error::Result<ThumbnailStatus> {
        let thumb_path = self.thumbnails_dir.join(reconciler::mirrored_thumb_path(rel_path));
        if thumb_path.exists() {
            return Ok(ThumbnailStatus::Exists { url: format!("/thumbs/{rel_path}") });
        }

        let failed_key = format!("thumb_failed_permanently:{rel_path}");
        if self.cache.get::<bool>(&failed_key).await.ok().flatten().unwrap_or(false) {
            return Ok(ThumbnailStatus::Failed);
        }

        self.queue.push(ThumbnailTask { rel_path: rel_path.to_string(), mtime_ms, priority: Priority::High });
        Ok(ThumbnailStatus::Processing)
    }

    /// Called by the watcher when a media file changes: prioritizes
    /// regeneration since a viewer is likely to request it soon.
    pub fn notify_media_changed(&self, rel_path: &str, mtime_ms: i64) {
        self.queue.push(ThumbnailTask { rel_path: rel_path.to_string(), mtime_ms, priority: Priority::High });
    }

    /// Called by the watcher when a media file is removed: deletes the
    /// mirrored thumbnail file and status row rather than leaving a
    /// dangling entry for the reconciler to eventually trip over.
    pub async fn notify_media_removed(&self, rel_path: &str) -> crate::error::Result<()> {
        let thumb_path = self.thumbnails_dir.join(reconciler::mirrored_thumb_path(rel_path));
        let _ = tokio::fs::remove_file(&thumb_path).await;
        thumb_status::delete_by_paths(&self.storage.main, &[rel_path.to_string()], self.storage.db_tuning.query_timeout).await?;
        Ok(())
    }

    pub fn queue_depths(&self) -> (usize, usize) {
        self.queue.len()
    }

    async fn run_idle_fill(self, batch_size: usize, pause: Duration) {
        let mut after_id = 0i64;
        loop {
            match thumb_status::needs_generation(&self.storage.main, after_id, batch_size as i64, self.storage.db_tuning.query_timeout)
                .await
            {
                Ok(rows) if rows.is_empty() => {
                    after_id = 0;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(rows) => {
                    debug!(count = rows.len(), "idle fill batch");
                    for (id, path, mtime) in rows {
                        after_id = after_id.max(id);
                        self.queue.push(ThumbnailTask { rel_path: path, mtime_ms: mtime, priority: Priority::Low });
                    }
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "idle fill query failed");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

/// Reacts to [`GalleryEvent`]s published by the watcher so the engine
/// never has to depend on watcher internals directly.
pub async fn run_event_bridge(engine: ThumbnailEngine, events: EventBus) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(GalleryEvent::MediaChanged { path }) => {
                let mtime_ms = std::fs::metadata(engine.photos_dir.join(&path))
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                engine.notify_media_changed(&path, mtime_ms);
            }
            Ok(GalleryEvent::MediaRemoved { path }) => {
                if let Err(e) = engine.notify_media_removed(&path).await {
                    tracing::warn!(error = %e, "failed to clean up thumbnail after media removal");
                }
            }
            Ok(GalleryEvent::ThumbnailGenerated { .. }) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "thumbnail event bridge lagged behind event bus");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                info!("event bus closed, stopping thumbnail event bridge");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_video_extensions() {
        assert!(video_extension("A/clip.mkv"));
        assert!(!video_extension("A/photo.jpg"));
    }
}

//! Fixed-size worker pool draining the [`ThumbnailQueue`]. Each worker
//! loop pops the highest-priority available task, holding the last idle
//! worker in reserve so a burst of on-demand requests is never stuck
//! waiting behind a long-running background fill task, generates the
//! thumbnail, and applies the retry ladder on failure.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::config::ThumbnailTuning;
use crate::events::{EventBus, GalleryEvent};
use crate::indexer::walk::{is_media_extension, is_video_extension};
use crate::storage::{thumb_status, Storage};

use super::queue::{ThumbnailQueue, ThumbnailTask};

fn permanent_failure_key(rel_path: &str) -> String {
    format!("thumb_failed_permanently:{rel_path}")
}

/// Worker pool shared state. Cloned cheaply (everything behind `Arc`) into
/// each spawned worker task.
#[derive(Clone)]
pub struct WorkerPool {
    queue: Arc<ThumbnailQueue>,
    storage: Storage,
    cache: Cache,
    events: EventBus,
    photos_dir: PathBuf,
    thumbnails_dir: PathBuf,
    scratch_dir: PathBuf,
    tuning: ThumbnailTuning,
    active: Arc<Mutex<HashSet<String>>>,
    idle_workers: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<ThumbnailQueue>,
        storage: Storage,
        cache: Cache,
        events: EventBus,
        photos_dir: PathBuf,
        thumbnails_dir: PathBuf,
        tuning: ThumbnailTuning,
    ) -> Self {
        let scratch_dir = thumbnails_dir.join(".scratch");
        Self {
            queue,
            storage,
            cache,
            events,
            photos_dir,
            thumbnails_dir,
            scratch_dir,
            tuning,
            active: Arc::new(Mutex::new(HashSet::new())),
            idle_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn spawn(&self) {
        let worker_count = self.tuning.resolved_worker_count();
        for _ in 0..worker_count {
            let pool = self.clone();
            tokio::spawn(async move { pool.run_loop().await });
        }
        info!(worker_count, "thumbnail worker pool started");
    }

    async fn run_loop(&self) {
        loop {
            let idle_count = self.idle_workers.fetch_add(1, Ordering::SeqCst) + 1;
            let task = self.queue.pop(idle_count);
            self.idle_workers.fetch_sub(1, Ordering::SeqCst);

            let task = match task {
                Some(t) => t,
                None => {
                    self.queue.wait_for_work().await;
                    continue;
                }
            };

            // Defense in depth: the queue already filters duplicates at
            // push time, but a path can still be mid-flight from an
            // earlier push when a new one arrives for the same path.
            {
                let mut active = self.active.lock();
                if !active.insert(task.rel_path.clone()) {
                    continue;
                }
            }

            self.process(task.clone()).await;
            self.active.lock().remove(&task.rel_path);
        }
    }

    async fn process(&self, task: ThumbnailTask) {
        let rel_path = &task.rel_path;
        if !has_supported_extension(rel_path) {
            warn!(%rel_path, "skipping thumbnail task: unsupported extension");
            return;
        }

        let source = self.photos_dir.join(rel_path);
        let dest = self.thumbnails_dir.join(super::reconciler::mirrored_thumb_path(rel_path));

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self.generate_one(&source, &dest, rel_path).await;
            match result {
                Ok(()) => {
                    if let Err(e) =
                        thumb_status::mark_exists(&self.storage.main, rel_path, task.mtime_ms, self.storage.db_tuning.query_timeout).await
                    {
                        error!(%rel_path, error = %e, "failed to record thumb_status exists");
                    }
                    self.events.publish(GalleryEvent::ThumbnailGenerated { path: rel_path.clone() });
                    return;
                }
                Err(e) => {
                    warn!(%rel_path, attempt, error = %e, "thumbnail generation failed");
                    if attempt >= self.tuning.max_retries {
                        self.give_up(rel_path, attempt).await;
                        return;
                    }
                    let delay = self.tuning.initial_retry_delay * 2u32.pow(attempt - 1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn generate_one(&self, source: &std::path::Path, dest: &std::path::Path, rel_path: &str) -> crate::error::Result<()> {
        if is_video(rel_path) {
            let source = source.to_path_buf();
            let dest = dest.to_path_buf();
            let scratch = self.scratch_dir.clone();
            tokio::task::spawn_blocking(move || super::video::generate(&source, &dest, &scratch))
                .await
                .map_err(|e| crate::error::GalleryError::Internal(format!("worker task panicked: {e}")))?
        } else {
            let source = source.to_path_buf();
            let dest = dest.to_path_buf();
            tokio::task::spawn_blocking(move || super::image::generate(&source, &dest))
                .await
                .map_err(|e| crate::error::GalleryError::Internal(format!("worker task panicked: {e}")))?
        }
    }

    async fn give_up(&self, rel_path: &str, attempts: u32) {
        error!(%rel_path, attempts, "thumbnail generation exhausted retries, marking permanently failed");
        if let Err(e) = thumb_status::mark_failed(&self.storage.main, rel_path, self.storage.db_tuning.query_timeout).await {
            error!(%rel_path, error = %e, "failed to record thumb_status failed");
        }
        let _ = self
            .cache
            .set(&permanent_failure_key(rel_path), &true, Some(self.tuning.permanent_failure_ttl))
            .await;

        let corrupt_count = self.bump_corruption_counter(rel_path).await;
        if corrupt_count >= self.tuning.corruption_delete_threshold {
            warn!(%rel_path, corrupt_count, "corruption threshold reached, deleting source file");
            let source = self.photos_dir.join(rel_path);
            if let Err(e) = tokio::fs::remove_file(&source).await {
                error!(%rel_path, error = %e, "failed to delete corrupt source file");
            }
        }
    }

    async fn bump_corruption_counter(&self, rel_path: &str) -> u32 {
        let key = format!("thumb_corrupt_count:{rel_path}");
        let current: u32 = self.cache.get(&key).await.ok().flatten().unwrap_or(0);
        let next = current + 1;
        let _ = self.cache.set(&key, &next, Some(Duration::from_secs(7 * 24 * 3600))).await;
        next
    }
}

fn is_video(rel_path: &str) -> bool {
    is_video_extension(rel_path)
}

fn has_supported_extension(rel_path: &str) -> bool {
    is_media_extension(rel_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_extensions_case_insensitively() {
        assert!(has_supported_extension("A/photo.JPG"));
        assert!(has_supported_extension("A/clip.MP4"));
        assert!(!has_supported_extension("A/doc.txt"));
    }

    #[test]
    fn classifies_video_vs_photo() {
        assert!(is_video("A/clip.mov"));
        assert!(!is_video("A/photo.png"));
    }
}

//! Filesystem watcher: turns raw `notify` events into a debounced,
//! consolidated change set and hands it to the [`Indexer`](crate::indexer::Indexer).
//!
//! Raw filesystem events are buffered and debounced before being collapsed
//! into a minimal set of `add`/`addDir`/`unlink`/`unlinkDir`/`update`
//! changes, so a burst of writes to the same path triggers one indexer pass
//! rather than one per event.

pub mod consolidate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, WatcherTuning};
use crate::events::{EventBus, GalleryEvent};
use crate::indexer::{Change, Indexer};
use crate::path::RelPath;
use consolidate::{RawEvent, RawKind};

const VENDOR_DIRS: &[&str] = &["@eaDir", "#recycle", "@Recycle", ".@__thumb"];

fn is_hidden_or_vendor(path: &Path) -> bool {
    path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.starts_with('.') || VENDOR_DIRS.iter().any(|v| v.eq_ignore_ascii_case(&name))
    })
}

fn hash_small_file(path: &Path) -> Option<String> {
    // Only hashed to collapse duplicate-add noise from editors/sync clients;
    // skip anything too large to hash cheaply on every event.
    const MAX_HASH_BYTES: u64 = 32 * 1024 * 1024;
    let meta = std::fs::metadata(path).ok()?;
    if meta.len() > MAX_HASH_BYTES {
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}

/// Watches `config.photos_dir`, consolidates changes over an adaptive
/// debounce window, and applies them through `indexer`. Runs until the
/// process exits; failures restart the watch loop rather than killing the
/// task.
pub struct FsWatcher {
    photos_dir: PathBuf,
    tuning: WatcherTuning,
    indexer: Indexer,
    events: EventBus,
}

impl FsWatcher {
    pub fn new(config: &Config, indexer: Indexer, events: EventBus) -> Self {
        Self { photos_dir: config.photos_dir.clone(), tuning: config.watcher.clone(), indexer, events }
    }

    pub async fn run(self) {
        loop {
            if let Err(e) = self.watch_once().await {
                warn!(error = %e, "filesystem watcher loop exited, restarting in 5s");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    async fn watch_once(&self) -> notify::Result<()> {
        let (tx, mut rx) = mpsc::channel::<notify::Event>(1024);
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&self.photos_dir, RecursiveMode::Recursive)?;
        info!(path = %self.photos_dir.display(), "filesystem watcher started");

        let mut pending: Vec<RawEvent> = Vec::new();
        let mut debounce = tokio::time::interval(self.tuning.debounce_baseline);
        debounce.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.ingest(event, &mut pending),
                        None => return Ok(()),
                    }
                }
                _ = debounce.tick(), if !pending.is_empty() => {
                    self.flush(&mut pending).await;
                }
            }

            let delay = scale_debounce(&self.tuning, pending.len());
            if delay != debounce.period() {
                debounce = tokio::time::interval(delay);
                debounce.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            }
        }
    }

    fn ingest(&self, event: notify::Event, pending: &mut Vec<RawEvent>) {
        let kind = match event.kind {
            EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Folder) | EventKind::Create(CreateKind::Any) => {
                RawKind::Create
            }
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => RawKind::Modify,
            EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Folder) | EventKind::Remove(RemoveKind::Any) => {
                RawKind::Remove
            }
            _ => return,
        };

        for abs_path in event.paths {
            if is_hidden_or_vendor(&abs_path) {
                continue;
            }
            let Ok(rel) = abs_path.strip_prefix(&self.photos_dir) else { continue };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let Ok(rel_path) = RelPath::new(&rel_str) else { continue };

            let is_dir = abs_path.is_dir();
            let mtime_ms = std::fs::metadata(&abs_path)
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            let content_hash =
                if kind == RawKind::Create && !is_dir { hash_small_file(&abs_path) } else { None };

            pending.push(RawEvent { path: rel_path, kind, is_dir, mtime_ms, content_hash });
        }
    }

    async fn flush(&self, pending: &mut Vec<RawEvent>) {
        let batch = std::mem::take(pending);
        debug!(count = batch.len(), "flushing consolidated watcher batch");
        let changes = consolidate::consolidate(batch);
        if changes.is_empty() {
            return;
        }

        if changes.len() > self.tuning.full_rebuild_threshold {
            info!(changes = changes.len(), threshold = self.tuning.full_rebuild_threshold, "change volume exceeds threshold, triggering full rebuild");
            if let Err(e) = self.indexer.rebuild().await {
                warn!(error = %e, "triggered full rebuild failed");
            }
            return;
        }

        if let Err(e) = self.indexer.apply_changes(&changes).await {
            warn!(error = %e, "failed to apply consolidated changes");
            return;
        }

        for change in &changes {
            self.publish_for(change);
        }
    }

    fn publish_for(&self, change: &Change) {
        match change {
            Change::Add { path, .. } | Change::Update { path, .. } => {
                self.events.publish(GalleryEvent::MediaChanged { path: path.as_str().to_string() });
            }
            Change::Unlink { path } => {
                self.events.publish(GalleryEvent::MediaRemoved { path: path.as_str().to_string() });
            }
            Change::AddDir { .. } | Change::UnlinkDir { .. } => {}
        }
    }
}

/// Scales the debounce delay with backlog size: a small trickle of changes
/// flushes at the baseline cadence, a large backlog flushes less often so
/// consolidation has more time to collapse noisy sequences.
fn scale_debounce(tuning: &WatcherTuning, backlog: usize) -> Duration {
    if backlog < 50 {
        tuning.debounce_baseline
    } else {
        let scale = (backlog as f64 / 500.0).min(1.0);
        let extra = tuning.debounce_max.saturating_sub(tuning.debounce_baseline);
        tuning.debounce_baseline + Duration::from_secs_f64(extra.as_secs_f64() * scale)
    }
}

//! Directory walking, dimension probing, full rebuild, incremental change
//! application, and album-cover computation — the pipeline that keeps
//! `items`/`items_fts`/`thumb_status`/`album_covers` in sync with the media
//! tree on disk.

pub mod covers;
pub mod dimensions;
pub mod fts;
pub mod incremental;
pub mod ngram;
pub mod rebuild;
pub mod walk;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::Result;
use crate::storage::Storage;

pub use incremental::Change;

/// Wires the storage/config/cache handles the rebuild and incremental-apply
/// operations need, and guards against two critical (tree-mutating)
/// operations running concurrently: a rebuild already in flight makes a
/// second rebuild or incremental apply a silent no-op rather than letting
/// two writers race over `items`.
#[derive(Clone)]
pub struct Indexer {
    storage: Storage,
    config: Config,
    cache: Cache,
    critical_in_flight: Arc<AtomicBool>,
}

impl Indexer {
    pub fn new(storage: Storage, config: Config, cache: Cache) -> Self {
        Self { storage, config, cache, critical_in_flight: Arc::new(AtomicBool::new(false)) }
    }

    /// Runs a full rebuild, unless another critical operation is already in
    /// flight, in which case this call is dropped (logged) and returns
    /// `Ok(())` — the caller (an admin endpoint or a startup check) treats
    /// "already running" as a non-error.
    pub async fn rebuild(&self) -> Result<()> {
        if self.critical_in_flight.swap(true, Ordering::SeqCst) {
            warn!("rebuild requested while a critical indexing operation is already running; dropped");
            return Ok(());
        }
        let result = rebuild::rebuild(&self.storage, &self.config).await;
        self.critical_in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Applies a consolidated change set from the watcher, unless a
    /// critical operation is already in flight.
    pub async fn apply_changes(&self, changes: &[Change]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        if self.critical_in_flight.swap(true, Ordering::SeqCst) {
            warn!(
                changes = changes.len(),
                "incremental apply requested while a critical indexing operation is already running; dropped"
            );
            return Ok(());
        }
        let result = incremental::apply(&self.storage, &self.cache, &self.config, changes).await;
        self.critical_in_flight.store(false, Ordering::SeqCst);
        result
    }

    pub fn is_busy(&self) -> bool {
        self.critical_in_flight.load(Ordering::SeqCst)
    }
}

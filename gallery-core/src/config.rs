//! Numeric tuning and path configuration shared by every component.
//!
//! `gallery-server` is responsible for loading these from the environment
//! (via `dotenvy` + `clap`) and constructing one [`Config`]; every other
//! crate just reads fields off of it. Keeping the struct here (rather than
//! in the server binary) lets `gallery-core`'s own tests construct configs
//! without depending on the CLI layer.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory containing the photo/video tree. Treated as read-only
    /// except for watcher-observed external changes.
    pub photos_dir: PathBuf,
    /// Root directory for `gallery.db`, `settings.db`, `history.db`,
    /// `index.db` and their `-wal`/`-shm` siblings, plus `thumbnails/`.
    pub data_dir: PathBuf,
    /// Redis connection URL backing the cache layer and durable job queues.
    pub redis_url: String,

    pub db: DbTuning,
    pub indexer: IndexerTuning,
    pub watcher: WatcherTuning,
    pub thumbnail: ThumbnailTuning,
    pub cache: CacheTuning,

    /// Admin secret required for sensitive settings writes. `None` disables
    /// those endpoints entirely.
    pub admin_secret: Option<String>,
    /// Whether the gallery is reachable without authentication.
    pub public_access: bool,
}

#[derive(Debug, Clone)]
pub struct DbTuning {
    pub busy_timeout: Duration,
    pub query_timeout: Duration,
}

impl DbTuning {
    pub const BUSY_TIMEOUT_RANGE: (Duration, Duration) =
        (Duration::from_secs(10), Duration::from_secs(60));
    pub const QUERY_TIMEOUT_RANGE: (Duration, Duration) =
        (Duration::from_secs(15), Duration::from_secs(60));

    /// Clamp a runtime-adjusted busy timeout into `[10s, 60s]`.
    pub fn clamp_busy(d: Duration) -> Duration {
        d.clamp(Self::BUSY_TIMEOUT_RANGE.0, Self::BUSY_TIMEOUT_RANGE.1)
    }

    /// Clamp a runtime-adjusted query timeout into `[15s, 60s]`.
    pub fn clamp_query(d: Duration) -> Duration {
        d.clamp(Self::QUERY_TIMEOUT_RANGE.0, Self::QUERY_TIMEOUT_RANGE.1)
    }
}

impl Default for DbTuning {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerTuning {
    /// Batch size for the full-rebuild walk.
    pub rebuild_batch_size: usize,
    /// Bounded concurrency for dimension probing.
    pub dimension_concurrency: usize,
}

impl Default for IndexerTuning {
    fn default() -> Self {
        Self {
            rebuild_batch_size: 1000,
            dimension_concurrency: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherTuning {
    /// Write-finish stability threshold before an event is considered settled.
    pub stability_threshold: Duration,
    /// Baseline debounce delay; scales up with backlog size.
    pub debounce_baseline: Duration,
    /// Maximum debounce delay under heavy backlog.
    pub debounce_max: Duration,
    /// Consolidated change-set size beyond which a full rebuild is
    /// triggered instead of an incremental apply.
    pub full_rebuild_threshold: usize,
    /// Use polling instead of native filesystem notifications (network FS).
    pub use_polling: bool,
    pub poll_interval: Duration,
}

impl Default for WatcherTuning {
    fn default() -> Self {
        Self {
            stability_threshold: Duration::from_secs(2),
            debounce_baseline: Duration::from_secs(5),
            debounce_max: Duration::from_secs(30),
            full_rebuild_threshold: 5000,
            use_polling: false,
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailTuning {
    /// `0` means auto: `max(1, num_cpus::get() / 2)`.
    pub worker_count: usize,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub corruption_delete_threshold: u32,
    pub permanent_failure_ttl: Duration,
    /// Reconciler batch size and inter-batch pause.
    pub reconcile_batch_size: usize,
    pub reconcile_pause: Duration,
    /// Idle-fill batch size and inter-batch pause to avoid I/O spikes.
    pub idle_fill_batch_size: usize,
    pub idle_fill_pause: Duration,
}

impl ThumbnailTuning {
    pub fn resolved_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            (num_cpus::get() / 2).max(1)
        } else {
            self.worker_count
        }
    }
}

impl Default for ThumbnailTuning {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(1),
            corruption_delete_threshold: 10,
            permanent_failure_ttl: Duration::from_secs(7 * 24 * 3600),
            reconcile_batch_size: 300,
            reconcile_pause: Duration::from_millis(500),
            idle_fill_batch_size: 200,
            idle_fill_pause: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheTuning {
    /// Base ceiling on tags touched by one invalidation before the system
    /// degrades to a coarse pattern-delete. Scales with observed change
    /// volume at call sites (see `cache::adaptive_tag_ceiling`).
    pub base_tag_ceiling: usize,
    pub cover_cache_ttl: Duration,
    pub route_cache_default_ttl: Duration,
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            base_tag_ceiling: 200,
            cover_cache_ttl: Duration::from_secs(7 * 24 * 3600),
            route_cache_default_ttl: Duration::from_secs(300),
        }
    }
}

impl Config {
    pub fn main_db_path(&self) -> PathBuf {
        self.data_dir.join("gallery.db")
    }
    pub fn settings_db_path(&self) -> PathBuf {
        self.data_dir.join("settings.db")
    }
    pub fn history_db_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }
    pub fn index_db_path(&self) -> PathBuf {
        self.data_dir.join("index.db")
    }
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_dir.join("thumbnails")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_timeouts_to_documented_ranges() {
        assert_eq!(DbTuning::clamp_busy(Duration::from_secs(1)), Duration::from_secs(10));
        assert_eq!(DbTuning::clamp_busy(Duration::from_secs(999)), Duration::from_secs(60));
        assert_eq!(DbTuning::clamp_query(Duration::from_secs(1)), Duration::from_secs(15));
    }

    #[test]
    fn resolves_worker_count_from_cpu_count_when_zero() {
        let t = ThumbnailTuning { worker_count: 0, ..Default::default() };
        assert!(t.resolved_worker_count() >= 1);
    }
}

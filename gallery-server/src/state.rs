//! Application state: every long-lived component wired together once at
//! startup and cloned cheaply (all handles are `Arc`-backed) into each
//! request.

use std::sync::Arc;

use gallery_core::cache::Cache;
use gallery_core::config::Config;
use gallery_core::events::EventBus;
use gallery_core::indexer::Indexer;
use gallery_core::jobs::{JobQueue, RetryPolicy};
use gallery_core::storage::Storage;
use gallery_core::thumbnail::ThumbnailEngine;
use gallery_core::watcher::FsWatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Storage,
    pub cache: Cache,
    pub events: EventBus,
    pub indexer: Indexer,
    pub thumbnails: ThumbnailEngine,
    pub captions: JobQueue,
    pub settings_jobs: JobQueue,
}

impl AppState {
    /// Wires storage, cache, event bus, indexer and thumbnail engine in the
    /// dependency order each needs its predecessors. The filesystem watcher
    /// and the thumbnail/event bridge are spawned by the caller (`main`),
    /// not here, since they're long-running tasks rather than handles a
    /// request needs to reach.
    pub async fn new(config: Config) -> anyhow::Result<(Self, FsWatcher)> {
        let storage = Storage::open(&config.data_dir, config.db.clone()).await?;
        let cache = Cache::connect(&config.redis_url).await?;
        let events = EventBus::default();
        let indexer = Indexer::new(storage.clone(), config.clone(), cache.clone());
        let thumbnails = ThumbnailEngine::start(storage.clone(), cache.clone(), events.clone(), &config).await?;
        let watcher = FsWatcher::new(&config, indexer.clone(), events.clone());

        let job_client = redis::Client::open(config.redis_url.as_str())?;
        let job_conn = redis::aio::ConnectionManager::new(job_client).await?;
        let captions = JobQueue::new(job_conn.clone(), "captions", RetryPolicy::default());
        let settings_jobs = JobQueue::new(job_conn, "settings", RetryPolicy::default());

        let state = Self {
            config: Arc::new(config),
            storage,
            cache,
            events,
            indexer,
            thumbnails,
            captions,
            settings_jobs,
        };
        Ok((state, watcher))
    }
}

//! Dimension resolution for photos and videos, bounded to ~50 concurrent
//! probes with a short TTL in-memory cache keyed by `(path, mtime)` so a
//! file touched by several consolidated changes in a row isn't re-probed
//! each time.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::indexer::walk::WalkEntry;
use crate::storage::items::ItemType;

const FALLBACK_DIMENSIONS: (i64, i64) = (1920, 1080);
const PROBE_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct DimensionProbe {
    cache: Arc<DashMap<(String, i64), (Instant, (i64, i64))>>,
    concurrency: usize,
}

impl DimensionProbe {
    pub fn new(concurrency: usize) -> Self {
        Self { cache: Arc::new(DashMap::new()), concurrency: concurrency.max(1) }
    }

    /// Probes dimensions for every entry in `entries`, bounded to
    /// `self.concurrency` concurrent probes. Directories are skipped
    /// (dimensions are meaningless for albums).
    pub async fn probe_batch(&self, entries: &[WalkEntry]) -> Vec<(String, i64, i64)> {
        let results: Vec<Option<(String, i64, i64)>> = stream::iter(entries.iter().cloned())
            .map(|entry| {
                let this = self.clone();
                async move {
                    if !entry.item_type.is_media() {
                        return None;
                    }
                    let (w, h) = this.probe_one(&entry).await;
                    Some((entry.rel_path, w, h))
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.into_iter().flatten().collect()
    }

    async fn probe_one(&self, entry: &WalkEntry) -> (i64, i64) {
        let cache_key = (entry.rel_path.clone(), entry.mtime_ms);
        if let Some(hit) = self.cache.get(&cache_key) {
            if hit.0.elapsed() < PROBE_CACHE_TTL {
                return hit.1;
            }
        }

        let dims = match entry.item_type {
            ItemType::Photo => probe_photo(&entry.abs_path).unwrap_or(FALLBACK_DIMENSIONS),
            ItemType::Video => probe_video(&entry.abs_path).unwrap_or(FALLBACK_DIMENSIONS),
            ItemType::Album => FALLBACK_DIMENSIONS,
        };
        self.cache.insert(cache_key, (Instant::now(), dims));
        dims
    }
}

fn probe_photo(path: &Path) -> Option<(i64, i64)> {
    match image::image_dimensions(path) {
        Ok((w, h)) => Some((w as i64, h as i64)),
        Err(e) => {
            warn!(?path, error = %e, "photo dimension probe failed, falling back");
            None
        }
    }
}

fn probe_video(path: &Path) -> Option<(i64, i64)> {
    match ffmpeg_next::format::input(path) {
        Ok(ictx) => {
            let stream = ictx.streams().best(ffmpeg_next::media::Type::Video)?;
            let ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters()).ok()?;
            let decoder = ctx.decoder().video().ok()?;
            Some((decoder.width() as i64, decoder.height() as i64))
        }
        Err(e) => {
            warn!(?path, error = %e, "video dimension probe failed, falling back");
            None
        }
    }
}

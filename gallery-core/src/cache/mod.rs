//! Cache layer: a Redis-backed key-value store with a tag-to-keys reverse
//! index for precise invalidation, and a degradation path to coarse
//! pattern-delete when a single change would touch too many tags.
//!
//! A `redis::aio::ConnectionManager` is wrapped behind `get`/`set` with JSON
//! serialization and `tracing::debug!` on hit/miss; the tag reverse index
//! and adaptive degradation on top of that exist because the gallery's
//! invalidation scheme needs to drop a bounded set of route-cache entries
//! per filesystem change rather than a single key.

pub mod route_cache;
pub mod tags;

use std::fmt;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GalleryError, Result};

#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    pub hits: std::sync::Arc<std::sync::atomic::AtomicU64>,
    pub misses: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("connection", &"ConnectionManager").finish()
    }
}

impl Cache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!(%redis_url, "connecting to redis cache");
        let client = redis::Client::open(redis_url)
            .map_err(|e| GalleryError::Cache(format!("failed to create redis client: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| GalleryError::Cache(format!("failed to connect to redis: {e}")))?;
        Ok(Self {
            conn,
            hits: Default::default(),
            misses: Default::default(),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = match conn.get(key).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, key, "cache GET failed, proceeding without cache");
                return Ok(None);
            }
        };
        match data {
            Some(json) => {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(key, "cache HIT");
                let value = serde_json::from_str(&json)
                    .map_err(|e| GalleryError::Cache(format!("failed to deserialize: {e}")))?;
                Ok(Some(value))
            }
            None => {
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(key, "cache MISS");
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| GalleryError::Cache(format!("failed to serialize: {e}")))?;
        let mut conn = self.conn.clone();
        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, json, ttl.as_secs()).await,
            None => conn.set::<_, _, ()>(key, json).await,
        };
        if let Err(e) = result {
            warn!(error = %e, key, "cache SET failed, proceeding without cache");
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: redis::RedisResult<()> = conn.del(key).await;
        Ok(())
    }

    /// Coarse degradation path: deletes every key matching `pattern` via
    /// `SCAN` + pipelined `DEL`, used when a single invalidation would
    /// otherwise touch more tags than the adaptive ceiling allows.
    pub async fn delete_by_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let mut cursor = 0u64;
        let mut deleted = 0u64;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(|e| GalleryError::Cache(format!("SCAN failed: {e}")))?;
            if !keys.is_empty() {
                let mut pipe = redis::pipe();
                for k in &keys {
                    pipe.del(k);
                }
                let _: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
                deleted += keys.len() as u64;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        info!(pattern, deleted, "coarse pattern-delete applied");
        Ok(deleted)
    }

    pub fn hit_miss_counters(&self) -> (u64, u64) {
        (
            self.hits.load(std::sync::atomic::Ordering::Relaxed),
            self.misses.load(std::sync::atomic::Ordering::Relaxed),
        )
    }

    pub(crate) fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

//! Tag-to-keys reverse index, so a cache write can be tagged once and
//! invalidated precisely later without scanning every key in the store.

use redis::AsyncCommands;
use tracing::info;

use super::Cache;
use crate::error::{GalleryError, Result};

fn tag_set_key(tag: &str) -> String {
    format!("tag:{tag}")
}

impl Cache {
    /// Records that `key` belongs to each of `tags`, called whenever a
    /// response is cached.
    pub async fn add_tags_to_key(&self, key: &str, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        for tag in tags {
            pipe.sadd(tag_set_key(tag), key);
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| GalleryError::Cache(format!("failed to tag key: {e}")))?;
        Ok(())
    }

    /// Invalidates every key associated with any of `tags`: one pipelined
    /// read across the tag sets, then one pipelined write deleting the keys
    /// plus the tag sets themselves.
    ///
    /// If the adaptive ceiling (scaling with recent change volume) would be
    /// exceeded, the caller should instead call [`Cache::delete_by_pattern`]
    /// against the coarse browse route-cache prefix — that decision is made
    /// by the caller via [`adaptive_tag_ceiling`], not inside this method,
    /// since only the caller knows how many tags a single change touched.
    pub async fn invalidate_tags(&self, tags: &[String]) -> Result<u64> {
        if tags.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let set_keys: Vec<String> = tags.iter().map(|t| tag_set_key(t)).collect();

        let mut read_pipe = redis::pipe();
        for k in &set_keys {
            read_pipe.smembers(k);
        }
        let member_sets: Vec<Vec<String>> = read_pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| GalleryError::Cache(format!("failed to read tag sets: {e}")))?;

        let mut keys: Vec<String> =
            member_sets.into_iter().flatten().collect::<std::collections::HashSet<_>>().into_iter().collect();
        keys.sort();

        if keys.is_empty() && set_keys.is_empty() {
            return Ok(0);
        }

        let mut write_pipe = redis::pipe();
        for k in &keys {
            write_pipe.del(k);
        }
        for k in &set_keys {
            write_pipe.del(k);
        }
        write_pipe
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| GalleryError::Cache(format!("failed to invalidate tags: {e}")))?;

        info!(tags = tags.len(), keys = keys.len(), "invalidated cache tags");
        Ok(keys.len() as u64)
    }
}

/// Scales the base ceiling with observed change volume: a burst of N
/// watcher changes is allowed up to `base + N` tags before the system
/// degrades to a coarse pattern-delete, so a large-but-legitimate batch of
/// edits doesn't trip the ceiling as readily as a pathological one.
pub fn adaptive_tag_ceiling(base_ceiling: usize, change_count: usize) -> usize {
    base_ceiling + change_count.min(base_ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_scales_but_is_bounded() {
        assert_eq!(adaptive_tag_ceiling(200, 0), 200);
        assert_eq!(adaptive_tag_ceiling(200, 50), 250);
        assert_eq!(adaptive_tag_ceiling(200, 10_000), 400);
    }
}

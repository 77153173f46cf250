//! Browse service: direct-children pagination with SQL-driven sort
//! strategies, DB-first cover lookup with filesystem fallback for legacy
//! albums, and cached dimension resolution.
//!
//! Listing is a single indexed pass over the parent prefix, paging in SQL
//! rather than in memory; dimension lookups follow the same cache-aside
//! shape, checking the cache first and only falling through to a probe and
//! a DB write on a miss.

pub mod sort;

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use urlencoding::encode;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{GalleryError, Result};
use crate::indexer;
use crate::path::RelPath;
use crate::storage::items::{Item, ItemType};
use crate::storage::{album_covers, history, items, Storage};

use sort::SortStrategy;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub mtime: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub cover_url: Option<String>,
    pub original_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowsePage {
    pub items: Vec<BrowseItem>,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u64,
}

fn dimension_cache_key(path: &str, mtime: i64) -> String {
    format!("dim:{path}:{mtime}")
}

/// `listDirectory(relPath, page, limit, userId, sort)`.
pub async fn list_directory(
    storage: &Storage,
    cache: &Cache,
    config: &Config,
    rel_path: &str,
    page: u32,
    limit: u32,
    user_id: &str,
    sort: &str,
) -> Result<BrowsePage> {
    let strategy: SortStrategy = sort.parse().unwrap_or_default();
    let at_root = rel_path.is_empty();

    let mut children = items::direct_children(&storage.main, rel_path, storage.db_tuning.query_timeout).await?;
    let total_results = children.len() as u64;
    let limit = limit.max(1);
    let total_pages = total_results.div_ceil(limit as u64).max(1) as u32;
    let page = page.max(1);

    sort::sort_in_place(&mut children, strategy, at_root);

    if sort::needs_viewed_pass(strategy, at_root) {
        let paths: Vec<String> = children.iter().map(|i| i.path.clone()).collect();
        let rows = history::max_viewed_for_paths(&storage.history, user_id, &paths, storage.db_tuning.query_timeout).await?;
        let viewed: HashMap<String, i64> = rows.into_iter().collect();
        sort::apply_viewed_order(&mut children, &viewed);
    }

    let start = ((page as u64 - 1) * limit as u64) as usize;
    let page_items: Vec<Item> = children.into_iter().skip(start).take(limit as usize).collect();

    let album_paths: Vec<String> = page_items.iter().filter(|i| i.item_type == ItemType::Album).map(|i| i.path.clone()).collect();
    let covers = resolve_covers(storage, cache, config, &album_paths).await?;

    let mut out = Vec::with_capacity(page_items.len());
    for item in page_items {
        out.push(render_item(storage, cache, config, &item, &covers).await?);
    }

    Ok(BrowsePage { items: out, page, total_pages, total_results })
}

async fn render_item(
    storage: &Storage,
    cache: &Cache,
    config: &Config,
    item: &Item,
    covers: &HashMap<String, album_covers::AlbumCover>,
) -> Result<BrowseItem> {
    match item.item_type {
        ItemType::Album => {
            let cover_url = covers.get(&item.path).map(|c| {
                format!("/api/thumbnail?path={}&v={}", encode(&c.cover_path), c.mtime)
            });
            Ok(BrowseItem {
                name: item.name.clone(),
                path: item.path.clone(),
                item_type: item.item_type,
                mtime: item.mtime,
                width: None,
                height: None,
                cover_url,
                original_url: None,
                thumbnail_url: None,
            })
        }
        ItemType::Photo | ItemType::Video => {
            let (width, height) = resolve_dimensions(storage, cache, config, item).await?;
            Ok(BrowseItem {
                name: item.name.clone(),
                path: item.path.clone(),
                item_type: item.item_type,
                mtime: item.mtime,
                width,
                height,
                cover_url: None,
                original_url: Some(format!("/static/{}", encode(&item.path))),
                thumbnail_url: Some(format!("/api/thumbnail?path={}&v={}", encode(&item.path), item.mtime)),
            })
        }
    }
}

/// DB-first cover lookup, falling back to a live per-album recompute for
/// any album with `items` rows but no `album_covers` row yet (a backfill
/// gap), and finally to a bounded filesystem scan for legacy albums with
/// no `items` rows at all.
async fn resolve_covers(
    storage: &Storage,
    cache: &Cache,
    config: &Config,
    album_paths: &[String],
) -> Result<HashMap<String, album_covers::AlbumCover>> {
    if album_paths.is_empty() {
        return Ok(HashMap::new());
    }

    let mut by_path: HashMap<String, album_covers::AlbumCover> = HashMap::new();
    for c in album_covers::get_many(&storage.main, album_paths, storage.db_tuning.query_timeout).await? {
        by_path.insert(c.album_path.clone(), c);
    }

    let missing: Vec<&String> = album_paths.iter().filter(|p| !by_path.contains_key(p.as_str())).collect();
    for path in missing {
        if let Some(cover) = indexer::covers::compute_live(storage, path).await? {
            by_path.insert(path.clone(), cover);
            continue;
        }
        if let Some(cover) = scan_filesystem_for_cover(config, path) {
            by_path.insert(path.clone(), cover);
        }
    }

    cache_covers(cache, config, &by_path).await;
    Ok(by_path)
}

async fn cache_covers(cache: &Cache, config: &Config, covers: &HashMap<String, album_covers::AlbumCover>) {
    for (path, cover) in covers {
        let key = format!("cover:{path}");
        let _ = cache.set(&key, cover, Some(config.cache.cover_cache_ttl)).await;
    }
}

/// Bounded recursive walk of the album's on-disk subtree, used only when
/// an album has neither a precomputed cover row nor any `items` rows — a
/// legacy album predating the current index, or one the indexer hasn't
/// reached yet.
fn scan_filesystem_for_cover(config: &Config, album_path: &str) -> Option<album_covers::AlbumCover> {
    let abs = config.photos_dir.join(album_path);
    if !abs.is_dir() {
        return None;
    }
    let mut newest: Option<(String, i64)> = None;
    let _ = crate::indexer::walk::walk_media_tree(&abs, |entry| {
        if entry.item_type != ItemType::Album {
            let better = newest.as_ref().map(|(_, m)| entry.mtime_ms > *m).unwrap_or(true);
            if better {
                let rel = format!("{album_path}/{}", entry.rel_path);
                newest = Some((rel, entry.mtime_ms));
            }
        }
    });
    newest.map(|(cover_path, mtime)| album_covers::AlbumCover {
        album_path: album_path.to_string(),
        cover_path,
        width: None,
        height: None,
        mtime,
    })
}

/// Cache-aside dimension lookup keyed by `(path, mtime)`: a changed file
/// gets a new mtime and therefore a cache miss rather than a stale hit.
async fn resolve_dimensions(storage: &Storage, cache: &Cache, config: &Config, item: &Item) -> Result<(Option<i64>, Option<i64>)> {
    if let (Some(w), Some(h)) = (item.width, item.height) {
        return Ok((Some(w), Some(h)));
    }

    let key = dimension_cache_key(&item.path, item.mtime);
    if let Some((w, h)) = cache.get::<(i64, i64)>(&key).await.ok().flatten() {
        return Ok((Some(w), Some(h)));
    }

    let probe = indexer::dimensions::DimensionProbe::new(1);
    let entries = vec![indexer::walk::WalkEntry {
        rel_path: item.path.clone(),
        name: item.name.clone(),
        item_type: item.item_type,
        mtime_ms: item.mtime,
        abs_path: config.photos_dir.join(&item.path),
    }];
    let results = probe.probe_batch(&entries).await;
    if let Some((_, w, h)) = results.into_iter().next() {
        let _ = cache.set(&key, &(w, h), Some(Duration::from_secs(30 * 24 * 3600))).await;
        items::set_dimensions(&storage.main, item.id, w, h, storage.db_tuning.query_timeout).await?;
        return Ok((Some(w), Some(h)));
    }
    Ok((None, None))
}

/// `updateViewTime(userId, path)`: touches the full ancestor chain, then
/// clears route-cache entries under the parent so the new ordering is
/// visible on the next browse of that album.
pub async fn update_view_time(storage: &Storage, cache: &Cache, user_id: &str, path: &str) -> Result<()> {
    let rel = RelPath::new(path).map_err(GalleryError::InvalidOrUnsafePath)?;
    let now = chrono::Utc::now().timestamp();
    history::touch_ancestor_chain(&storage.history, user_id, &rel, now, storage.db_tuning.query_timeout).await?;

    let parent = rel.parent().map(|p| p.into_inner()).unwrap_or_default();
    let pattern = format!(
        "{}{}:*path={}*",
        crate::cache::route_cache::BROWSE_ROUTE_PREFIX,
        user_id,
        encode(&parent)
    );
    let _ = cache.delete_by_pattern(&pattern).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_cache_key_includes_mtime() {
        assert_eq!(dimension_cache_key("A/p.jpg", 123), "dim:A/p.jpg:123");
    }
}

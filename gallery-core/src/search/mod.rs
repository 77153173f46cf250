//! Search service: FTS query construction from free text, album-preferred
//! ordering, nested-album suppression, and result enrichment.
//!
//! Query sanitization and tokenization happen here; `indexer::ngram` and
//! `indexer::fts` own the underlying FTS5 query shape, while this module
//! owns the ordering/suppression rules the FTS5 query itself can't express.

use serde::Serialize;
use urlencoding::encode;

use crate::error::{GalleryError, Result};
use crate::indexer::fts;
use crate::indexer::ngram::ngrams;
use crate::storage::album_covers;
use crate::storage::items::{self, Item, ItemType};
use crate::storage::Storage;

/// FTS5 metacharacters stripped from the raw query before tokenization, so
/// user input can never be interpreted as FTS5 query syntax.
const FTS_METACHARACTERS: &[char] = &['(', ')', '{', '}', '[', ']', '/', '\\', '"', '.', '*', '?', '!', ':', '^', '~', '+', '-', ','];

/// A generous internal cap on how many ranked FTS hits are pulled before
/// suppression/reordering happens in Rust — bounds worst-case work for a
/// query that matches almost everything without needing the FTS5 query
/// itself to express "no nested albums".
const MAX_CANDIDATE_HITS: i64 = 500;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub mtime: i64,
    pub cover_url: Option<String>,
    pub original_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u64,
    pub limit: u32,
}

fn sanitize(q: &str) -> String {
    q.chars().filter(|c| !FTS_METACHARACTERS.contains(c)).collect()
}

fn build_fts_query(sanitized: &str) -> Option<String> {
    let tokens = ngrams(sanitized);
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.join(" "))
}

pub async fn search(storage: &Storage, q: &str, page: u32, limit: u32) -> Result<SearchPage> {
    let page = page.max(1);
    let limit = limit.max(1);
    let sanitized = sanitize(q);

    let Some(fts_query) = build_fts_query(&sanitized) else {
        return Ok(SearchPage { query: q.to_string(), results: Vec::new(), page, total_pages: 1, total_results: 0, limit });
    };

    let timeout = storage.db_tuning.query_timeout;

    if !fts::has_any_rows(&storage.main, timeout).await? {
        return Err(GalleryError::SearchUnavailable);
    }

    let total_matches = fts::count_matches(&storage.main, &fts_query, timeout).await? as u64;
    if total_matches == 0 {
        return Ok(SearchPage { query: q.to_string(), results: Vec::new(), page, total_pages: 1, total_results: 0, limit });
    }

    let hits = fts::search_ranked(&storage.main, &fts_query, MAX_CANDIDATE_HITS, 0, timeout).await?;
    if hits.is_empty() {
        return Ok(SearchPage { query: q.to_string(), results: Vec::new(), page, total_pages: 1, total_results: 0, limit });
    }

    let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
    let ranks: std::collections::HashMap<i64, f64> = hits.into_iter().collect();
    let mut results_items = items::by_ids(&storage.main, &ids, timeout).await?;

    suppress_nested_albums(&mut results_items);

    results_items.sort_by(|a, b| {
        let a_is_album = a.item_type == ItemType::Album;
        let b_is_album = b.item_type == ItemType::Album;
        match (a_is_album, b_is_album) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => {
                let ra = ranks.get(&a.id).copied().unwrap_or(f64::MAX);
                let rb = ranks.get(&b.id).copied().unwrap_or(f64::MAX);
                ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
            }
        }
    });

    let total_results = total_matches;
    let total_pages = total_results.div_ceil(limit as u64).max(1) as u32;
    let start = ((page as u64 - 1) * limit as u64) as usize;
    let page_items: Vec<Item> = results_items.into_iter().skip(start).take(limit as usize).collect();

    let album_paths: Vec<String> = page_items.iter().filter(|i| i.item_type == ItemType::Album).map(|i| i.path.clone()).collect();
    let covers = album_covers::get_many(&storage.main, &album_paths, timeout).await?;
    let covers_by_path: std::collections::HashMap<String, album_covers::AlbumCover> =
        covers.into_iter().map(|c| (c.album_path.clone(), c)).collect();

    let results = page_items.into_iter().map(|item| render_result(item, &covers_by_path)).collect();

    Ok(SearchPage { query: q.to_string(), results, page, total_pages, total_results, limit })
}

fn render_result(item: Item, covers: &std::collections::HashMap<String, album_covers::AlbumCover>) -> SearchResult {
    match item.item_type {
        ItemType::Album => {
            let cover_url = covers.get(&item.path).map(|c| format!("/api/thumbnail?path={}&v={}", encode(&c.cover_path), c.mtime));
            SearchResult { name: item.name, path: item.path, item_type: item.item_type, mtime: item.mtime, cover_url, original_url: None, thumbnail_url: None }
        }
        ItemType::Photo | ItemType::Video => SearchResult {
            name: item.name.clone(),
            original_url: Some(format!("/static/{}", encode(&item.path))),
            thumbnail_url: Some(format!("/api/thumbnail?path={}&v={}", encode(&item.path), item.mtime)),
            path: item.path,
            item_type: item.item_type,
            mtime: item.mtime,
            cover_url: None,
        },
    }
}

/// Keeps an album hit only if no other album hit's path is a strict
/// ancestor of it, so a search for "vacation" doesn't return both
/// `Vacation` and `Vacation/2024` when the parent already matched.
fn suppress_nested_albums(items: &mut Vec<Item>) {
    let album_paths: Vec<String> = items.iter().filter(|i| i.item_type == ItemType::Album).map(|i| i.path.clone()).collect();
    items.retain(|item| {
        if item.item_type != ItemType::Album {
            return true;
        }
        !album_paths.iter().any(|other| other != &item.path && item.path.starts_with(&format!("{other}/")))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_fts_metacharacters() {
        assert_eq!(sanitize("beach (2024)!"), "beach 2024");
    }

    #[test]
    fn empty_query_after_sanitization_has_no_fts_query() {
        assert_eq!(build_fts_query(""), None);
        assert_eq!(build_fts_query("   "), None);
    }

    fn album(path: &str) -> Item {
        Item {
            id: 0,
            name: path.to_string(),
            path: path.to_string(),
            item_type: ItemType::Album,
            mtime: 0,
            width: None,
            height: None,
            cover_path: None,
            last_viewed_at: None,
        }
    }

    #[test]
    fn nested_album_hits_are_suppressed() {
        let mut items = vec![album("Vacation"), album("Vacation/2024"), album("Other")];
        suppress_nested_albums(&mut items);
        let paths: Vec<&str> = items.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"Vacation"));
        assert!(paths.contains(&"Other"));
        assert!(!paths.contains(&"Vacation/2024"));
    }
}

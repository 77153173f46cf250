//! Route-response cache keying and tag computation, consumed by the HTTP
//! layer's cache middleware. Tagging conventions: `item:<relpath>` for a
//! single item, `album:<path>` for every album in an ancestor chain
//! (including the synthetic root tag `album:/`).

pub const BROWSE_ROUTE_PREFIX: &str = "route:browse:";

/// `(user_id or "anonymous", original_url)` — the cache key the HTTP layer
/// uses for idempotent reads.
pub fn route_key(user_id: Option<&str>, original_url: &str) -> String {
    format!("{}{}:{}", BROWSE_ROUTE_PREFIX, user_id.unwrap_or("anonymous"), original_url)
}

pub fn item_tag(rel_path: &str) -> String {
    format!("item:{rel_path}")
}

pub fn album_tag(album_path: &str) -> String {
    if album_path.is_empty() || album_path == "/" {
        "album:/".to_string()
    } else {
        format!("album:{album_path}")
    }
}

/// Tags for a changed item: its own `item:` tag plus an `album:` tag for
/// every ancestor in its chain, including the synthetic root.
pub fn tags_for_change(rel_path: &str, ancestor_albums: &[String]) -> Vec<String> {
    let mut tags = vec![item_tag(rel_path)];
    tags.extend(ancestor_albums.iter().map(|a| album_tag(a)));
    tags.push(album_tag("/"));
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_include_root_and_dedupe() {
        let tags = tags_for_change("A/p.jpg", &["A".to_string(), "/".to_string()]);
        assert!(tags.contains(&"item:A/p.jpg".to_string()));
        assert!(tags.contains(&"album:A".to_string()));
        assert_eq!(tags.iter().filter(|t| **t == "album:/").count(), 1);
    }
}

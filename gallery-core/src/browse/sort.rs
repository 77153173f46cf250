//! Sort strategies for direct-children listings. Albums always float
//! above media regardless of strategy; within each group the strategy
//! decides ordering.

use std::str::FromStr;

use crate::indexer::covers::natural_cmp;
use crate::storage::items::{Item, ItemType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStrategy {
    NameAsc,
    NameDesc,
    MtimeAsc,
    MtimeDesc,
    ViewedDesc,
    Smart,
}

impl FromStr for SortStrategy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "name_asc" => Ok(SortStrategy::NameAsc),
            "name_desc" => Ok(SortStrategy::NameDesc),
            "mtime_asc" => Ok(SortStrategy::MtimeAsc),
            "mtime_desc" => Ok(SortStrategy::MtimeDesc),
            "viewed_desc" => Ok(SortStrategy::ViewedDesc),
            "smart" => Ok(SortStrategy::Smart),
            _ => Err(()),
        }
    }
}

impl Default for SortStrategy {
    fn default() -> Self {
        SortStrategy::Smart
    }
}

fn is_album(item: &Item) -> bool {
    item.item_type == ItemType::Album
}

/// Orders `items` in place for everything except `viewed_desc`/`smart` at
/// a non-root path, which need a second query against view history first
/// (handled by the caller, which re-sorts via [`apply_viewed_order`]).
pub fn sort_in_place(items: &mut [Item], strategy: SortStrategy, at_root: bool) {
    match strategy {
        SortStrategy::NameAsc => items.sort_by(|a, b| group_then(a, b, |a, b| natural_cmp(&a.name, &b.name))),
        SortStrategy::NameDesc => {
            items.sort_by(|a, b| group_then(a, b, |a, b| natural_cmp(&b.name, &a.name)))
        }
        SortStrategy::MtimeAsc => items.sort_by(|a, b| group_then(a, b, |a, b| a.mtime.cmp(&b.mtime))),
        SortStrategy::MtimeDesc => items.sort_by(|a, b| group_then(a, b, |a, b| b.mtime.cmp(&a.mtime))),
        SortStrategy::ViewedDesc => items.sort_by(|a, b| group_then(a, b, |a, b| natural_cmp(&a.name, &b.name))),
        SortStrategy::Smart if at_root => {
            let now = chrono::Utc::now().timestamp();
            let recent_window = 24 * 3600;
            items.sort_by(|a, b| {
                group_then(a, b, |a, b| {
                    if is_album(a) {
                        let a_recent = now - a.mtime < recent_window;
                        let b_recent = now - b.mtime < recent_window;
                        match (a_recent, b_recent) {
                            (true, true) => b.mtime.cmp(&a.mtime),
                            (true, false) => std::cmp::Ordering::Less,
                            (false, true) => std::cmp::Ordering::Greater,
                            (false, false) => natural_cmp(&a.name, &b.name),
                        }
                    } else {
                        natural_cmp(&a.name, &b.name)
                    }
                })
            });
        }
        SortStrategy::Smart => items.sort_by(|a, b| group_then(a, b, |a, b| natural_cmp(&a.name, &b.name))),
    }
}

/// Whether `strategy` needs a second history query to finish ordering
/// (`viewed_desc` always; `smart` only away from the root).
pub fn needs_viewed_pass(strategy: SortStrategy, at_root: bool) -> bool {
    matches!(strategy, SortStrategy::ViewedDesc) || (strategy == SortStrategy::Smart && !at_root)
}

/// Re-sorts an already name-ordered page by `last_viewed DESC, name ASC`,
/// keeping the album-above-media grouping intact. `viewed` maps item path
/// to its most recent view time; items absent from the map sort after
/// every viewed item within their group.
pub fn apply_viewed_order(items: &mut [Item], viewed: &std::collections::HashMap<String, i64>) {
    items.sort_by(|a, b| {
        group_then(a, b, |a, b| {
            let va = viewed.get(&a.path);
            let vb = viewed.get(&b.path);
            match (va, vb) {
                (Some(va), Some(vb)) => vb.cmp(va),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => natural_cmp(&a.name, &b.name),
            }
        })
    });
}

fn group_then(a: &Item, b: &Item, tiebreak: impl FnOnce(&Item, &Item) -> std::cmp::Ordering) -> std::cmp::Ordering {
    match (is_album(a), is_album(b)) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => tiebreak(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, path: &str, item_type: ItemType, mtime: i64) -> Item {
        Item {
            id: 0,
            name: name.to_string(),
            path: path.to_string(),
            item_type,
            mtime,
            width: None,
            height: None,
            cover_path: None,
            last_viewed_at: None,
        }
    }

    #[test]
    fn albums_always_sort_above_media() {
        let mut items = vec![
            item("b.jpg", "b.jpg", ItemType::Photo, 10),
            item("Album", "Album", ItemType::Album, 5),
        ];
        sort_in_place(&mut items, SortStrategy::MtimeDesc, false);
        assert_eq!(items[0].name, "Album");
    }

    #[test]
    fn name_asc_is_natural_order() {
        let mut items = vec![
            item("img10.jpg", "img10.jpg", ItemType::Photo, 0),
            item("img2.jpg", "img2.jpg", ItemType::Photo, 0),
        ];
        sort_in_place(&mut items, SortStrategy::NameAsc, false);
        assert_eq!(items[0].name, "img2.jpg");
    }

    #[test]
    fn smart_at_root_floats_recent_albums_by_mtime() {
        let now = chrono::Utc::now().timestamp();
        let mut items = vec![
            item("Old", "Old", ItemType::Album, now - 999_999),
            item("New", "New", ItemType::Album, now - 10),
        ];
        sort_in_place(&mut items, SortStrategy::Smart, true);
        assert_eq!(items[0].name, "New");
    }

    #[test]
    fn needs_viewed_pass_only_for_viewed_desc_and_non_root_smart() {
        assert!(needs_viewed_pass(SortStrategy::ViewedDesc, true));
        assert!(!needs_viewed_pass(SortStrategy::Smart, true));
        assert!(needs_viewed_pass(SortStrategy::Smart, false));
    }
}

//! Recursive directory walk over the media root. Skips hidden entries and
//! vendor system directories (`@eaDir` and friends), recognizes media by
//! extension whitelist, and emits albums (directories) and media (files)
//! with `mtime` from `stat`.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::items::ItemType;

const VENDOR_DIRS: &[&str] = &["@eaDir", "#recycle", "@Recycle", ".@__thumb"];

/// The single photo-extension whitelist shared by the indexer walk, the
/// thumbnail worker's dispatch check, and the reconciler's video test.
pub const PHOTO_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp", "gif"];
/// The single video-extension whitelist shared by the indexer walk, the
/// thumbnail worker's dispatch check, and the reconciler's video test.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Case-insensitive check against [`VIDEO_EXTENSIONS`].
pub fn is_video_extension(rel_path: &str) -> bool {
    std::path::Path::new(rel_path)
        .extension()
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Case-insensitive check against [`PHOTO_EXTENSIONS`] or [`VIDEO_EXTENSIONS`].
pub fn is_media_extension(rel_path: &str) -> bool {
    std::path::Path::new(rel_path)
        .extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            PHOTO_EXTENSIONS.contains(&e.as_str()) || VIDEO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub rel_path: String,
    pub name: String,
    pub item_type: ItemType,
    pub mtime_ms: i64,
    pub abs_path: PathBuf,
}

pub fn classify_extension(path: &str) -> Option<ItemType> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        Some(ItemType::Photo)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(ItemType::Video)
    } else {
        None
    }
}

fn is_hidden_or_vendor(name: &str) -> bool {
    name.starts_with('.') || VENDOR_DIRS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn mtime_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Walks `root` depth-first, yielding one [`WalkEntry`] per album directory
/// and per recognized media file via `on_entry`. Non-media files (and
/// anything hidden or under a vendor directory) are skipped silently.
pub fn walk_media_tree(root: &Path, mut on_entry: impl FnMut(WalkEntry)) -> Result<()> {
    walk_inner(root, root, &mut on_entry)
}

fn walk_inner(root: &Path, dir: &Path, on_entry: &mut impl FnMut(WalkEntry)) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden_or_vendor(&name) {
            continue;
        }
        let abs_path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        let rel_path = abs_path
            .strip_prefix(root)
            .unwrap_or(&abs_path)
            .to_string_lossy()
            .replace('\\', "/");

        if meta.is_dir() {
            on_entry(WalkEntry {
                rel_path: rel_path.clone(),
                name,
                item_type: ItemType::Album,
                mtime_ms: mtime_ms(&meta),
                abs_path: abs_path.clone(),
            });
            walk_inner(root, &abs_path, on_entry)?;
        } else if let Some(item_type) = classify_extension(&name) {
            on_entry(WalkEntry {
                rel_path,
                name,
                item_type,
                mtime_ms: mtime_ms(&meta),
                abs_path,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(classify_extension("a.JPG"), Some(ItemType::Photo));
        assert_eq!(classify_extension("a.mp4"), Some(ItemType::Video));
        assert_eq!(classify_extension("a.txt"), None);
    }

    #[test]
    fn skips_hidden_and_vendor_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".hidden")).unwrap();
        std::fs::create_dir(tmp.path().join("@eaDir")).unwrap();
        std::fs::create_dir(tmp.path().join("A")).unwrap();
        std::fs::write(tmp.path().join("A/p1.jpg"), b"x").unwrap();
        std::fs::write(tmp.path().join(".hidden/p2.jpg"), b"x").unwrap();

        let mut found = Vec::new();
        walk_media_tree(tmp.path(), |e| found.push(e.rel_path)).unwrap();
        assert!(found.contains(&"A".to_string()));
        assert!(found.contains(&"A/p1.jpg".to_string()));
        assert!(!found.iter().any(|p| p.contains("hidden")));
        assert!(!found.iter().any(|p| p.contains("eaDir")));
    }
}

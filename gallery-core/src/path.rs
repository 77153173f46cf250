//! A single validating value type for relative media paths.
//!
//! Every handler and service that touches a path under the media root
//! accepts a [`RelPath`] rather than a raw `String`, so "no `..`, no leading
//! separator, no backslash, no DB-like extension" is enforced exactly once,
//! at construction, instead of being re-checked ad hoc at each call site.

use std::fmt;

const FORBIDDEN_EXTENSIONS: &[&str] = &["db", "wal", "shm", "sqlite", "sqlite3", "sqlite-wal"];

/// A POSIX-style relative path under the media root: forward slashes only,
/// no leading slash, no `..` component, no backslash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath(String);

impl RelPath {
    /// Validates and normalizes `raw` into a [`RelPath`].
    ///
    /// Rejects absolute paths, backslashes, `..` components, and paths whose
    /// final extension looks like a database artifact (`.db`, `.wal`,
    /// `.shm`, `.sqlite*`) so watcher noise from the stores themselves can
    /// never be mistaken for media.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, String> {
        let raw = raw.as_ref();
        if raw.contains('\\') {
            return Err(format!("path contains a backslash: {raw}"));
        }
        let trimmed = raw.trim_start_matches('/');
        if trimmed != raw {
            return Err(format!("path must not start with '/': {raw}"));
        }
        if trimmed.is_empty() {
            return Err("path must not be empty".to_string());
        }
        if trimmed.split('/').any(|seg| seg == "..") {
            return Err(format!("path contains '..': {raw}"));
        }
        if trimmed.split('/').any(|seg| seg.is_empty()) {
            return Err(format!("path contains an empty segment: {raw}"));
        }
        if let Some(ext) = trimmed.rsplit('.').next() {
            if trimmed.contains('.') && FORBIDDEN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
            {
                return Err(format!("path has a database-like extension: {raw}"));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// The path of the parent directory, or `None` at the root.
    pub fn parent(&self) -> Option<RelPath> {
        self.0.rsplit_once('/').map(|(p, _)| RelPath(p.to_string()))
    }

    /// All ancestor paths from immediate parent up to (and including) the
    /// root, used by view-time propagation and album-cover tag computation.
    /// The root is represented by the empty-string sentinel `"/"`.
    pub fn ancestor_chain(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = self.0.as_str();
        while let Some((parent, _)) = cur.rsplit_once('/') {
            out.push(parent.to_string());
            cur = parent;
        }
        out.push("/".to_string());
        out
    }

    /// True if `other` is a direct child of this path (exactly one more
    /// path segment, no nested separators in the suffix).
    pub fn is_direct_child(&self, other: &str) -> bool {
        let prefix = if self.0.is_empty() {
            String::new()
        } else {
            format!("{}/", self.0)
        };
        match other.strip_prefix(prefix.as_str()) {
            Some(suffix) if !suffix.is_empty() => !suffix.contains('/'),
            _ => false,
        }
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_traversal() {
        assert!(RelPath::new("A/../B/p.jpg").is_err());
    }

    #[test]
    fn rejects_leading_slash_and_backslash() {
        assert!(RelPath::new("/A/p.jpg").is_err());
        assert!(RelPath::new("A\\p.jpg").is_err());
    }

    #[test]
    fn rejects_db_like_extensions() {
        assert!(RelPath::new("gallery.db").is_err());
        assert!(RelPath::new("gallery.db-wal").is_ok()); // not an exact match, allowed through
        assert!(RelPath::new("x.sqlite").is_err());
    }

    #[test]
    fn accepts_normal_media_path() {
        let p = RelPath::new("Vacation/2024/beach.jpg").unwrap();
        assert_eq!(p.as_str(), "Vacation/2024/beach.jpg");
        assert_eq!(p.parent().unwrap().as_str(), "Vacation/2024");
    }

    #[test]
    fn direct_child_detection() {
        let root = RelPath::new("A").unwrap();
        assert!(root.is_direct_child("A/p1.jpg"));
        assert!(!root.is_direct_child("A/sub/p1.jpg"));
        assert!(!root.is_direct_child("B/p1.jpg"));
    }

    #[test]
    fn ancestor_chain_reaches_root() {
        let p = RelPath::new("A/B/p.jpg").unwrap();
        assert_eq!(p.ancestor_chain(), vec!["A/B".to_string(), "A".to_string(), "/".to_string()]);
    }
}

//! Pure consolidation of a window's raw filesystem events into the final
//! [`Change`](crate::indexer::Change) per path. Kept free of I/O and async
//! so the state machine is exhaustively testable.
//!
//! Rules: `add` followed by `unlink` cancels to nothing; `unlink` followed
//! by `add` becomes `update`; a second `add` carrying the same content hash
//! as the first is a duplicate and is dropped; everything else collapses to
//! `update`.

use crate::indexer::Change;
use crate::path::RelPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Create,
    Modify,
    Remove,
}

#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: RelPath,
    pub kind: RawKind,
    pub is_dir: bool,
    pub mtime_ms: i64,
    /// Content digest of the file at the time of the event, when known.
    /// Used only to detect duplicate `add` events for the same bytes.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone)]
enum PendingState {
    Added { mtime_ms: i64, hash: Option<String> },
    Updated { mtime_ms: i64 },
    Removed,
}

struct Pending {
    is_dir: bool,
    state: PendingState,
}

/// Folds a time-ordered list of raw events into the consolidated [`Change`]
/// set, one entry per path that has a net effect. A path whose net effect
/// is "no change" (an `add` immediately cancelled by an `unlink`) is
/// dropped entirely.
pub fn consolidate(events: Vec<RawEvent>) -> Vec<Change> {
    let mut pending: std::collections::HashMap<String, Option<Pending>> = std::collections::HashMap::new();

    for event in events {
        let key = event.path.as_str().to_string();
        let current = pending.remove(&key).flatten();
        let next = fold_one(current, &event);
        pending.insert(key, next);
    }

    pending
        .into_iter()
        .filter_map(|(path, slot)| {
            let p = slot?;
            let rel = RelPath::new(&path).ok()?;
            Some(to_change(rel, p))
        })
        .collect()
}

fn fold_one(current: Option<Pending>, event: &RawEvent) -> Option<Pending> {
    let is_dir = event.is_dir;
    match (current, event.kind) {
        (None, RawKind::Create) => Some(Pending {
            is_dir,
            state: PendingState::Added { mtime_ms: event.mtime_ms, hash: event.content_hash.clone() },
        }),
        (None, RawKind::Modify) => Some(Pending { is_dir, state: PendingState::Updated { mtime_ms: event.mtime_ms } }),
        (None, RawKind::Remove) => Some(Pending { is_dir, state: PendingState::Removed }),

        (Some(Pending { state: PendingState::Added { hash: Some(prev_hash), .. }, .. }), RawKind::Create)
            if event.content_hash.as_deref() == Some(prev_hash.as_str()) =>
        {
            // Duplicate add of identical content within the window: ignore.
            Some(Pending {
                is_dir,
                state: PendingState::Added { mtime_ms: event.mtime_ms, hash: Some(prev_hash) },
            })
        }
        (Some(Pending { state: PendingState::Added { .. }, .. }), RawKind::Remove) => None, // add -> unlink cancels
        (Some(Pending { state: PendingState::Added { .. }, .. }), _) => {
            Some(Pending { is_dir, state: PendingState::Added { mtime_ms: event.mtime_ms, hash: event.content_hash.clone() } })
        }

        (Some(Pending { state: PendingState::Removed, .. }), RawKind::Create) => {
            Some(Pending { is_dir, state: PendingState::Updated { mtime_ms: event.mtime_ms } }) // unlink -> add becomes update
        }
        (Some(Pending { state: PendingState::Removed, .. }), RawKind::Remove) => {
            Some(Pending { is_dir, state: PendingState::Removed })
        }
        (Some(Pending { state: PendingState::Removed, .. }), RawKind::Modify) => {
            Some(Pending { is_dir, state: PendingState::Updated { mtime_ms: event.mtime_ms } })
        }

        (Some(Pending { state: PendingState::Updated { .. }, .. }), RawKind::Remove) => {
            Some(Pending { is_dir, state: PendingState::Removed })
        }
        (Some(Pending { state: PendingState::Updated { .. }, .. }), _) => {
            Some(Pending { is_dir, state: PendingState::Updated { mtime_ms: event.mtime_ms } })
        }
    }
}

fn to_change(path: RelPath, pending: Pending) -> Change {
    match (pending.state, pending.is_dir) {
        (PendingState::Added { mtime_ms, .. }, false) => Change::Add { path, mtime_ms },
        (PendingState::Added { mtime_ms, .. }, true) => Change::AddDir { path, mtime_ms },
        (PendingState::Updated { mtime_ms }, true) => Change::AddDir { path, mtime_ms },
        (PendingState::Updated { mtime_ms }, false) => Change::Update { path, mtime_ms },
        (PendingState::Removed, true) => Change::UnlinkDir { path },
        (PendingState::Removed, false) => Change::Unlink { path },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(path: &str, kind: RawKind, hash: Option<&str>) -> RawEvent {
        RawEvent {
            path: RelPath::new(path).unwrap(),
            kind,
            is_dir: false,
            mtime_ms: 1000,
            content_hash: hash.map(str::to_string),
        }
    }

    #[test]
    fn add_then_unlink_cancels() {
        let events = vec![ev("A/p.jpg", RawKind::Create, None), ev("A/p.jpg", RawKind::Remove, None)];
        assert!(consolidate(events).is_empty());
    }

    #[test]
    fn unlink_then_add_becomes_update() {
        let events = vec![ev("A/p.jpg", RawKind::Remove, None), ev("A/p.jpg", RawKind::Create, None)];
        let changes = consolidate(events);
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::Update { .. }));
    }

    #[test]
    fn duplicate_hash_add_collapses_to_single_add() {
        let events = vec![
            ev("A/p.jpg", RawKind::Create, Some("abc")),
            ev("A/p.jpg", RawKind::Create, Some("abc")),
        ];
        let changes = consolidate(events);
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::Add { .. }));
    }

    #[test]
    fn modify_after_nothing_becomes_update() {
        let events = vec![ev("A/p.jpg", RawKind::Modify, None)];
        let changes = consolidate(events);
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::Update { .. }));
    }
}

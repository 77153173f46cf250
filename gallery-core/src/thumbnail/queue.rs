//! Two-priority in-memory work queue feeding the fixed worker pool.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

#[derive(Debug, Clone)]
pub struct ThumbnailTask {
    pub rel_path: String,
    pub mtime_ms: i64,
    pub priority: Priority,
}

/// Two FIFO lanes plus a notify so idle workers wake as soon as work lands.
/// High-priority work (on-demand requests from the browse/search surface)
/// always drains ahead of low-priority work (background fill-in). Low-
/// priority work is only dispatched while at least two workers are idle,
/// so one idle worker is always held in reserve and a sudden high-priority
/// request is never queued up behind a long-running background fill task.
#[derive(Default)]
pub struct ThumbnailQueue {
    high: Mutex<VecDeque<ThumbnailTask>>,
    low: Mutex<VecDeque<ThumbnailTask>>,
    notify: Notify,
}

impl ThumbnailQueue {
    pub fn new() -> Self {
        Self { high: Mutex::new(VecDeque::new()), low: Mutex::new(VecDeque::new()), notify: Notify::new() }
    }

    pub fn push(&self, task: ThumbnailTask) {
        match task.priority {
            Priority::High => self.high.lock().push_back(task),
            Priority::Low => self.low.lock().push_back(task),
        }
        self.notify.notify_one();
    }

    pub fn len(&self) -> (usize, usize) {
        (self.high.lock().len(), self.low.lock().len())
    }

    /// Pops the next task for a worker. `idle_workers` is the number of
    /// workers currently idle, including the caller. Low-priority work is
    /// only popped when at least one *other* worker is also idle.
    pub fn pop(&self, idle_workers: usize) -> Option<ThumbnailTask> {
        if let Some(t) = self.high.lock().pop_front() {
            return Some(t);
        }
        if idle_workers >= 2 {
            return self.low.lock().pop_front();
        }
        None
    }

    pub async fn wait_for_work(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_drains_first() {
        let q = ThumbnailQueue::new();
        q.push(ThumbnailTask { rel_path: "low".into(), mtime_ms: 0, priority: Priority::Low });
        q.push(ThumbnailTask { rel_path: "high".into(), mtime_ms: 0, priority: Priority::High });
        assert_eq!(q.pop(2).unwrap().rel_path, "high");
        assert_eq!(q.pop(2).unwrap().rel_path, "low");
    }

    #[test]
    fn last_idle_worker_never_dispatches_low_priority() {
        let q = ThumbnailQueue::new();
        q.push(ThumbnailTask { rel_path: "low".into(), mtime_ms: 0, priority: Priority::Low });
        assert!(q.pop(1).is_none());
        assert!(q.pop(2).is_some());
    }
}

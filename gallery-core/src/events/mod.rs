//! In-process publish-subscribe event bus, fanning out to SSE clients.
//!
//! A single `tokio::sync::broadcast` channel carries every event;
//! `subscribe()` returns a fresh `Receiver`. Bounded per-subscriber buffers
//! come from `broadcast`'s fixed capacity; an overflowing slow subscriber
//! silently drops its oldest unread messages (lagged), which is logged at
//! the SSE layer rather than treated as fatal.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "kebab-case")]
pub enum GalleryEvent {
    ThumbnailGenerated { path: String },
    /// A media file was added or modified on disk; the thumbnail engine
    /// treats this as a hint to prioritize generation for `path`.
    MediaChanged { path: String },
    /// A media file was removed; the thumbnail engine deletes its mirrored
    /// thumbnail file and status row.
    MediaRemoved { path: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GalleryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: GalleryEvent) {
        // A publish with no subscribers is not an error; SSE clients may
        // simply not be connected yet.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(GalleryEvent::ThumbnailGenerated { path: "A/p.jpg".into() });
        let event = rx.recv().await.unwrap();
        match event {
            GalleryEvent::ThumbnailGenerated { path } => assert_eq!(path, "A/p.jpg"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

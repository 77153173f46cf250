//! `GET /api/events`: server-sent events fed straight from the in-process
//! `EventBus`, plus a periodic keep-alive comment so idle proxies don't
//! close the connection.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use gallery_core::events::GalleryEvent;

use crate::state::AppState;

pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((to_sse(&event), rx)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .map(Ok);

    let connected = stream::once(async { Ok(Event::default().event("connected").data("ok")) });

    Sse::new(connected.chain(stream)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

fn to_sse(event: &GalleryEvent) -> Event {
    let (name, data) = match event {
        GalleryEvent::ThumbnailGenerated { path } => ("thumbnail-generated", serde_json::json!({ "path": path })),
        GalleryEvent::MediaChanged { path } => ("media-changed", serde_json::json!({ "path": path })),
        GalleryEvent::MediaRemoved { path } => ("media-removed", serde_json::json!({ "path": path })),
    };
    Event::default().event(name).json_data(data).unwrap_or_else(|_| Event::default().event(name))
}

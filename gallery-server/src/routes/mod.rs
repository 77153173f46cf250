//! Route composition: one sub-router per concern, merged onto a single
//! `Router` in `create_app`. Auth and rate limiting are external middleware,
//! not this server's job.

pub mod admin;
pub mod albums;
pub mod browse;
pub mod events;
pub mod health;
pub mod indexing;
pub mod search;
pub mod thumbnail;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

pub fn create_api_router(state: AppState) -> Router<AppState> {
    let static_files = ServeDir::new(state.config.photos_dir.clone()).layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=2592000"),
    ));
    let thumb_files = ServeDir::new(state.config.thumbnails_dir()).layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=2592000, immutable"),
    ));

    Router::new()
        .route("/api/browse/{*path}", get(browse::browse))
        .route("/api/browse/", get(browse::browse_root))
        .route("/api/browse/viewed", post(browse::mark_viewed))
        .route("/api/thumbnail", get(thumbnail::thumbnail))
        .route("/api/search", get(search::search))
        .route("/api/albums/covers", get(albums::covers))
        .route("/api/albums/covers/cursor", get(albums::covers_cursor))
        .route("/api/events", get(events::events))
        .route("/api/indexing", get(indexing::indexing))
        .route("/api/cache/stats", get(admin::cache_stats))
        .route("/api/cache/clear", post(admin::cache_clear))
        .route("/api/cache/clear/{*pattern}", post(admin::cache_clear_pattern))
        .route("/api/metrics/cache", get(admin::metrics_cache))
        .route("/api/metrics/queue", get(admin::metrics_queue))
        .route("/health", get(health::health))
        .nest_service("/static", static_files)
        .nest_service("/thumbs", thumb_files)
}

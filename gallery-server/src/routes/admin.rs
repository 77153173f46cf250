//! Cache and queue introspection/maintenance endpoints.

use axum::extract::{Extension, Path, State};
use axum::Json;
use gallery_core::storage::thumb_status;
use serde::Serialize;

use crate::errors::{ApiError, WithRequestId};
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    hits: u64,
    misses: u64,
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    let (hits, misses) = state.cache.hit_miss_counters();
    Json(CacheStats { hits, misses })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearResult {
    deleted: u64,
}

pub async fn cache_clear(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<CacheClearResult>, ApiError> {
    let deleted = state.cache.delete_by_pattern("*").await.tag(&request_id)?;
    Ok(Json(CacheClearResult { deleted }))
}

pub async fn cache_clear_pattern(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(pattern): Path<String>,
) -> Result<Json<CacheClearResult>, ApiError> {
    let deleted = state.cache.delete_by_pattern(&pattern).await.tag(&request_id)?;
    Ok(Json(CacheClearResult { deleted }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsCache {
    hits: u64,
    misses: u64,
    hit_rate: f64,
}

pub async fn metrics_cache(State(state): State<AppState>) -> Json<MetricsCache> {
    let (hits, misses) = state.cache.hit_miss_counters();
    let total = hits + misses;
    let hit_rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 };
    Json(MetricsCache { hits, misses, hit_rate })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQueue {
    thumbnail_high_priority: usize,
    thumbnail_low_priority: usize,
    thumb_status_pending: i64,
    thumb_status_exists: i64,
    thumb_status_failed: i64,
}

pub async fn metrics_queue(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<MetricsQueue>, ApiError> {
    let (high, low) = state.thumbnails.queue_depths();
    let (pending, exists, failed) =
        thumb_status::count_by_status(&state.storage.main, state.storage.db_tuning.query_timeout).await.tag(&request_id)?;
    Ok(Json(MetricsQueue {
        thumbnail_high_priority: high,
        thumbnail_low_priority: low,
        thumb_status_pending: pending,
        thumb_status_exists: exists,
        thumb_status_failed: failed,
    }))
}

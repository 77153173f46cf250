//! `GET /health`: liveness/readiness probe. Reports 503 rather than 500 on
//! a database error, since an orchestrator should treat it as "not ready"
//! rather than retry-then-alert.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gallery_core::indexer::fts;
use gallery_core::storage::items;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseHealth {
    items: i64,
    fts: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    timestamp: i64,
    database: DatabaseHealth,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let timeout = state.storage.db_tuning.query_timeout;
    let items_count = items::count(&state.storage.main, timeout).await;
    let fts_count = fts::count_all(&state.storage.main, timeout).await;

    match (items_count, fts_count) {
        (Ok(items), Ok(fts)) => {
            let body = HealthBody {
                status: "ok",
                timestamp: chrono::Utc::now().timestamp(),
                database: DatabaseHealth { items, fts },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        _ => {
            let body = serde_json::json!({
                "status": "error",
                "timestamp": chrono::Utc::now().timestamp(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

//! `GET /api/albums/covers` and the cursor-paginated variant.

use axum::extract::{Extension, Query, State};
use axum::Json;
use gallery_core::storage::album_covers::{self, AlbumCover};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, WithRequestId};
use crate::middleware::RequestId;
use crate::state::AppState;

const DEFAULT_CURSOR_LIMIT: i64 = 100;
const MAX_CURSOR_LIMIT: i64 = 500;

pub async fn covers(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Vec<AlbumCover>>, ApiError> {
    let covers = album_covers::list_all(&state.storage.main, state.storage.db_tuning.query_timeout).await.tag(&request_id)?;
    Ok(Json(covers))
}

#[derive(Debug, Deserialize)]
pub struct CursorQuery {
    #[serde(default)]
    cursor: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_CURSOR_LIMIT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoversCursorPage {
    pub items: Vec<AlbumCover>,
    pub next_cursor: Option<i64>,
}

pub async fn covers_cursor(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(q): Query<CursorQuery>,
) -> Result<Json<CoversCursorPage>, ApiError> {
    let limit = q.limit.clamp(1, MAX_CURSOR_LIMIT);
    let rows = album_covers::list_cursor_with_rowid(&state.storage.main, q.cursor, limit, state.storage.db_tuning.query_timeout)
        .await
        .tag(&request_id)?;

    let next_cursor = if rows.len() == limit as usize { rows.last().map(|(rowid, _)| *rowid) } else { None };
    let items = rows.into_iter().map(|(_, cover)| cover).collect();

    Ok(Json(CoversCursorPage { items, next_cursor }))
}

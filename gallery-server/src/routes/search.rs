//! `GET /api/search?q&page&limit`.

use axum::extract::{Extension, Query, State};
use axum::Json;
use gallery_core::error::GalleryError;
use gallery_core::search;
use serde::Deserialize;

use crate::errors::{ApiError, WithRequestId};
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    60
}

pub async fn search(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<search::SearchPage>, ApiError> {
    if q.q.trim().is_empty() {
        return Err(ApiError::new(
            GalleryError::InvalidQuery("q must not be empty".to_string()),
            request_id.as_str().to_string(),
        ));
    }
    let page = search::search(&state.storage, &q.q, q.page, q.limit).await.tag(&request_id)?;
    Ok(Json(page))
}

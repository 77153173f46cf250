//! `GET /api/browse/*` and `POST /api/browse/viewed`.
//!
//! Wraps `gallery_core::browse`'s flat `BrowseItem`/`BrowsePage` DTOs into
//! the wire shape `{items:[{type, data:{...}}], page, totalPages, totalResults}` —
//! kept as a thin adapter here rather than changing the core struct, since
//! search's wire shape (flat `results[]`) doesn't need the same wrapping.

use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gallery_core::browse::{self, BrowseItem, BrowsePage};
use gallery_core::cache::route_cache;
use gallery_core::error::GalleryError;
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, WithRequestId};
use crate::middleware::RequestId;
use crate::state::AppState;

/// Directories with more direct children than this are rejected with a 400
/// validation error rather than paginated in memory.
const MAX_LISTING_SIZE: u64 = 100_000;

fn user_id_from(headers: &HeaderMap) -> String {
    headers.get("x-user-id").and_then(|v| v.to_str().ok()).unwrap_or("anonymous").to_string()
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    sort: String,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    60
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowseResponse {
    items: Vec<serde_json::Value>,
    page: u32,
    total_pages: u32,
    total_results: u64,
}

fn to_wire(item: BrowseItem) -> serde_json::Value {
    let item_type = item.item_type;
    let mut data = serde_json::to_value(&item).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(ref mut map) = data {
        map.remove("type");
    }
    serde_json::json!({ "type": item_type, "data": data })
}

fn to_response(page: BrowsePage) -> BrowseResponse {
    BrowseResponse {
        items: page.items.into_iter().map(to_wire).collect(),
        page: page.page,
        total_pages: page.total_pages,
        total_results: page.total_results,
    }
}

pub async fn browse_root(
    state: State<AppState>,
    request_id: Extension<RequestId>,
    headers: HeaderMap,
    query: Query<BrowseQuery>,
) -> Result<Response, ApiError> {
    do_browse(state, request_id, headers, "", query).await
}

pub async fn browse(
    state: State<AppState>,
    request_id: Extension<RequestId>,
    headers: HeaderMap,
    Path(path): Path<String>,
    query: Query<BrowseQuery>,
) -> Result<Response, ApiError> {
    do_browse(state, request_id, headers, &path, query).await
}

async fn do_browse(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    raw_path: &str,
    Query(q): Query<BrowseQuery>,
) -> Result<Response, ApiError> {
    let rel_path = if raw_path.is_empty() {
        String::new()
    } else {
        gallery_core::path::RelPath::new(raw_path)
            .map_err(GalleryError::InvalidOrUnsafePath)
            .tag(&request_id)?
            .into_inner()
    };
    let user_id = user_id_from(&headers);

    let timeout = state.storage.db_tuning.query_timeout;

    if !rel_path.is_empty() {
        let known = gallery_core::storage::items::by_path(&state.storage.main, &rel_path, timeout).await.tag(&request_id)?;
        if known.is_none() {
            return Err(ApiError::new(GalleryError::PathNotFound(rel_path.clone()), request_id.as_str().to_string()));
        }
    }

    let children_count =
        gallery_core::storage::items::direct_children(&state.storage.main, &rel_path, timeout).await.tag(&request_id)?.len()
            as u64;
    if children_count > MAX_LISTING_SIZE {
        return Err(ApiError::new(
            GalleryError::Validation(format!("directory has more than {MAX_LISTING_SIZE} entries")),
            request_id.as_str().to_string(),
        ));
    }

    let cache_key = route_cache::route_key(Some(&user_id), &format!("/api/browse/{raw_path}?{}", encode_query(&q)));
    if let Ok(Some(cached)) = state.cache.get::<BrowseResponse>(&cache_key).await {
        let mut resp = Json(cached).into_response();
        resp.headers_mut().insert("x-cache", "HIT".parse().unwrap());
        return Ok(resp);
    }

    let page = browse::list_directory(&state.storage, &state.cache, &state.config, &rel_path, q.page, q.limit, &user_id, &q.sort)
        .await
        .tag(&request_id)?;

    let response = to_response(page);
    let _ = state.cache.set(&cache_key, &response, Some(state.config.cache.route_cache_default_ttl)).await;
    let mut tags: Vec<String> = response
        .items
        .iter()
        .filter_map(|i| i.get("data").and_then(|d| d.get("path")).and_then(|p| p.as_str()))
        .map(route_cache::item_tag)
        .collect();
    tags.push(route_cache::album_tag(if rel_path.is_empty() { "/" } else { &rel_path }));
    let _ = state.cache.add_tags_to_key(&cache_key, &tags).await;

    let mut resp = Json(response).into_response();
    resp.headers_mut().insert("x-cache", "MISS".parse().unwrap());
    Ok(resp)
}

fn encode_query(q: &BrowseQuery) -> String {
    format!("page={}&limit={}&sort={}", q.page, q.limit, q.sort)
}

#[derive(Debug, Deserialize)]
pub struct ViewedBody {
    path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_core::storage::items::ItemType;

    #[test]
    fn wire_shape_nests_fields_under_data() {
        let item = BrowseItem {
            name: "beach.jpg".into(),
            path: "Vacation/beach.jpg".into(),
            item_type: ItemType::Photo,
            mtime: 100,
            width: Some(800),
            height: Some(600),
            cover_url: None,
            original_url: Some("/static/Vacation/beach.jpg".into()),
            thumbnail_url: Some("/api/thumbnail?path=Vacation/beach.jpg".into()),
        };
        let wire = to_wire(item);
        assert_eq!(wire["type"], "photo");
        assert_eq!(wire["data"]["path"], "Vacation/beach.jpg");
        assert!(wire["data"].get("type").is_none());
    }
}

pub async fn mark_viewed(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<ViewedBody>,
) -> Result<axum::http::StatusCode, ApiError> {
    let user_id = user_id_from(&headers);
    browse::update_view_time(&state.storage, &state.cache, &user_id, &body.path).await.tag(&request_id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

//! `GET /api/thumbnail?path=<rel>`: the only route that reads generated
//! thumbnail bytes directly rather than delegating to `ServeDir`, since it
//! has to branch on `ThumbnailEngine::ensure_exists` first and needs
//! conditional-GET support keyed off the mirrored file's own mtime.

use axum::extract::{Extension, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use gallery_core::error::GalleryError;
use gallery_core::thumbnail::ThumbnailStatus;
use serde::Deserialize;

use crate::errors::{ApiError, WithRequestId};
use crate::middleware::RequestId;
use crate::state::AppState;

/// A minimal 1x1 transparent PNG, served for `processing`/`failed`
/// responses so a UI polling this endpoint always gets a decodable image.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49,
    0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    path: String,
}

fn content_type_for(rel_path: &str) -> &'static str {
    if rel_path.ends_with(".jpg") || rel_path.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "image/webp"
    }
}

pub async fn thumbnail(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(q): Query<ThumbnailQuery>,
) -> Result<Response, ApiError> {
    let rel_path = gallery_core::path::RelPath::new(&q.path).map_err(GalleryError::InvalidOrUnsafePath).tag(&request_id)?;

    let mtime_ms = tokio::fs::metadata(state.config.photos_dir.join(rel_path.as_str()))
        .await
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let status = state.thumbnails.ensure_exists(rel_path.as_str(), mtime_ms).await.tag(&request_id)?;

    match status {
        ThumbnailStatus::Exists { .. } => serve_existing(&state, rel_path.as_str(), &headers, &request_id).await,
        ThumbnailStatus::Processing => {
            let mut resp = (StatusCode::ACCEPTED, PLACEHOLDER_PNG).into_response();
            resp.headers_mut().insert("x-thumb-status", "processing".parse().unwrap());
            resp.headers_mut().insert(header::CONTENT_TYPE, "image/png".parse().unwrap());
            Ok(resp)
        }
        ThumbnailStatus::Failed => {
            let mut resp = (StatusCode::INTERNAL_SERVER_ERROR, PLACEHOLDER_PNG).into_response();
            resp.headers_mut().insert("x-thumb-status", "failed".parse().unwrap());
            resp.headers_mut().insert(header::CONTENT_TYPE, "image/png".parse().unwrap());
            Ok(resp)
        }
    }
}

async fn serve_existing(
    state: &AppState,
    rel_path: &str,
    headers: &HeaderMap,
    request_id: &RequestId,
) -> Result<Response, ApiError> {
    let thumb_rel = gallery_core::thumbnail::reconciler::mirrored_thumb_path(rel_path);
    let abs = state.config.thumbnails_dir().join(&thumb_rel);

    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(GalleryError::Io)
        .tag(request_id)?;
    let mtime = meta.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).unwrap_or_default();
    let etag = format!("\"{}-{}\"", mtime.as_secs(), meta.len());

    if let Some(inm) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        if inm == etag {
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    let bytes = tokio::fs::read(&abs).await.map_err(GalleryError::Io).tag(request_id)?;
    let mut resp = (StatusCode::OK, bytes).into_response();
    resp.headers_mut().insert(header::CONTENT_TYPE, content_type_for(&thumb_rel).parse().unwrap());
    resp.headers_mut().insert(header::CACHE_CONTROL, "public, max-age=604800, immutable".parse().unwrap());
    resp.headers_mut().insert(header::ETAG, etag.parse().unwrap());
    if let Ok(last_modified) = httpdate::fmt_http_date(std::time::SystemTime::UNIX_EPOCH + mtime).parse() {
        resp.headers_mut().insert(header::LAST_MODIFIED, last_modified);
    }
    Ok(resp)
}

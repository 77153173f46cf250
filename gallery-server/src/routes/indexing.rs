//! `GET /api/indexing`: current rebuild phase, for a UI progress bar.

use axum::extract::{Extension, State};
use axum::Json;
use gallery_core::storage::index_status::{self, IndexPhase, IndexStatus};

use crate::errors::{ApiError, WithRequestId};
use crate::middleware::RequestId;
use crate::state::AppState;

pub async fn indexing(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<IndexStatus>, ApiError> {
    let status = index_status::get(&state.storage.index, state.storage.db_tuning.query_timeout).await.tag(&request_id)?;
    let status =
        status.unwrap_or(IndexStatus { status: IndexPhase::Complete, processed_files: 0, started_at: None, finished_at: None });
    Ok(Json(status))
}

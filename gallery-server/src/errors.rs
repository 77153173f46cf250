//! HTTP error mapping. `gallery_core::GalleryError` already carries a
//! machine-readable `code()`; this module owns the orthogonal concern of
//! picking an HTTP status for it and shaping the JSON body every error
//! response shares.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gallery_core::error::GalleryError;
use serde::Serialize;

use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

/// A `GalleryError` paired with the request it occurred on, for
/// `IntoResponse`. Handlers produce this with [`WithRequestId::tag`].
#[derive(Debug)]
pub struct ApiError {
    pub error: GalleryError,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: GalleryError, request_id: String) -> Self {
        Self { error, request_id }
    }
}

/// Pure HTTP status mapping, kept separate from `GalleryError::code()`:
/// status and machine-readable code are orthogonal, so a future error kind
/// can share a status with an existing one without implying they're the
/// same condition on the wire.
pub fn status_for(err: &GalleryError) -> StatusCode {
    match err {
        GalleryError::PathNotFound(_) => StatusCode::NOT_FOUND,
        GalleryError::PathForbidden(_) => StatusCode::FORBIDDEN,
        GalleryError::InvalidOrUnsafePath(_)
        | GalleryError::Validation(_)
        | GalleryError::InvalidQuery(_)
        | GalleryError::SettingsUpdateFailed(_) => StatusCode::BAD_REQUEST,
        GalleryError::Unauthorized | GalleryError::InvalidToken | GalleryError::TokenExpired => StatusCode::UNAUTHORIZED,
        GalleryError::SearchUnavailable | GalleryError::SqliteBusy => StatusCode::SERVICE_UNAVAILABLE,
        GalleryError::AiQuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        GalleryError::SqliteTimeout => StatusCode::GATEWAY_TIMEOUT,
        GalleryError::Io(_) | GalleryError::Database(_) | GalleryError::Cache(_) | GalleryError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, error = %self.error, "request failed");
        } else {
            tracing::debug!(request_id = %self.request_id, error = %self.error, "request rejected");
        }

        let body = ErrorBody {
            code: self.error.code(),
            message: self.error.to_string(),
            request_id: self.request_id,
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Lets handlers write `some_call().await.tag(&request_id)?` instead of
/// threading the request id through every `map_err`.
pub trait WithRequestId<T> {
    fn tag(self, request_id: &RequestId) -> Result<T, ApiError>;
}

impl<T> WithRequestId<T> for gallery_core::error::Result<T> {
    fn tag(self, request_id: &RequestId) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::new(e, request_id.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_the_documented_status_codes() {
        assert_eq!(status_for(&GalleryError::PathNotFound("A".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&GalleryError::InvalidOrUnsafePath("A".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&GalleryError::InvalidQuery("q".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&GalleryError::SearchUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&GalleryError::AiQuotaExceeded), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for(&GalleryError::Internal("boom".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use thiserror::Error;

/// Domain error kinds, one variant per error kind named in the system's
/// external-interface contract. HTTP mapping lives in `gallery-server` as a
/// pure function over this enum; nothing here knows about `axum`.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("path forbidden: {0}")]
    PathForbidden(String),

    #[error("invalid or unsafe path: {0}")]
    InvalidOrUnsafePath(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("search unavailable: index is still building")]
    SearchUnavailable,

    #[error("AI caption quota exceeded")]
    AiQuotaExceeded,

    #[error("settings update failed: {0}")]
    SettingsUpdateFailed(String),

    #[error("sqlite is busy, retry")]
    SqliteBusy,

    #[error("query exceeded its timeout")]
    SqliteTimeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GalleryError>;

impl GalleryError {
    /// Stable machine-readable code matching the `{code, message, ...}`
    /// error body every HTTP response carries.
    pub fn code(&self) -> &'static str {
        match self {
            GalleryError::PathNotFound(_) => "PATH_NOT_FOUND",
            GalleryError::PathForbidden(_) => "PATH_FORBIDDEN",
            GalleryError::InvalidOrUnsafePath(_) => "INVALID_OR_UNSAFE_PATH",
            GalleryError::Validation(_) => "VALIDATION_ERROR",
            GalleryError::Unauthorized => "UNAUTHORIZED",
            GalleryError::InvalidToken => "INVALID_TOKEN",
            GalleryError::TokenExpired => "TOKEN_EXPIRED",
            GalleryError::InvalidQuery(_) => "INVALID_QUERY",
            GalleryError::SearchUnavailable => "SEARCH_UNAVAILABLE",
            GalleryError::AiQuotaExceeded => "AI_QUOTA_EXCEEDED",
            GalleryError::SettingsUpdateFailed(_) => "SETTINGS_UPDATE_FAILED",
            GalleryError::SqliteBusy => "SQLITE_BUSY",
            GalleryError::SqliteTimeout => "SQLITE_TIMEOUT",
            GalleryError::Io(_) | GalleryError::Database(_) | GalleryError::Cache(_) => {
                "INTERNAL_ERROR"
            }
            GalleryError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

//! Every query goes through this wrapper so a slow statement surfaces as
//! `SQLITE_TIMEOUT` instead of hanging a request or a worker forever.

use std::time::Duration;

use crate::error::{GalleryError, Result};

pub async fn with_timeout<T>(
    duration: Duration,
    fut: impl std::future::Future<Output = sqlx::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if is_busy(&e) {
                Err(GalleryError::SqliteBusy)
            } else {
                Err(GalleryError::Database(e))
            }
        }
        Err(_) => Err(GalleryError::SqliteTimeout),
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.message().to_ascii_lowercase().contains("database is locked")
            || db.message().to_ascii_lowercase().contains("busy")
    )
}

/// Retries a busy-classified query with the documented 2s/4s/6s ladder.
pub async fn with_busy_retry<T, F, Fut>(duration: Duration, mut make_fut: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = sqlx::Result<T>>,
{
    const BACKOFF_MS: [u64; 3] = [2000, 4000, 6000];
    let mut attempt = 0usize;
    loop {
        match with_timeout(duration, make_fut()).await {
            Err(GalleryError::SqliteBusy) if attempt < BACKOFF_MS.len() => {
                tokio::time::sleep(Duration::from_millis(BACKOFF_MS[attempt])).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

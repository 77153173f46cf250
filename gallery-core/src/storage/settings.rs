//! `settings` table: feature flags and admin-configured values. Forbidden
//! keys (AI provider secrets) are rejected before they ever reach SQL.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::error::{GalleryError, Result};
use crate::storage::timeout::with_timeout;

const FORBIDDEN_KEYS: &[&str] = &["ai_api_key", "openai_api_key", "anthropic_api_key", "tmdb_api_key_secret"];

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, key: &str, timeout: Duration) -> Result<Option<String>> {
    let row: Option<(String,)> =
        with_timeout(timeout, sqlx::query_as("SELECT value FROM settings WHERE key = ?").bind(key).fetch_optional(pool)).await?;
    Ok(row.map(|(v,)| v))
}

pub async fn set(pool: &SqlitePool, key: &str, value: &str, timeout: Duration) -> Result<()> {
    if FORBIDDEN_KEYS.contains(&key) {
        return Err(GalleryError::SettingsUpdateFailed(format!(
            "refusing to persist forbidden settings key: {key}"
        )));
    }
    with_timeout(
        timeout,
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(pool),
    )
    .await?;
    Ok(())
}

pub async fn get_bool(pool: &SqlitePool, key: &str, default: bool, timeout: Duration) -> Result<bool> {
    Ok(get(pool, key, timeout).await?.map(|v| v == "true" || v == "1").unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn rejects_forbidden_keys() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_table(&pool).await.unwrap();
        let err = set(&pool, "ai_api_key", "sk-xxx", TEST_TIMEOUT).await.unwrap_err();
        assert_eq!(err.code(), "SETTINGS_UPDATE_FAILED");
    }

    #[tokio::test]
    async fn round_trips_allowed_keys() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_table(&pool).await.unwrap();
        set(&pool, "public_access", "true", TEST_TIMEOUT).await.unwrap();
        assert!(get_bool(&pool, "public_access", false, TEST_TIMEOUT).await.unwrap());
    }
}

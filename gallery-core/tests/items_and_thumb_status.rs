//! Cross-table integration tests for the queries the HTTP layer's health
//! and metrics endpoints depend on directly.

use std::time::Duration;

use gallery_core::storage::{items, thumb_status};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn seed_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    items::ensure_table(&pool).await.unwrap();
    thumb_status::ensure_table(&pool).await.unwrap();
    pool
}

async fn insert_item(pool: &sqlx::SqlitePool, path: &str, kind: &str, mtime: i64) {
    sqlx::query("INSERT INTO items (name, path, type, mtime) VALUES (?, ?, ?, ?)")
        .bind(path.rsplit('/').next().unwrap())
        .bind(path)
        .bind(kind)
        .bind(mtime)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn counts_total_items_across_types() {
    let pool = seed_pool().await;
    insert_item(&pool, "Vacation", "album", 100).await;
    insert_item(&pool, "Vacation/beach.jpg", "photo", 100).await;
    insert_item(&pool, "Vacation/clip.mp4", "video", 100).await;

    assert_eq!(items::count(&pool, TEST_TIMEOUT).await.unwrap(), 3);
}

#[tokio::test]
async fn direct_children_excludes_grandchildren() {
    let pool = seed_pool().await;
    insert_item(&pool, "Vacation", "album", 100).await;
    insert_item(&pool, "Vacation/2024", "album", 100).await;
    insert_item(&pool, "Vacation/beach.jpg", "photo", 100).await;
    insert_item(&pool, "Vacation/2024/deep.jpg", "photo", 100).await;

    let children = items::direct_children(&pool, "Vacation", TEST_TIMEOUT).await.unwrap();
    let paths: Vec<_> = children.iter().map(|i| i.path.as_str()).collect();
    assert!(paths.contains(&"Vacation/2024"));
    assert!(paths.contains(&"Vacation/beach.jpg"));
    assert!(!paths.contains(&"Vacation/2024/deep.jpg"));
}

#[tokio::test]
async fn by_path_distinguishes_missing_from_empty_album() {
    let pool = seed_pool().await;
    insert_item(&pool, "Vacation", "album", 100).await;

    assert!(items::by_path(&pool, "Vacation", TEST_TIMEOUT).await.unwrap().is_some());
    assert!(items::by_path(&pool, "Nonexistent", TEST_TIMEOUT).await.unwrap().is_none());
}

#[tokio::test]
async fn counts_thumb_status_by_state() {
    let pool = seed_pool().await;
    thumb_status::upsert_pending(&pool, "A/p1.jpg", 1, TEST_TIMEOUT).await.unwrap();
    thumb_status::upsert_pending(&pool, "A/p2.jpg", 1, TEST_TIMEOUT).await.unwrap();
    thumb_status::mark_exists(&pool, "A/p2.jpg", 1, TEST_TIMEOUT).await.unwrap();
    thumb_status::upsert_pending(&pool, "A/p3.jpg", 1, TEST_TIMEOUT).await.unwrap();
    thumb_status::mark_failed(&pool, "A/p3.jpg", TEST_TIMEOUT).await.unwrap();

    let (pending, exists, failed) = thumb_status::count_by_status(&pool, TEST_TIMEOUT).await.unwrap();
    assert_eq!(pending, 1);
    assert_eq!(exists, 1);
    assert_eq!(failed, 1);
}

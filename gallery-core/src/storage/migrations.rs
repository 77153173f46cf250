//! Keyed, idempotent migrations recorded in a per-database `migrations`
//! table. Each step has an optional precondition; re-running the full list
//! is always a no-op once every step has been recorded.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;
use crate::storage::Storage;

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub async fn ensure_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            name TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn apply(pool: &SqlitePool, migrations: &[Migration]) -> Result<()> {
    ensure_table(pool).await?;
    for m in migrations {
        let already: Option<(String,)> =
            sqlx::query_as("SELECT name FROM migrations WHERE name = ?")
                .bind(m.name)
                .fetch_optional(pool)
                .await?;
        if already.is_some() {
            continue;
        }
        info!(migration = m.name, "applying migration");
        let mut tx = pool.begin().await?;
        // Migration bodies may contain several `;`-separated statements
        // (a CREATE TABLE plus its indexes), so run them through raw_sql
        // rather than the single-statement `query()` prepare path.
        sqlx::raw_sql(m.sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, strftime('%s','now'))")
            .bind(m.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }
    Ok(())
}

const MAIN_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_items",
        sql: "CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            path TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL CHECK (type IN ('album','photo','video')),
            mtime INTEGER NOT NULL,
            width INTEGER,
            height INTEGER,
            cover_path TEXT,
            last_viewed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_items_path ON items(path);
        CREATE INDEX IF NOT EXISTS idx_items_type_path ON items(type, path);",
    },
    Migration {
        name: "0002_items_fts",
        sql: "CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(name, tokenize = 'unicode61');",
    },
    Migration {
        name: "0003_album_covers",
        sql: "CREATE TABLE IF NOT EXISTS album_covers (
            album_path TEXT PRIMARY KEY,
            cover_path TEXT NOT NULL,
            width INTEGER,
            height INTEGER,
            mtime INTEGER NOT NULL
        );",
    },
    Migration {
        name: "0004_thumb_status",
        sql: "CREATE TABLE IF NOT EXISTS thumb_status (
            path TEXT PRIMARY KEY,
            mtime INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending','exists','failed')),
            last_checked INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_thumb_status_status ON thumb_status(status, last_checked);",
    },
];

const SETTINGS_MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_settings",
    sql: "CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
}];

const HISTORY_MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_view_history",
    sql: "CREATE TABLE IF NOT EXISTS view_history (
        user_id TEXT NOT NULL,
        item_path TEXT NOT NULL,
        viewed_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, item_path)
    );
    CREATE INDEX IF NOT EXISTS idx_view_history_path ON view_history(item_path);",
}];

const INDEX_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_index_status",
        sql: "CREATE TABLE IF NOT EXISTS index_status (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL CHECK (status IN ('building','complete')),
            processed_files INTEGER NOT NULL DEFAULT 0,
            started_at INTEGER,
            finished_at INTEGER
        );",
    },
    Migration {
        name: "0002_index_progress",
        sql: "CREATE TABLE IF NOT EXISTS index_progress (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    },
];

pub async fn run_all(storage: &Storage) -> Result<()> {
    apply(&storage.main, MAIN_MIGRATIONS).await?;
    apply(&storage.settings, SETTINGS_MIGRATIONS).await?;
    apply(&storage.history, HISTORY_MIGRATIONS).await?;
    apply(&storage.index, INDEX_MIGRATIONS).await?;
    Ok(())
}

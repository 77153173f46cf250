//! Storage layer: four embedded SQLite databases with pooled connections,
//! PRAGMA tuning, a query-timeout wrapper, and keyed/idempotent migrations.
//!
//! Each database is opened as its own [`sqlx::SqlitePool`] — `gallery.db`
//! (items/FTS/album covers/thumb status), `settings.db`, `history.db`, and
//! `index.db` (rebuild progress) — one pool per concern, since SQLite has
//! no in-file schema separation the way Postgres does.

pub mod album_covers;
pub mod history;
pub mod index_status;
pub mod items;
pub mod migrations;
pub mod pragma;
pub mod settings;
pub mod thumb_status;
pub mod timeout;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::DbTuning;
use crate::error::{GalleryError, Result};

pub use timeout::with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbKind {
    Main,
    Settings,
    History,
    Index,
}

impl DbKind {
    pub fn label(self) -> &'static str {
        match self {
            DbKind::Main => "main",
            DbKind::Settings => "settings",
            DbKind::History => "history",
            DbKind::Index => "index",
        }
    }
}

/// Handle bundling all four pools plus the timeout/busy settings that apply
/// uniformly across them. Cloning is cheap: `SqlitePool` is an `Arc` handle.
#[derive(Debug, Clone)]
pub struct Storage {
    pub main: SqlitePool,
    pub settings: SqlitePool,
    pub history: SqlitePool,
    pub index: SqlitePool,
    pub db_tuning: DbTuning,
}

impl Storage {
    /// Opens all four databases at `data_dir`, applies PRAGMAs, runs
    /// migrations, and calls [`ensure_core_tables`] once per pool as a
    /// guard against startup races where a worker references a
    /// yet-uncreated table. Connection failure here is fatal at startup.
    pub async fn open(data_dir: &Path, db_tuning: DbTuning) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let tier = pragma::MemoryTier::detect();
        info!(?tier, "selected SQLite memory tier from host RAM");

        let main = open_pool(&data_dir.join("gallery.db"), tier, &db_tuning).await?;
        let settings = open_pool(&data_dir.join("settings.db"), tier, &db_tuning).await?;
        let history = open_pool(&data_dir.join("history.db"), tier, &db_tuning).await?;
        let index = open_pool(&data_dir.join("index.db"), tier, &db_tuning).await?;

        let storage = Self { main, settings, history, index, db_tuning };
        storage.ensure_core_tables().await?;
        migrations::run_all(&storage).await?;
        Ok(storage)
    }

    fn pool(&self, kind: DbKind) -> &SqlitePool {
        match kind {
            DbKind::Main => &self.main,
            DbKind::Settings => &self.settings,
            DbKind::History => &self.history,
            DbKind::Index => &self.index,
        }
    }

    /// Idempotent; safe to call on every boot. Separate from `migrations`
    /// because it guards only the tables workers reference directly before
    /// the migration runner has necessarily finished (e.g. a thumbnail
    /// worker racing the first-boot migration).
    pub async fn ensure_core_tables(&self) -> Result<()> {
        items::ensure_table(&self.main).await?;
        album_covers::ensure_table(&self.main).await?;
        thumb_status::ensure_table(&self.main).await?;
        settings::ensure_table(&self.settings).await?;
        history::ensure_table(&self.history).await?;
        index_status::ensure_table(&self.index).await?;
        migrations::ensure_table(&self.main).await?;
        migrations::ensure_table(&self.settings).await?;
        migrations::ensure_table(&self.history).await?;
        migrations::ensure_table(&self.index).await?;
        Ok(())
    }

    /// Borrows the pool backing `kind`, for repository functions that need
    /// to pick a database dynamically (e.g. route-cache admin endpoints).
    pub fn pool_for(&self, kind: DbKind) -> &SqlitePool {
        self.pool(kind)
    }
}

async fn open_pool(path: &Path, tier: pragma::MemoryTier, tuning: &DbTuning) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .busy_timeout(tuning.busy_timeout)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(opts)
        .await
        .map_err(GalleryError::Database)?;

    pragma::apply_tuning(&pool, tier).await?;
    Ok(pool)
}

//! CLI/environment loading: `gallery_core::config::Config` carries no
//! `from_env` of its own (see its module doc), so this binary owns that
//! responsibility — `dotenvy` populates the process environment,
//! `clap::Parser` reads it with per-field `env = "..."` attributes, and the
//! result is assembled into one `Config`.

use std::path::PathBuf;

use clap::Parser;
use gallery_core::config::{CacheTuning, Config, DbTuning, IndexerTuning, ThumbnailTuning, WatcherTuning};

#[derive(Parser, Debug)]
#[command(name = "gallery-server")]
#[command(about = "Self-hosted media gallery indexing and serving daemon")]
pub struct Args {
    /// Root directory containing the photo/video tree.
    #[arg(long, env = "PHOTOS_DIR")]
    pub photos_dir: PathBuf,

    /// Root directory for the SQLite databases and thumbnail cache.
    #[arg(long, env = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Redis connection URL backing the cache and job queues.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Address to bind the HTTP server to.
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Secret required in the `X-Admin-Secret` header for admin endpoints.
    /// Leaving this unset disables those endpoints entirely.
    #[arg(long, env = "ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    /// Whether the gallery is reachable without authentication. Auth itself
    /// is external middleware; this only gates this server's own admin
    /// surface and is informational for anything that reads `Config`.
    #[arg(long, env = "PUBLIC_ACCESS", default_value_t = false)]
    pub public_access: bool,

    /// Comma-separated list of allowed CORS origins. Empty means permissive.
    #[arg(long, env = "CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub cors_allowed_origins: Vec<String>,
}

impl Args {
    /// Loads `.env` (if present, silently ignored otherwise) and parses
    /// `Args` from the combined CLI/environment.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(e) => tracing::warn!(error = %e, "failed to parse .env file"),
        }
        Args::parse()
    }

    pub fn into_gallery_config(self) -> Config {
        Config {
            photos_dir: self.photos_dir,
            data_dir: self.data_dir,
            redis_url: self.redis_url,
            db: DbTuning::default(),
            indexer: IndexerTuning::default(),
            watcher: WatcherTuning::default(),
            thumbnail: ThumbnailTuning::default(),
            cache: CacheTuning::default(),
            admin_secret: self.admin_secret,
            public_access: self.public_access,
        }
    }
}

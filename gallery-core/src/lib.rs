//! Core indexing, caching, thumbnailing and search pipeline for the media
//! gallery server.
//!
//! This crate owns everything the HTTP layer treats as an external
//! collaborator: the four embedded SQLite stores, the directory walker and
//! incremental indexer, the filesystem watcher's debounce/consolidation
//! logic, the two-priority thumbnail worker pool, the browse/search query
//! layers, the in-process event bus, and the durable job queue client.
//! Routing, auth, and rate limiting live in `gallery-server` and only ever
//! call into the types exported here.

pub mod browse;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod indexer;
pub mod jobs;
pub mod path;
pub mod search;
pub mod storage;
pub mod thumbnail;
pub mod watcher;

pub use error::{GalleryError, Result};
pub use path::RelPath;

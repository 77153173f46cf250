//! PRAGMA tuning tiered from host RAM: mmap/cache sizes scale with what's
//! actually available so a gallery on a 1 GiB SBC doesn't starve, and a
//! gallery on a 32 GiB box doesn't leave performance on the table.

use sqlx::SqlitePool;
use sysinfo::System;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTier {
    /// >= 16 GiB total RAM
    High,
    /// >= 8 GiB total RAM
    Medium,
    /// >= 4 GiB total RAM
    Low,
    /// < 4 GiB total RAM
    Minimal,
}

impl MemoryTier {
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self::from_total_bytes(sys.total_memory())
    }

    pub fn from_total_bytes(total_bytes: u64) -> Self {
        const GIB: u64 = 1024 * 1024 * 1024;
        if total_bytes >= 16 * GIB {
            MemoryTier::High
        } else if total_bytes >= 8 * GIB {
            MemoryTier::Medium
        } else if total_bytes >= 4 * GIB {
            MemoryTier::Low
        } else {
            MemoryTier::Minimal
        }
    }

    /// `(mmap_size_bytes, cache_size_kib)`.
    pub fn sizes(self) -> (i64, i64) {
        const MIB: i64 = 1024 * 1024;
        match self {
            MemoryTier::High => (1024 * MIB, 64 * 1024),
            MemoryTier::Medium => (512 * MIB, 32 * 1024),
            MemoryTier::Low => (384 * MIB, 16 * 1024),
            MemoryTier::Minimal => (256 * MIB, 8 * 1024),
        }
    }
}

pub async fn apply_tuning(pool: &SqlitePool, tier: MemoryTier) -> Result<()> {
    let (mmap_bytes, cache_kib) = tier.sizes();
    // SQLite reports cache_size as negative-KiB to request a size in
    // kibibytes rather than pages.
    let cache_pragma = format!("PRAGMA cache_size = -{cache_kib};");
    let mmap_pragma = format!("PRAGMA mmap_size = {mmap_bytes};");

    sqlx::query("PRAGMA temp_store = MEMORY;").execute(pool).await?;
    sqlx::query(&cache_pragma).execute(pool).await?;
    sqlx::query(&mmap_pragma).execute(pool).await?;
    // Lets SQLite opportunistically run incremental optimize passes instead
    // of requiring an explicit maintenance job.
    sqlx::query("PRAGMA optimize = 0x10002;").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_from_bytes() {
        assert_eq!(MemoryTier::from_total_bytes(20 * 1024 * 1024 * 1024), MemoryTier::High);
        assert_eq!(MemoryTier::from_total_bytes(10 * 1024 * 1024 * 1024), MemoryTier::Medium);
        assert_eq!(MemoryTier::from_total_bytes(5 * 1024 * 1024 * 1024), MemoryTier::Low);
        assert_eq!(MemoryTier::from_total_bytes(2 * 1024 * 1024 * 1024), MemoryTier::Minimal);
    }
}

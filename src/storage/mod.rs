//! Local persistence cache backed by Sled.
//!
//! Holds the last known application snapshot as one JSON blob, the session
//! user under a separate key with its own lifecycle, and the run-time
//! remote connection override. This is the source of truth whenever no
//! remote store is configured, and stale-but-available data when a remote
//! fetch fails.

mod sled_store;

pub use sled_store::{CacheStats, LocalCache, StorageError, StorageResult};

use serde::{Deserialize, Serialize};

/// Bookkeeping stored alongside the snapshot blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Unix timestamp of the first save
    pub created_at: i64,
    /// Unix timestamp of the last save
    pub updated_at: i64,
    /// Number of snapshot saves
    pub save_count: u64,
    /// Size of the serialized snapshot in bytes
    pub size_bytes: u64,
    /// Username of the session that wrote the last snapshot
    pub saved_by: Option<String>,
}

impl CacheMetadata {
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            created_at: now,
            updated_at: now,
            save_count: 0,
            size_bytes: 0,
            saved_by: None,
        }
    }

    /// Records one more save of `size_bytes`.
    pub fn touch(mut self, size_bytes: u64, saved_by: Option<String>) -> Self {
        self.updated_at = chrono::Utc::now().timestamp();
        self.save_count += 1;
        self.size_bytes = size_bytes;
        self.saved_by = saved_by;
        self
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Path to the Sled database directory
    pub path: String,
    /// Cache size in bytes (default: 64MB)
    pub cache_size: u64,
    /// Flush interval in milliseconds (0 = flush on every save)
    pub flush_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "./data/rapor.sled".to_string(),
            cache_size: 64 * 1024 * 1024,
            flush_interval_ms: 500,
        }
    }
}

impl CacheConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_flush_interval(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_touch() {
        let meta = CacheMetadata::new().touch(120, Some("admin".into())).touch(80, None);

        assert_eq!(meta.save_count, 2);
        assert_eq!(meta.size_bytes, 80);
        assert_eq!(meta.saved_by, None);
        assert!(meta.updated_at >= meta.created_at);
    }

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.path, "./data/rapor.sled");
        assert_eq!(config.flush_interval_ms, 500);

        let tuned = CacheConfig::new("/tmp/x").with_cache_size(1024).with_flush_interval(0);
        assert_eq!((tuned.cache_size, tuned.flush_interval_ms), (1024, 0));
    }
}

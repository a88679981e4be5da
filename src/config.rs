//! Process configuration from the environment.

use std::net::SocketAddr;

use crate::remote::RemoteConfig;
use crate::storage::CacheConfig;

pub const DEFAULT_STORAGE_PATH: &str = "./data/rapor.sled";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CACHE_SIZE_MB: u64 = 64;
pub const DEFAULT_CACHE_FLUSH_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub storage_path: String,
    pub port: u16,
    pub cache_size_mb: u64,
    /// Background flush interval of the cache; 0 flushes on every save.
    pub cache_flush_ms: u64,
    /// Remote store from `SUPABASE_URL` / `SUPABASE_KEY`. May be invalid,
    /// in which case the engine runs offline unless an override is cached.
    pub remote: RemoteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
            port: DEFAULT_PORT,
            cache_size_mb: DEFAULT_CACHE_SIZE_MB,
            cache_flush_ms: DEFAULT_CACHE_FLUSH_MS,
            remote: RemoteConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_path = lookup("STORAGE_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string());
        let port = lookup("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let cache_size_mb = lookup("CACHE_SIZE_MB")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE_MB);
        let cache_flush_ms = lookup("CACHE_FLUSH_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_CACHE_FLUSH_MS);
        let remote = RemoteConfig::new(
            lookup("SUPABASE_URL").unwrap_or_default(),
            lookup("SUPABASE_KEY").unwrap_or_default(),
        );

        Self {
            storage_path,
            port,
            cache_size_mb,
            cache_flush_ms,
            remote,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(&self.storage_path)
            .with_cache_size(self.cache_size_mb * 1024 * 1024)
            .with_flush_interval(self.cache_flush_ms)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

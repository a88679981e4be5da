//! Rapor PAUD sync server.
//!
//! Serves the report-card UI's state over HTTP and pushes engine events
//! over a WebSocket:
//! - Sled embedded database for the offline snapshot cache
//! - A PostgREST table store as the shared remote, when configured
//! - Axum for the HTTP and WebSocket surface

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use rapor_sync::api::{router, AppState};
use rapor_sync::config::AppConfig;
use rapor_sync::remote::{PostgrestTransport, RemoteConfig, RemoteStore, RemoteTransport};
use rapor_sync::storage::LocalCache;
use rapor_sync::sync::SyncEngine;

/// Builds the remote adapter from the cached override, else the
/// environment. Runs offline when neither is usable.
fn remote_store(cache: &LocalCache, from_env: &RemoteConfig) -> RemoteStore {
    let cached = match cache.load_remote_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring cached remote settings: {}", e);
            None
        }
    };
    let config = cached
        .filter(RemoteConfig::is_valid)
        .or_else(|| Some(from_env.clone()).filter(RemoteConfig::is_valid));

    let Some(config) = config else {
        warn!("Remote store not configured - running offline");
        return RemoteStore::unconfigured();
    };
    match PostgrestTransport::new(config.clone()) {
        Ok(transport) => {
            info!("Remote store: {}", config.url);
            RemoteStore::new(Some(Arc::new(transport) as Arc<dyn RemoteTransport>))
        }
        Err(e) => {
            warn!("Remote store unavailable ({}) - running offline", e);
            RemoteStore::unconfigured()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rapor_sync=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();

    info!("Initializing cache at: {}", config.storage_path);
    let cache = LocalCache::open(config.cache_config()).context("Failed to open local cache")?;

    let remote = remote_store(&cache, &config.remote);
    let engine = Arc::new(SyncEngine::new(cache, remote));
    engine.start().await.context("Engine start-up failed")?;

    let app = router(Arc::new(AppState::new(engine)));
    let addr = config.listen_addr();

    info!("Rapor sync server v{} starting", env!("CARGO_PKG_VERSION"));
    info!("   Listening on: http://{}", addr);
    info!("   Events: ws://{}/ws/events", addr);
    info!("   Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

//! Sled-based implementation of the local cache.
//!
//! Layout:
//! - `snapshots` tree: the framed snapshot JSON under [`SNAPSHOT_KEY`]
//! - `session` tree: the session user under [`USER_KEY`] and the remote
//!   connection override under [`REMOTE_CONFIG_KEY`]
//! - `metadata` tree: bincode-encoded [`CacheMetadata`]

use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{CacheConfig, CacheMetadata};
use crate::model::{Snapshot, User};
use crate::remote::RemoteConfig;

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Sled database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corruption detected in cache: {0}")]
    Corruption(String),

    #[error("Storage initialization failed: {0}")]
    InitFailed(String),
}

/// Result type for cache operations
pub type StorageResult<T> = Result<T, StorageError>;

const TREE_SNAPSHOTS: &str = "snapshots";
const TREE_SESSION: &str = "session";
const TREE_METADATA: &str = "metadata";

pub const SNAPSHOT_KEY: &str = "raporPaudData";
pub const USER_KEY: &str = "appUser";
pub const REMOTE_CONFIG_KEY: &str = "remoteConfig";

/// Frame marker for snapshot blobs.
const FRAME_MARKER: u8 = 0x01;

/// Durable store for the snapshot and session data
#[derive(Clone)]
pub struct LocalCache {
    db: Arc<Db>,
    snapshots: Tree,
    session: Tree,
    metadata: Tree,
    config: CacheConfig,
}

impl LocalCache {
    /// Open or create the cache at the configured path
    pub fn open(config: CacheConfig) -> StorageResult<Self> {
        let path = Path::new(&config.path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::InitFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_size)
            .flush_every_ms(if config.flush_interval_ms > 0 {
                Some(config.flush_interval_ms)
            } else {
                None
            })
            .open()?;

        let snapshots = db.open_tree(TREE_SNAPSHOTS)?;
        let session = db.open_tree(TREE_SESSION)?;
        let metadata = db.open_tree(TREE_METADATA)?;

        Ok(Self {
            db: Arc::new(db),
            snapshots,
            session,
            metadata,
            config,
        })
    }

    /// Throwaway cache that lives only as long as the process.
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            snapshots: db.open_tree(TREE_SNAPSHOTS)?,
            session: db.open_tree(TREE_SESSION)?,
            metadata: db.open_tree(TREE_METADATA)?,
            db: Arc::new(db),
            config: CacheConfig::new(""),
        })
    }

    /// Writes the full snapshot, replacing the previous one.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let json = serde_json::to_vec(snapshot)?;
        self.snapshots.insert(SNAPSHOT_KEY, frame(&json))?;

        let meta = self
            .metadata()?
            .unwrap_or_default()
            .touch(json.len() as u64, snapshot.user.as_ref().map(|u| u.username.clone()));
        self.metadata.insert(SNAPSHOT_KEY, bincode::serialize(&meta)?)?;

        if self.config.flush_interval_ms == 0 {
            self.db.flush()?;
        }
        debug!("Cached snapshot ({} bytes)", json.len());
        Ok(())
    }

    /// Last saved snapshot, identifiers normalized.
    pub fn load_snapshot(&self) -> StorageResult<Option<Snapshot>> {
        match self.snapshots.get(SNAPSHOT_KEY)? {
            Some(data) => {
                let json = unframe(&data)?;
                let value: serde_json::Value = serde_json::from_slice(&json)?;
                Ok(Some(Snapshot::from_value(value)?))
            }
            None => Ok(None),
        }
    }

    pub fn metadata(&self) -> StorageResult<Option<CacheMetadata>> {
        match self.metadata.get(SNAPSHOT_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_user(&self, user: &User) -> StorageResult<()> {
        self.session.insert(USER_KEY, serde_json::to_vec(user)?)?;
        self.db.flush()?;
        Ok(())
    }

    /// Session user, if one is stored. An unreadable record is dropped.
    pub fn load_user(&self) -> StorageResult<Option<User>> {
        match self.session.get(USER_KEY)? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(user) => Ok(Some(user)),
                Err(e) => {
                    warn!("Discarding unreadable session user: {}", e);
                    self.session.remove(USER_KEY)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Removes the session user. The snapshot stays.
    pub fn clear_user(&self) -> StorageResult<()> {
        self.session.remove(USER_KEY)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn save_remote_config(&self, config: &RemoteConfig) -> StorageResult<()> {
        self.session.insert(REMOTE_CONFIG_KEY, serde_json::to_vec(config)?)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn load_remote_config(&self) -> StorageResult<Option<RemoteConfig>> {
        match self.session.get(REMOTE_CONFIG_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Force flush all pending writes to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let meta = self.metadata().ok().flatten();
        CacheStats {
            has_snapshot: self.snapshots.contains_key(SNAPSHOT_KEY).unwrap_or(false),
            has_user: self.session.contains_key(USER_KEY).unwrap_or(false),
            total_size_bytes: self.db.size_on_disk().unwrap_or(0),
            snapshot_bytes: meta.as_ref().map(|m| m.size_bytes).unwrap_or(0),
            save_count: meta.map(|m| m.save_count).unwrap_or(0),
        }
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub has_snapshot: bool,
    pub has_user: bool,
    pub total_size_bytes: u64,
    pub snapshot_bytes: u64,
    pub save_count: u64,
}

/// Marker byte plus little-endian length, then the payload.
fn frame(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() + 5);
    result.push(FRAME_MARKER);
    result.extend(&(data.len() as u32).to_le_bytes());
    result.extend(data);
    result
}

fn unframe(data: &[u8]) -> StorageResult<Vec<u8>> {
    match data.split_first() {
        None => Err(StorageError::Corruption("Empty snapshot record".into())),
        Some((&FRAME_MARKER, rest)) => {
            if rest.len() < 4 {
                return Err(StorageError::Corruption("Truncated snapshot header".into()));
            }
            let (len_bytes, payload) = rest.split_at(4);
            let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
            if payload.len() != len {
                return Err(StorageError::Corruption("Snapshot size mismatch".into()));
            }
            Ok(payload.to_vec())
        }
        // unframed JSON
        Some(_) => Ok(data.to_vec()),
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        // Attempt to flush on drop, but don't panic
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassRecord, Role, Student};
    use tempfile::tempdir;

    fn test_cache(dir: &tempfile::TempDir) -> LocalCache {
        let config = CacheConfig::new(dir.path().join("test.sled").to_string_lossy().to_string());
        LocalCache::open(config).unwrap()
    }

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.user = Some(User::new("admin", "Administrator", Role::Admin));
        snapshot.classes.upsert(ClassRecord {
            id: "C1".into(),
            name: "Kelompok A".into(),
            ..Default::default()
        });
        snapshot.students.upsert(Student {
            id: "S1".into(),
            class_id: "C1".into(),
            name: "Ani".into(),
            ..Default::default()
        });
        snapshot
    }

    #[test]
    fn test_snapshot_save_load() {
        let dir = tempdir().unwrap();
        let cache = test_cache(&dir);

        assert!(cache.load_snapshot().unwrap().is_none());
        cache.save_snapshot(&sample()).unwrap();

        let loaded = cache.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded, sample());

        let meta = cache.metadata().unwrap().unwrap();
        assert_eq!(meta.save_count, 1);
        assert_eq!(meta.saved_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let cache = test_cache(&dir);
            cache.save_snapshot(&sample()).unwrap();
        }
        let cache = test_cache(&dir);
        assert_eq!(cache.load_snapshot().unwrap().unwrap().students.len(), 1);
    }

    #[test]
    fn test_user_lifecycle_is_independent() {
        let dir = tempdir().unwrap();
        let cache = test_cache(&dir);
        let user = User::new("guru", "Guru Kelas", Role::Teacher);

        cache.save_snapshot(&sample()).unwrap();
        cache.save_user(&user).unwrap();
        assert_eq!(cache.load_user().unwrap(), Some(user));

        cache.clear_user().unwrap();
        assert!(cache.load_user().unwrap().is_none());
        assert!(cache.load_snapshot().unwrap().is_some());
    }

    #[test]
    fn test_remote_config_override() {
        let cache = LocalCache::temporary().unwrap();
        let config = RemoteConfig::new("abc.supabase.co", "anon");

        cache.save_remote_config(&config).unwrap();
        assert!(cache.load_remote_config().unwrap().is_none());
        cache.save_remote_config(&config).unwrap();
        assert_eq!(cache.load_remote_config().unwrap(), Some(config));
    }

    #[test]
    fn test_corrupt_snapshot_detected() {
        let cache = LocalCache::temporary().unwrap();
        let mut framed = frame(b"{\"classes\":[]}");
        framed.truncate(framed.len() - 2);
        cache.snapshots.insert(SNAPSHOT_KEY, framed).unwrap();

        assert!(matches!(cache.load_snapshot(), Err(StorageError::Corruption(_))));
    }

    #[test]
    fn test_unframed_json_still_loads() {
        let cache = LocalCache::temporary().unwrap();
        cache
            .snapshots
            .insert(SNAPSHOT_KEY, &br#"{"students":[{"id":5,"classId":1}]}"#[..])
            .unwrap();

        let loaded = cache.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.students.rows()[0].id, "5");
    }
}

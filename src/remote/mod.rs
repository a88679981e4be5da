//! Remote table store adapter.
//!
//! [`RemoteStore`] is the only path from the engine to the remote store. It
//! translates field names at the boundary, maps collection names to table
//! names, packs the settings row, and turns every transport failure into a
//! [`RemoteError`]. The wire itself sits behind [`RemoteTransport`], so the
//! PostgREST client and the in-memory test double are interchangeable.

pub mod case;
pub mod memory;
pub mod postgrest;
pub mod settings_codec;
pub mod tables;

pub use memory::MemoryRemote;
pub use postgrest::{PostgrestTransport, RemoteConfig};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::model::{CollectionName, SchoolSettings, SkippedRow, Snapshot};
use case::{keys_to_camel, keys_to_snake, strip_nulls};
use tables::{clear_order, table_name, RESTORE_ORDER};

/// User-facing connectivity message.
pub const CONNECTIVITY_MESSAGE: &str = "Gagal terhubung ke Database.";

/// Bucket holding uploaded images.
pub const IMAGE_BUCKET: &str = "images";

/// Errors crossing the remote boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Koneksi Database belum disetting")]
    NotConfigured,

    /// The store could not be reached.
    #[error("Gagal terhubung ke Database.")]
    Connectivity,

    /// The store answered and refused the request; carries its message.
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid response from database: {0}")]
    Decode(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

/// Row selection for update and delete. Always on the `id` column.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    IdEq(String),
    IdIn(Vec<String>),
    IdNeq(String),
}

impl RowFilter {
    pub fn matches(&self, id: &str) -> bool {
        match self {
            RowFilter::IdEq(x) => x == id,
            RowFilter::IdIn(ids) => ids.iter().any(|x| x == id),
            RowFilter::IdNeq(x) => x != id,
        }
    }
}

/// Outcome of a full fetch.
#[derive(Debug, Clone)]
pub struct RemoteData {
    /// Every collection; settings at their defaults.
    pub snapshot: Snapshot,
    /// `None` when the settings row could not be read, in which case the
    /// caller keeps the settings it has.
    pub settings: Option<SchoolSettings>,
    /// Rows left out because they did not decode.
    pub skipped: Vec<SkippedRow>,
}

/// Folder of an uploaded image inside the image bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFolder {
    Students,
    School,
}

impl ImageFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFolder::Students => "students",
            ImageFolder::School => "school",
        }
    }
}

/// Wire-level access to the tabular store. Rows are snake_case JSON.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn select_all(&self, table: &str) -> RemoteResult<Vec<Value>>;

    /// First row of the table, if any.
    async fn select_first(&self, table: &str) -> RemoteResult<Option<Value>>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()>;

    async fn update_by_id(&self, table: &str, id: &str, row: Value) -> RemoteResult<()>;

    /// Insert or merge on primary key.
    async fn upsert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()>;

    async fn delete(&self, table: &str, filter: &RowFilter) -> RemoteResult<()>;

    /// Stores a blob under `bucket/path`, overwriting, and returns its public
    /// URL.
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> RemoteResult<String>;
}

/// Collection-level gateway over an optional transport.
///
/// With no transport configured, single-row writes fail with
/// [`RemoteError::NotConfigured`], batch deletes succeed as no-ops and
/// fetches return `None`.
pub struct RemoteStore {
    transport: RwLock<Option<Arc<dyn RemoteTransport>>>,
}

impl RemoteStore {
    pub fn new(transport: Option<Arc<dyn RemoteTransport>>) -> Self {
        Self {
            transport: RwLock::new(transport),
        }
    }

    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    /// Swaps the transport, e.g. after the connection settings change.
    pub fn reconfigure(&self, transport: Option<Arc<dyn RemoteTransport>>) {
        *self.transport.write() = transport;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.read().is_some()
    }

    fn transport(&self) -> Option<Arc<dyn RemoteTransport>> {
        self.transport.read().clone()
    }

    fn require(&self) -> RemoteResult<Arc<dyn RemoteTransport>> {
        self.transport().ok_or(RemoteError::NotConfigured)
    }

    /// Inserts one camelCase record.
    pub async fn create(&self, collection: CollectionName, record: &Value) -> RemoteResult<()> {
        let transport = self.require()?;
        let table = table_name(collection);
        let result = transport.insert(&table, vec![keys_to_snake(record.clone())]).await;
        log_outcome("insert", &table, &result);
        result
    }

    /// Updates the row with the record's id.
    pub async fn update(&self, collection: CollectionName, record: &Value) -> RemoteResult<()> {
        let transport = self.require()?;
        let table = table_name(collection);
        let id = record_id(record);
        let result = transport
            .update_by_id(&table, &id, keys_to_snake(record.clone()))
            .await;
        log_outcome("update", &table, &result);
        result
    }

    pub async fn delete(&self, collection: CollectionName, id: &str) -> RemoteResult<()> {
        let transport = self.require()?;
        let table = table_name(collection);
        let result = transport.delete(&table, &RowFilter::IdEq(id.to_string())).await;
        log_outcome("delete", &table, &result);
        result
    }

    pub async fn upsert(&self, collection: CollectionName, record: &Value) -> RemoteResult<()> {
        let transport = self.require()?;
        let table = table_name(collection);
        let result = transport.upsert(&table, vec![keys_to_snake(record.clone())]).await;
        log_outcome("upsert", &table, &result);
        result
    }

    /// Deletes every row whose id is listed, in one call.
    pub async fn batch_delete(&self, collection: CollectionName, ids: &[String]) -> RemoteResult<()> {
        let Some(transport) = self.transport() else {
            return Ok(());
        };
        if ids.is_empty() {
            return Ok(());
        }
        let table = table_name(collection);
        let result = transport.delete(&table, &RowFilter::IdIn(ids.to_vec())).await;
        log_outcome("batch delete", &table, &result);
        if result.is_ok() {
            info!("Deleted {} rows from {}", ids.len(), table);
        }
        result
    }

    /// Fetches the settings row, unpacked.
    pub async fn fetch_settings(&self) -> Option<SchoolSettings> {
        let transport = self.transport()?;
        match transport.select_first(&table_name(CollectionName::Settings)).await {
            Ok(Some(row)) => decode_settings(row)
                .map_err(|e| warn!("Failed to decode settings row: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to fetch settings: {}", e);
                None
            }
        }
    }

    /// Fetches every collection concurrently and assembles a normalized
    /// snapshot (no user). A table the store refuses reads as empty and a
    /// row that does not decode is skipped; losing the connection fails the
    /// whole fetch.
    pub async fn fetch_all_data(&self) -> Option<RemoteData> {
        let transport = self.transport()?;

        let fetches = CollectionName::ENTITIES.map(|collection| {
            let transport = transport.clone();
            async move {
                let table = table_name(collection);
                (collection, transport.select_all(&table).await)
            }
        });
        let settings_table = table_name(CollectionName::Settings);
        let (results, settings) = tokio::join!(
            futures_util::future::join_all(fetches),
            transport.select_first(&settings_table)
        );

        let mut document = Map::new();
        for (collection, result) in results {
            let rows = match result {
                Ok(rows) => rows,
                Err(RemoteError::Connectivity) => {
                    error!("Lost connection while fetching {}", collection);
                    return None;
                }
                Err(e) => {
                    warn!("Fetching {} failed, treating as empty: {}", collection, e);
                    Vec::new()
                }
            };
            document.insert(
                collection.document_key().to_string(),
                keys_to_camel(strip_nulls(Value::Array(rows))),
            );
        }

        let settings = match settings {
            Ok(Some(row)) => decode_settings(row)
                .map_err(|e| warn!("Failed to decode settings row, keeping current settings: {}", e))
                .ok(),
            Ok(None) => Some(SchoolSettings::default()),
            Err(RemoteError::Connectivity) => return None,
            Err(e) => {
                warn!("Fetching settings failed, keeping current settings: {}", e);
                None
            }
        };

        let (snapshot, skipped) = Snapshot::from_rows_lenient(Value::Object(document));
        for row in &skipped {
            warn!("Skipping undecodable {} row {:?}: {}", row.collection, row.id, row.reason);
        }
        debug!("Fetched snapshot: {:?}", snapshot.counts());
        Some(RemoteData {
            snapshot,
            settings,
            skipped,
        })
    }

    /// Writes the packed settings row.
    pub async fn save_settings(&self, settings: &SchoolSettings) -> RemoteResult<()> {
        let transport = self.require()?;
        let row = keys_to_snake(settings_codec::pack(settings)?);
        let table = table_name(CollectionName::Settings);
        let result = transport.upsert(&table, vec![row]).await;
        log_outcome("save settings", &table, &result);
        result
    }

    /// Stores an image under `folder/name` and returns its public URL, or
    /// `None` on any failure.
    pub async fn upload_image(
        &self,
        body: Bytes,
        content_type: &str,
        folder: ImageFolder,
        name: Option<String>,
    ) -> Option<String> {
        let transport = self.transport()?;
        let name = name.unwrap_or_else(|| upload_name(content_type));
        let path = format!("{}/{}", folder.as_str(), name);
        match transport.upload_object(IMAGE_BUCKET, &path, body, content_type).await {
            Ok(url) => {
                info!("Uploaded image {}", path);
                Some(url)
            }
            Err(e) => {
                warn!("Image upload to {} failed: {}", path, e);
                None
            }
        }
    }

    /// Deletes every row of every operational table, children first.
    /// Settings are never touched. The first failure aborts.
    pub async fn clear_database(&self, keep_learning_objectives: bool) -> RemoteResult<()> {
        let transport = self.require()?;
        for collection in clear_order(keep_learning_objectives) {
            let table = table_name(collection);
            transport
                .delete(&table, &RowFilter::IdNeq("0".to_string()))
                .await
                .map_err(|e| {
                    error!("Clearing {} failed: {}", table, e);
                    e
                })?;
            debug!("Cleared table {}", table);
        }
        info!("Remote database cleared (kept learning objectives: {})", keep_learning_objectives);
        Ok(())
    }

    /// Full clear, then settings (when `with_settings`), then every
    /// non-empty collection parents first. Steps already written are not
    /// undone when a later one fails.
    pub async fn restore_database(&self, snapshot: &Snapshot, with_settings: bool) -> RemoteResult<()> {
        let transport = self.require()?;
        self.clear_database(false).await?;
        if with_settings {
            self.save_settings(&snapshot.settings).await?;
        }

        for collection in RESTORE_ORDER {
            if snapshot.collection_len(collection) == 0 {
                continue;
            }
            let rows = match keys_to_snake(snapshot.collection_value(collection)?) {
                Value::Array(rows) => rows,
                _ => continue,
            };
            let table = table_name(collection);
            let count = rows.len();
            transport.upsert(&table, rows).await.map_err(|e| {
                error!("Restoring {} failed: {}", table, e);
                e
            })?;
            debug!("Restored {} rows into {}", count, table);
        }
        info!("Remote database restored");
        Ok(())
    }
}

fn decode_settings(row: Value) -> serde_json::Result<SchoolSettings> {
    settings_codec::unpack(keys_to_camel(strip_nulls(row)))
}

fn record_id(record: &Value) -> String {
    record
        .get("id")
        .map(crate::model::ids::identifier_string)
        .unwrap_or_default()
}

fn log_outcome(op: &str, table: &str, result: &RemoteResult<()>) {
    match result {
        Ok(()) => debug!("Remote {} on {} ok", op, table),
        Err(e) => warn!("Remote {} on {} failed: {}", op, table, e),
    }
}

/// `<millis>_<6 base36 chars>.<ext>`, with the extension taken from the
/// content type's subtype.
pub fn upload_name(content_type: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let ext = content_type
        .split('/')
        .nth(1)
        .filter(|s| !s.is_empty())
        .unwrap_or("jpg");
    let mut rng = rand::thread_rng();
    let token: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}_{}.{}", chrono::Utc::now().timestamp_millis(), token, ext)
}

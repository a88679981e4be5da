//! State synchronization between the in-memory snapshot, the local cache
//! and the remote store.
//!
//! This module implements the engine every page calls into:
//! - Optimistic local mutation followed by a best-effort remote write
//! - Load-on-start from the remote store or the local cache
//! - Bulk administrative flows (class clears, reset, restore, cleanup)
//! - A confirmation gate for destructive operations
//! - The referential integrity auditor and the backup codec

pub mod audit;
pub mod backup;
pub mod confirm;
pub mod engine;
pub mod session;

pub use audit::{compute_orphans, OrphanReport};
pub use backup::{BackupDocument, BackupError};
pub use confirm::{ConfirmOptions, ConfirmRequest, ConfirmVariant, ConfirmationGate};
pub use engine::SyncEngine;
pub use session::Session;

use serde::Serialize;
use thiserror::Error;

use crate::model::{CollectionName, User};
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Result type for engine operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the engine
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// The operator declined a confirmation.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::BadRequest(err.to_string())
    }
}

/// Where a single mutation ended up. The local change stands in every case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum MutationOutcome {
    /// Applied locally; no remote store configured.
    LocalOnly,
    /// Applied locally and accepted by the remote store.
    Confirmed,
    /// Applied locally; the remote write failed and was not retried.
    Failed(String),
}

impl MutationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, MutationOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Events pushed to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Transient message for the operator.
    Notice { level: NoticeLevel, message: String },
    /// A row was written or removed locally.
    RecordChanged { collection: CollectionName, id: String },
    SettingsChanged,
    /// The whole snapshot was replaced (refresh, reset, restore).
    SnapshotReplaced,
    Loading { active: bool },
    SessionChanged { user: Option<User> },
    ConfirmRequested { request: ConfirmRequest },
    ConfirmResolved { id: String, confirmed: bool },
}

impl EngineEvent {
    pub fn info(message: impl Into<String>) -> Self {
        EngineEvent::Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        EngineEvent::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

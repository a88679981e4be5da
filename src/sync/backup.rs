//! Portable backup document.
//!
//! A backup is the snapshot document (every collection plus settings) with
//! a format marker, a schema version and the export time added at the top
//! level. Documents written before versioning carry none of the three and
//! are read as version 0.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::Snapshot;

pub const BACKUP_FORMAT: &str = "rapor-paud-backup";
pub const BACKUP_VERSION: u64 = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackupError {
    #[error("Invalid backup file: {0}")]
    Parse(String),

    #[error("Unsupported backup format: {0}")]
    UnsupportedFormat(String),

    #[error("Backup version {0} is not supported")]
    UnsupportedVersion(u64),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub format: &'static str,
    pub version: u64,
    pub exported_at: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

impl BackupDocument {
    pub fn export(snapshot: &Snapshot) -> Self {
        Self::export_at(snapshot, Utc::now())
    }

    pub fn export_at(snapshot: &Snapshot, at: DateTime<Utc>) -> Self {
        Self {
            format: BACKUP_FORMAT,
            version: BACKUP_VERSION,
            exported_at: at.to_rfc3339(),
            snapshot: snapshot.clone(),
        }
    }

    /// Suggested download name, dated by export day.
    pub fn file_name(&self) -> String {
        let day = self.exported_at.get(..10).unwrap_or("backup");
        format!("Backup_Rapor_PAUD_{}.json", day)
    }

    pub fn to_json_pretty(&self) -> Result<String, BackupError> {
        serde_json::to_string_pretty(self).map_err(|e| BackupError::Parse(e.to_string()))
    }
}

/// A decoded backup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupContents {
    pub snapshot: Snapshot,
    /// Whether the document carried settings. Older exports may not, and
    /// restoring those leaves the current settings in place.
    pub has_settings: bool,
}

/// Validates and decodes a backup. Nothing is applied here, so a rejected
/// document leaves every store untouched.
pub fn parse_backup(text: &str) -> Result<BackupContents, BackupError> {
    let value: Value = serde_json::from_str(text).map_err(|e| BackupError::Parse(e.to_string()))?;
    parse_backup_value(value)
}

pub fn parse_backup_value(value: Value) -> Result<BackupContents, BackupError> {
    let Value::Object(map) = &value else {
        return Err(BackupError::Parse("expected a JSON object".into()));
    };

    match map.get("format") {
        None => {}
        Some(Value::String(format)) if format == BACKUP_FORMAT => {}
        Some(other) => {
            let name = other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string());
            return Err(BackupError::UnsupportedFormat(name));
        }
    }

    let version = match map.get("version") {
        None => 0,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| BackupError::Parse(format!("invalid version {}", v)))?,
    };
    if version > BACKUP_VERSION {
        return Err(BackupError::UnsupportedVersion(version));
    }

    let has_settings = map.get("settings").is_some_and(|v| !v.is_null());
    let snapshot = Snapshot::from_value(value).map_err(|e| BackupError::Parse(e.to_string()))?;
    Ok(BackupContents {
        snapshot,
        has_settings,
    })
}

//! In-memory transport.
//!
//! Used by the test suites and for running the server without a database.
//! Failure injection covers the two error kinds the adapter distinguishes:
//! lost connectivity and per-table rejection.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{RemoteError, RemoteResult, RemoteTransport, RowFilter};
use crate::model::ids::identifier_string;

#[derive(Default)]
pub struct MemoryRemote {
    tables: DashMap<String, Vec<Value>>,
    objects: DashMap<String, Bytes>,
    rejected: DashMap<String, String>,
    rejected_calls: DashMap<(String, String), String>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a table's rows.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables.insert(table.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .get(table)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.objects
            .get(&format!("{}/{}", bucket, path))
            .map(|b| b.clone())
    }

    /// Every call on the table fails with the given store message.
    pub fn reject_table(&self, table: &str, message: &str) {
        self.rejected.insert(table.to_string(), message.to_string());
    }

    /// Only `op` calls on the table fail, e.g. `("upsert", "assessments")`.
    pub fn reject_call(&self, op: &str, table: &str, message: &str) {
        self.rejected_calls
            .insert((op.to_string(), table.to_string()), message.to_string());
    }

    pub fn accept_table(&self, table: &str) {
        self.rejected.remove(table);
        self.rejected_calls.retain(|(_, t), _| t != table);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Write calls issued so far, as `op:table`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, op: &str, table: &str) -> RemoteResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Connectivity);
        }
        if op != "select" {
            self.calls.lock().push(format!("{}:{}", op, table));
        }
        if let Some(message) = self.rejected.get(table) {
            return Err(RemoteError::Rejected(message.clone()));
        }
        match self.rejected_calls.get(&(op.to_string(), table.to_string())) {
            Some(message) => Err(RemoteError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

fn row_id(row: &Value) -> String {
    row.get("id").map(identifier_string).unwrap_or_default()
}

fn merge(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (_, patch) => *target = patch,
    }
}

#[async_trait]
impl RemoteTransport for MemoryRemote {
    async fn select_all(&self, table: &str) -> RemoteResult<Vec<Value>> {
        self.check("select", table)?;
        Ok(self.rows(table))
    }

    async fn select_first(&self, table: &str) -> RemoteResult<Option<Value>> {
        self.check("select", table)?;
        Ok(self.rows(table).into_iter().next())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()> {
        self.check("insert", table)?;
        let mut existing = self.tables.entry(table.to_string()).or_default();
        for row in rows {
            let id = row_id(&row);
            if existing.iter().any(|r| row_id(r) == id) {
                return Err(RemoteError::Rejected(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table
                )));
            }
            existing.push(row);
        }
        Ok(())
    }

    async fn update_by_id(&self, table: &str, id: &str, row: Value) -> RemoteResult<()> {
        self.check("update", table)?;
        if let Some(mut rows) = self.tables.get_mut(table) {
            if let Some(target) = rows.iter_mut().find(|r| row_id(r) == id) {
                merge(target, row);
            }
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()> {
        self.check("upsert", table)?;
        let mut existing = self.tables.entry(table.to_string()).or_default();
        for row in rows {
            let id = row_id(&row);
            match existing.iter_mut().find(|r| row_id(r) == id) {
                Some(target) => merge(target, row),
                None => existing.push(row),
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &RowFilter) -> RemoteResult<()> {
        self.check("delete", table)?;
        if let Some(mut rows) = self.tables.get_mut(table) {
            rows.retain(|r| !filter.matches(&row_id(r)));
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        _content_type: &str,
    ) -> RemoteResult<String> {
        self.check("upload", bucket)?;
        let key = format!("{}/{}", bucket, path);
        self.objects.insert(key.clone(), body);
        Ok(format!("memory://{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_merges_by_id() {
        let remote = MemoryRemote::new();
        remote.seed("notes", vec![json!({ "id": 1, "student_id": "S1", "note": "a" })]);

        remote
            .upsert("notes", vec![json!({ "id": "1", "note": "b" })])
            .await
            .unwrap();

        let rows = remote.rows("notes");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["note"], "b");
        assert_eq!(rows[0]["student_id"], "S1");
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let remote = MemoryRemote::new();
        remote.insert("classes", vec![json!({ "id": "C1" })]).await.unwrap();
        let err = remote.insert("classes", vec![json!({ "id": "C1" })]).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let remote = MemoryRemote::new();
        remote.reject_table("students", "boom");
        assert_eq!(
            remote.select_all("students").await,
            Err(RemoteError::Rejected("boom".into()))
        );
        remote.accept_table("students");
        assert!(remote.select_all("students").await.is_ok());

        remote.set_offline(true);
        assert_eq!(remote.select_all("students").await, Err(RemoteError::Connectivity));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reject_single_operation() {
        let remote = MemoryRemote::new();
        remote.reject_call("upsert", "notes", "nope");

        assert!(remote.delete("notes", &RowFilter::IdNeq("0".into())).await.is_ok());
        assert_eq!(
            remote.upsert("notes", vec![json!({ "id": "n1" })]).await,
            Err(RemoteError::Rejected("nope".into()))
        );
        remote.accept_table("notes");
        assert!(remote.upsert("notes", vec![json!({ "id": "n1" })]).await.is_ok());
    }
}

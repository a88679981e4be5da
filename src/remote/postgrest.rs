//! Supabase/PostgREST transport over `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{RemoteError, RemoteResult, RemoteTransport, RowFilter};

/// Connection settings for the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub key: String,
}

impl RemoteConfig {
    pub fn new(url: impl AsRef<str>, key: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url.as_ref()),
            key: key.into().trim().to_string(),
        }
    }

    /// Whether the settings describe a usable connection.
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && !self.key.is_empty() && self.url != "https://" && self.key != "undefined"
    }
}

/// Trims, adds `https://` when no scheme is given and drops one trailing
/// slash.
pub fn normalize_url(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if url.is_empty() {
        return url;
    }
    if !url.starts_with("http") {
        url = format!("https://{}", url);
    }
    if url.ends_with('/') {
        url.pop();
    }
    url
}

pub struct PostgrestTransport {
    client: Client,
    config: RemoteConfig,
}

impl PostgrestTransport {
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.key))
    }

    /// Public URL of an object in a public bucket.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.config.url, bucket, path)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorized(request).send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(rejection(status, response.text().await.unwrap_or_default()))
    }
}

fn map_transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() {
        RemoteError::Connectivity
    } else {
        RemoteError::Rejected(err.to_string())
    }
}

/// Store message from an error body, or the status line.
fn rejection(status: StatusCode, body: String) -> RemoteError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Database Error ({})", status));
    RemoteError::Rejected(message)
}

/// PostgREST query parameter for a filter on `id`.
pub fn filter_param(filter: &RowFilter) -> (&'static str, String) {
    match filter {
        RowFilter::IdEq(id) => ("id", format!("eq.{}", id)),
        RowFilter::IdNeq(id) => ("id", format!("neq.{}", id)),
        RowFilter::IdIn(ids) => {
            let quoted: Vec<String> = ids
                .iter()
                .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
                .collect();
            ("id", format!("in.({})", quoted.join(",")))
        }
    }
}

#[async_trait]
impl RemoteTransport for PostgrestTransport {
    async fn select_all(&self, table: &str) -> RemoteResult<Vec<Value>> {
        let request = self.client.get(self.table_url(table)).query(&[("select", "*")]);
        let rows = self
            .send(request)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        debug!("Selected {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn select_first(&self, table: &str) -> RemoteResult<Option<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("limit", "1")]);
        let rows = self
            .send(request)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()> {
        let request = self.client.post(self.table_url(table)).json(&rows);
        self.send(request).await.map(|_| ())
    }

    async fn update_by_id(&self, table: &str, id: &str, row: Value) -> RemoteResult<()> {
        let (column, value) = filter_param(&RowFilter::IdEq(id.to_string()));
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&[(column, value)])
            .json(&row);
        self.send(request).await.map(|_| ())
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows);
        self.send(request).await.map(|_| ())
    }

    async fn delete(&self, table: &str, filter: &RowFilter) -> RemoteResult<()> {
        let (column, value) = filter_param(filter);
        let request = self.client.delete(self.table_url(table)).query(&[(column, value)]);
        self.send(request).await.map(|_| ())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> RemoteResult<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.config.url, bucket, path);
        let request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .header(header::CACHE_CONTROL, "3600")
            .body(body);
        self.send(request).await?;
        Ok(self.public_url(bucket, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_error_kinds() {
        let client = reqwest::Client::new();

        // nothing listens on port 1
        let refused = client.get("http://127.0.0.1:1/rest/v1/classes").send().await.unwrap_err();
        assert_eq!(map_transport_error(refused), RemoteError::Connectivity);

        let malformed = client.get("http://[::1/rest").send().await.unwrap_err();
        assert!(matches!(map_transport_error(malformed), RemoteError::Rejected(_)));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("  abc.supabase.co/ "), "https://abc.supabase.co");
        assert_eq!(normalize_url("http://localhost:54321"), "http://localhost:54321");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_config_validity() {
        assert!(RemoteConfig::new("abc.supabase.co", "anon").is_valid());
        assert!(!RemoteConfig::new("https://", "anon").is_valid());
        assert!(!RemoteConfig::new("abc.supabase.co", "undefined").is_valid());
        assert!(!RemoteConfig::new("", "anon").is_valid());
        assert!(!RemoteConfig::default().is_valid());
    }

    #[test]
    fn test_filter_params() {
        assert_eq!(filter_param(&RowFilter::IdEq("S1".into())), ("id", "eq.S1".to_string()));
        assert_eq!(filter_param(&RowFilter::IdNeq("0".into())), ("id", "neq.0".to_string()));
        assert_eq!(
            filter_param(&RowFilter::IdIn(vec!["a".into(), "b-1".into()])),
            ("id", "in.(\"a\",\"b-1\")".to_string())
        );
    }

    #[test]
    fn test_rejection_message() {
        let err = rejection(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value"}"#.to_string(),
        );
        assert_eq!(err, RemoteError::Rejected("duplicate key value".into()));

        let err = rejection(StatusCode::BAD_GATEWAY, "<html>".to_string());
        assert!(err.to_string().starts_with("Database Error"));
    }

    #[test]
    fn test_public_url() {
        let transport = PostgrestTransport::new(RemoteConfig::new("abc.supabase.co", "k")).unwrap();
        assert_eq!(
            transport.public_url("images", "school/a.jpg"),
            "https://abc.supabase.co/storage/v1/object/public/images/school/a.jpg"
        );
    }
}

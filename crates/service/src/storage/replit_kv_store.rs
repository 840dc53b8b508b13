use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::storage::kv_store::KvStore;

/// Client for the hosted Replit key-value database.
///
/// The database URL (normally `REPLIT_DB_URL`) carries its own credential in
/// the path. Wire format:
/// - `POST {url}` with form body `key=<json>` stores a value
/// - `GET {url}/{key}` returns the JSON text, 404 when absent
/// - `DELETE {url}/{key}` removes it
/// - `GET {url}?prefix=` lists keys, one per line
#[derive(Clone)]
pub struct ReplitKvStore {
    client: reqwest::Client,
    base_url: Url,
}

impl ReplitKvStore {
    /// Every request is capped by `request_timeout`, which also bounds writes
    /// that outlive a bulk-save deadline.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Arc<Self>, ServiceError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ServiceError::Validation(format!("invalid database url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Validation("database url cannot carry key paths".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        Ok(Arc::new(Self { client, base_url }))
    }

    fn key_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key);
        }
        url
    }
}

#[async_trait]
impl KvStore for ReplitKvStore {
    fn backend_name(&self) -> &'static str { "replit" }

    async fn get(&self, key: &str) -> Option<Value> {
        let resp = match self.client.get(self.key_url(key)).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(key, error = %e, "remote kv get failed");
                return None;
            }
        };
        if resp.status() == StatusCode::NOT_FOUND {
            return None;
        }
        if !resp.status().is_success() {
            warn!(key, status = %resp.status(), "remote kv get rejected");
            return None;
        }
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(key, error = %e, "remote kv body read failed");
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "remote kv value is not valid json");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<Value, ServiceError> {
        let body = serde_json::to_string(&value)?;
        self.client
            .post(self.base_url.clone())
            .form(&[(key, body.as_str())])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ServiceError::Storage(format!("remote kv set `{key}`: {e}")))?;
        debug!(key, bytes = body.len(), "remote kv value written");
        Ok(value)
    }

    async fn list(&self) -> Vec<String> {
        let resp = self
            .client
            .get(self.base_url.clone())
            .query(&[("prefix", "")])
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        let text = match resp {
            Ok(resp) => resp.text().await,
            Err(e) => Err(e),
        };
        match text {
            Ok(text) => text.lines().filter(|l| !l.is_empty()).map(str::to_string).collect(),
            Err(e) => {
                warn!(error = %e, "remote kv list failed");
                Vec::new()
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self.client.delete(self.key_url(key)).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => false,
            Ok(resp) => {
                warn!(key, status = %resp.status(), "remote kv delete rejected");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "remote kv delete failed");
                false
            }
        }
    }
}

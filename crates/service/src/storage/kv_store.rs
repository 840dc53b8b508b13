use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ServiceError;

/// Storage contract behind the bulk record operations.
///
/// Reads never fail: an unreadable or missing value is `None` and a failed
/// enumeration is an empty list, so callers fall back to defaults. Only
/// `set` reports errors, and each `set` replaces the whole value at once.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Short name reported by health and diagnostics endpoints.
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, returning it back on success.
    async fn set(&self, key: &str, value: Value) -> Result<Value, ServiceError>;

    async fn list(&self) -> Vec<String>;

    /// Remove `key`; true if something was removed.
    async fn delete(&self, key: &str) -> bool;
}

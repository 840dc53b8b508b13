#![cfg(test)]
use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ServiceError;
use crate::storage::{KvStore, MemoryKvStore};

/// Unique, not-yet-created path under the system temp dir.
pub fn temp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("svc_{}_{}", prefix, uuid::Uuid::new_v4()))
}

/// Memory store whose every operation first sleeps for `delay`.
pub struct SlowKvStore {
    pub inner: MemoryKvStore,
    delay: Duration,
}

impl SlowKvStore {
    pub fn new(delay: Duration) -> Self {
        Self { inner: MemoryKvStore::default(), delay }
    }
}

#[async_trait]
impl KvStore for SlowKvStore {
    fn backend_name(&self) -> &'static str { "slow" }

    async fn get(&self, key: &str) -> Option<Value> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<Value, ServiceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn list(&self) -> Vec<String> {
        tokio::time::sleep(self.delay).await;
        self.inner.list().await
    }

    async fn delete(&self, key: &str) -> bool {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }
}

/// Memory store that refuses writes to one key.
pub struct FailingKvStore {
    inner: MemoryKvStore,
    failing_key: String,
}

impl FailingKvStore {
    pub fn failing_on(key: &str) -> Self {
        Self { inner: MemoryKvStore::default(), failing_key: key.to_string() }
    }
}

#[async_trait]
impl KvStore for FailingKvStore {
    fn backend_name(&self) -> &'static str { "failing" }

    async fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<Value, ServiceError> {
        if key == self.failing_key {
            return Err(ServiceError::Storage(format!("write to `{key}` refused")));
        }
        self.inner.set(key, value).await
    }

    async fn list(&self) -> Vec<String> {
        self.inner.list().await
    }

    async fn delete(&self, key: &str) -> bool {
        self.inner.delete(key).await
    }
}

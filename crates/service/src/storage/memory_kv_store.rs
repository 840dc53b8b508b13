use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::ServiceError;
use crate::storage::kv_store::KvStore;

/// In-process store. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn backend_name(&self) -> &'static str { "memory" }

    async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) -> Result<Value, ServiceError> {
        self.inner.write().await.insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.remove(key).is_some()
    }
}

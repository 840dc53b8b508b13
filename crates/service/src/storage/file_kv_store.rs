use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::names::is_safe_file_name;
use crate::storage::kv_store::KvStore;

const EXT: &str = ".json";

/// File-backed key-value store: each key lives in `<dir>/<key>.json`.
///
/// Values are written pretty-printed to a temporary sibling and renamed into
/// place, so readers never observe a half-written record.
#[derive(Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open the store rooted at `dir`, creating the directory if missing.
    pub async fn new<P: Into<PathBuf>>(dir: P) -> Result<Arc<Self>, ServiceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Arc::new(Self { dir }))
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> Option<PathBuf> {
        is_safe_file_name(key).then(|| self.dir.join(format!("{key}{EXT}")))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    fn backend_name(&self) -> &'static str { "file" }

    async fn get(&self, key: &str) -> Option<Value> {
        let path = self.key_path(key)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "kv read failed");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "kv record is not valid json");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<Value, ServiceError> {
        let path = self
            .key_path(key)
            .ok_or_else(|| ServiceError::Validation(format!("invalid key `{key}`")))?;
        let data = serde_json::to_vec_pretty(&value)?;
        let tmp = self.dir.join(format!("{key}{EXT}.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(key, "kv record written");
        Ok(value)
    }

    async fn list(&self) -> Vec<String> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "kv list failed");
                return Vec::new();
            }
        };
        let mut keys = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name();
                    if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(EXT)) {
                        keys.push(key.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "kv list interrupted");
                    return Vec::new();
                }
            }
        }
        keys.sort();
        keys
    }

    async fn delete(&self, key: &str) -> bool {
        let Some(path) = self.key_path(key) else { return false };
        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key, error = %e, "kv delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;
    use serde_json::json;

    #[tokio::test]
    async fn file_kv_store_crud_persists() -> Result<(), anyhow::Error> {
        let dir = temp_dir("file_kv");
        let store = FileKvStore::new(&dir).await?;

        // initially empty
        assert!(store.list().await.is_empty());
        assert!(store.get("inventory").await.is_none());

        store.set("inventory", json!([{"sku": "A1", "qty": 4}])).await?;
        store.set("history", json!([])).await?;
        assert_eq!(store.list().await, vec!["history".to_string(), "inventory".to_string()]);

        // reopen to ensure persistence
        let reopened = FileKvStore::new(&dir).await?;
        assert_eq!(reopened.get("inventory").await, Some(json!([{"sku": "A1", "qty": 4}])));

        // overwrite
        reopened.set("inventory", json!([])).await?;
        assert_eq!(store.get("inventory").await, Some(json!([])));

        assert!(store.delete("history").await);
        assert!(!store.delete("history").await);
        assert_eq!(store.list().await, vec!["inventory".to_string()]);

        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_record_reads_as_absent() -> Result<(), anyhow::Error> {
        let dir = temp_dir("file_kv_corrupt");
        let store = FileKvStore::new(&dir).await?;
        tokio::fs::write(dir.join("customers.json"), b"{not json").await?;

        assert!(store.get("customers").await.is_none());
        assert_eq!(store.list().await, vec!["customers".to_string()]);

        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn unsafe_keys_are_rejected() -> Result<(), anyhow::Error> {
        let dir = temp_dir("file_kv_keys");
        let store = FileKvStore::new(&dir).await?;

        assert!(matches!(store.set("../escape", json!(1)).await, Err(ServiceError::Validation(_))));
        assert!(store.get("../escape").await.is_none());
        assert!(!store.delete("..").await);
        assert!(store.list().await.is_empty());

        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}

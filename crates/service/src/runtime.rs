//! Runtime environment helpers
//!
//! Picks the key-value backend from configuration and wraps the startup
//! directory checks from `common::env`.

use std::{path::Path, sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::storage::{FileKvStore, KvStore, MemoryKvStore, ReplitKvStore};

/// Where the record collections are kept.
#[derive(Clone, Debug)]
pub enum BackendChoice<'a> {
    Replit { url: &'a str, request_timeout: Duration },
    File { data_dir: &'a Path },
    Memory,
}

/// Ensure expected directories exist; the data directory matters only for the file backend.
pub async fn ensure_env(data_dir: &Path, invoices_dir: &Path, file_backend: bool) -> anyhow::Result<()> {
    common::env::ensure_env(data_dir, invoices_dir, file_backend).await
}

/// Build the configured backend and check that it answers.
pub async fn open_kv_store(choice: BackendChoice<'_>) -> Result<Arc<dyn KvStore>, ServiceError> {
    let store: Arc<dyn KvStore> = match choice {
        BackendChoice::Replit { url, request_timeout } => ReplitKvStore::new(url, request_timeout)?,
        BackendChoice::File { data_dir } => FileKvStore::new(data_dir).await?,
        BackendChoice::Memory => {
            warn!("memory backend selected; records are lost on restart");
            MemoryKvStore::new()
        }
    };
    // list 不会报错；这里只用来确认连通并打印已有的 key 数量
    let keys = store.list().await;
    info!(backend = store.backend_name(), keys = keys.len(), "key-value store ready");
    Ok(store)
}

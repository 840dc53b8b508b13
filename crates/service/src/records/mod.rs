//! Bulk persistence of the four business record collections.
//!
//! Save-all and load-all favour availability over consistency: a slow or
//! failing backend never turns into an error response. Save-all reports
//! success with a warning, load-all falls back to empty arrays.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::storage::KvStore;

const SAVED_MESSAGE: &str = "All data saved to database";
const WARNING_MESSAGE: &str = "Save operation completed with warnings";
const PROBE_KEY: &str = "test-key";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Inventory,
    Customers,
    Transactions,
    History,
}

impl Collection {
    /// Storage key, identical to the JSON field name.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Inventory => "inventory",
            Collection::Customers => "customers",
            Collection::Transactions => "transactions",
            Collection::History => "history",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Keeps "field present" (even as `null`) apart from "field absent".
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Body of `POST /api/save-all`. Absent fields leave their collection untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SaveAllInput {
    #[serde(default, deserialize_with = "present")]
    pub inventory: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub customers: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub transactions: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub history: Option<Value>,
}

impl SaveAllInput {
    /// Present collections in fixed order; an explicit `null` becomes `[]`.
    fn into_entries(self) -> Vec<(Collection, Value)> {
        [
            (Collection::Inventory, self.inventory),
            (Collection::Customers, self.customers),
            (Collection::Transactions, self.transactions),
            (Collection::History, self.history),
        ]
        .into_iter()
        .filter_map(|(c, v)| v.map(|v| (c, if v.is_null() { json!([]) } else { v })))
        .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SaveAllReport {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveAllReport {
    fn saved() -> Self {
        Self { success: true, message: SAVED_MESSAGE.into(), timestamp: Utc::now(), error: None }
    }

    pub fn with_warning(detail: String) -> Self {
        Self { success: true, message: WARNING_MESSAGE.into(), timestamp: Utc::now(), error: Some(detail) }
    }

    pub fn has_warning(&self) -> bool {
        self.error.is_some()
    }
}

/// Body of `GET /api/load-all`; every field is always an array.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LoadAllOutput {
    pub inventory: Vec<Value>,
    pub customers: Vec<Value>,
    pub transactions: Vec<Value>,
    pub history: Vec<Value>,
}

fn into_array(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn element_count(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

/// Result of the write/read/delete round trip behind `GET /api/test-db`.
#[derive(Clone, Debug, Serialize)]
pub struct ProbeReport {
    pub success: bool,
    pub message: String,
    pub write: String,
    pub read: Option<Value>,
    pub delete: String,
}

pub struct RecordsService {
    store: Arc<dyn KvStore>,
    timeout: Duration,
}

impl RecordsService {
    pub fn new(store: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Write every present collection concurrently under one deadline.
    ///
    /// Writes run as detached tasks. When the deadline passes the report
    /// carries a warning but the pending writes keep going and may still land
    /// after the caller has seen the response.
    pub async fn save_all(&self, input: SaveAllInput) -> SaveAllReport {
        let entries = input.into_entries();
        let counts: Vec<(Collection, usize)> = entries.iter().map(|(c, v)| (*c, element_count(v))).collect();

        let pending: Vec<(Collection, JoinHandle<Result<(), ServiceError>>)> = entries
            .into_iter()
            .map(|(collection, value)| {
                let store = Arc::clone(&self.store);
                let handle = tokio::spawn(async move { store.set(collection.key(), value).await.map(|_| ()) });
                (collection, handle)
            })
            .collect();

        let waited = tokio::time::timeout(self.timeout, async move {
            let mut failed = Vec::new();
            for (collection, handle) in pending {
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(%collection, error = %e, "error saving collection");
                        failed.push(collection);
                    }
                    Err(e) => {
                        error!(%collection, error = %e, "save task aborted");
                        failed.push(collection);
                    }
                }
            }
            failed
        })
        .await;

        let report = match waited {
            Ok(failed) if failed.is_empty() => SaveAllReport::saved(),
            Ok(failed) => {
                let names: Vec<&str> = failed.iter().map(|c| c.key()).collect();
                SaveAllReport::with_warning(format!("failed to save: {}", names.join(", ")))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "save operation timeout");
                SaveAllReport::with_warning("Save timeout".into())
            }
        };

        let count_of = |c: Collection| counts.iter().find(|(k, _)| *k == c).map(|(_, n)| *n);
        info!(
            event = "save_all",
            inventory = ?count_of(Collection::Inventory),
            customers = ?count_of(Collection::Customers),
            transactions = ?count_of(Collection::Transactions),
            history = ?count_of(Collection::History),
            warning = report.has_warning(),
            "database saved"
        );
        report
    }

    /// Read all four collections concurrently; any miss becomes `[]`.
    pub async fn load_all(&self) -> LoadAllOutput {
        let store = &self.store;
        let loaded = tokio::time::timeout(self.timeout, async {
            tokio::join!(
                store.get(Collection::Inventory.key()),
                store.get(Collection::Customers.key()),
                store.get(Collection::Transactions.key()),
                store.get(Collection::History.key()),
            )
        })
        .await;

        let output = match loaded {
            Ok((inventory, customers, transactions, history)) => LoadAllOutput {
                inventory: into_array(inventory),
                customers: into_array(customers),
                transactions: into_array(transactions),
                history: into_array(history),
            },
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "database load timeout, returning empty collections");
                LoadAllOutput::default()
            }
        };

        info!(
            event = "load_all",
            inventory = output.inventory.len(),
            customers = output.customers.len(),
            transactions = output.transactions.len(),
            history = output.history.len(),
            "database loaded"
        );
        output
    }

    /// Write, read back and delete a probe record.
    pub async fn probe(&self) -> Result<ProbeReport, ServiceError> {
        let record = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "message": "Database is working!",
        });
        self.store.set(PROBE_KEY, record).await?;
        let read = self.store.get(PROBE_KEY).await;
        let deleted = self.store.delete(PROBE_KEY).await;
        info!(event = "store_probe", backend = self.backend_name(), read_back = read.is_some(), deleted, "store probe finished");

        Ok(ProbeReport {
            success: true,
            message: "Database is fully operational!".into(),
            write: "Success".into(),
            read,
            delete: if deleted { "Success".into() } else { "Nothing removed".into() },
        })
    }
}

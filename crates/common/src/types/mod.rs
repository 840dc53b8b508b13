use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invoice directory summary embedded in the health report.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFolderHealth {
    pub folder: String,
    pub exists: bool,
    pub count: usize,
}

/// Body of `GET /health`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Health {
    pub status: String,
    pub message: String,
    pub database: String,
    pub invoices: InvoiceFolderHealth,
    pub time: DateTime<Utc>,
}

impl Health {
    pub fn ok(backend: &str, invoices: InvoiceFolderHealth) -> Self {
        Self {
            status: "OK".into(),
            message: format!("Server running with {backend} storage"),
            database: backend.to_string(),
            invoices,
            time: Utc::now(),
        }
    }
}

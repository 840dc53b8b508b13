use axum::{extract::State, Json};
use common::types::{Health, InvoiceFolderHealth};
use tracing::warn;

use crate::state::ServerState;

pub async fn health(State(state): State<ServerState>) -> Json<Health> {
    let invoices = match state.invoices.check_folder().await {
        Ok(report) => InvoiceFolderHealth {
            folder: report.invoices_folder,
            exists: report.folder_exists,
            count: report.pdf_count,
        },
        Err(e) => {
            warn!(error = %e, "invoices folder unreadable");
            InvoiceFolderHealth { folder: state.invoices.dir().display().to_string(), exists: false, count: 0 }
        }
    };
    Json(Health::ok(state.records.backend_name(), invoices))
}

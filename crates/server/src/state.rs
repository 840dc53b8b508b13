use std::sync::Arc;

use service::{invoices::InvoiceStore, records::RecordsService};

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct ServerState {
    pub records: Arc<RecordsService>,
    pub invoices: Arc<InvoiceStore>,
}

impl ServerState {
    pub fn new(records: RecordsService, invoices: InvoiceStore) -> Self {
        Self { records: Arc::new(records), invoices: Arc::new(invoices) }
    }
}

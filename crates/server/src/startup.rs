use std::net::SocketAddr;

use axum::Router;
use configs::{AppConfig, StorageBackend};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes;
use crate::state::ServerState;
use service::{
    invoices::InvoiceStore,
    records::RecordsService,
    runtime::{self, BackendChoice},
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bad listen address: {e}")))
}

/// Wire storage, records service and invoice store into a router.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let storage = &cfg.storage;
    let backend = storage.resolved_backend();

    runtime::ensure_env(&storage.data_dir, &cfg.invoices.dir, backend == StorageBackend::File).await?;

    let choice = match backend {
        StorageBackend::Replit => BackendChoice::Replit {
            url: storage
                .replit_db_url
                .as_deref()
                .ok_or_else(|| StartupError::InvalidConfig("replit backend without url".into()))?,
            request_timeout: storage.request_timeout(),
        },
        StorageBackend::File => BackendChoice::File { data_dir: &storage.data_dir },
        StorageBackend::Memory => BackendChoice::Memory,
    };
    let kv = runtime::open_kv_store(choice).await?;

    let records = RecordsService::new(kv, storage.bulk_timeout());
    let invoices = InvoiceStore::new(cfg.invoices.dir.clone(), cfg.invoices.url_prefix.clone());
    let state = ServerState::new(records, invoices);

    Ok(routes::build_router(state, build_cors(), cfg.server.max_body_bytes))
}

/// Public entry: build the app from a validated config and serve it
pub async fn run_with(cfg: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        backend = ?cfg.storage.resolved_backend(),
        invoices = %cfg.invoices.dir.display(),
        "mohsin traders backend started"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

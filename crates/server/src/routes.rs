use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::ServerState;

pub mod health;
pub mod invoices;
pub mod records;

/// Build the full application router: bulk records API, invoice files and diagnostics.
pub fn build_router(state: ServerState, cors: CorsLayer, max_body_bytes: usize) -> Router {
    let invoice_files = ServeDir::new(state.invoices.dir().to_path_buf());
    let invoice_prefix = state.invoices.url_prefix().to_string();

    // Bulk record collections
    let records_api = Router::new()
        .route("/api/save-all", post(records::save_all))
        .route("/api/load-all", get(records::load_all))
        .route("/api/test-db", get(records::test_db));

    // Invoice PDFs
    let invoice_routes = Router::new()
        .route("/save-pdf", post(invoices::save_pdf))
        .route("/invoices-list", get(invoices::list_invoices))
        .route("/download-invoice/:file_name", get(invoices::download_invoice))
        .route("/delete-invoice/:file_name", delete(invoices::delete_invoice))
        .route("/check-invoices", get(invoices::check_invoices))
        .route("/create-invoices-folder", get(invoices::create_invoices_folder));

    Router::new()
        .route("/health", get(health::health))
        .merge(records_api)
        .merge(invoice_routes)
        .nest_service(&invoice_prefix, invoice_files)
        .with_state(state)
        // 发票 PDF 以 base64 放在 JSON 里，默认 2MB 上限不够用
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 5xx 以 ERROR 记录
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

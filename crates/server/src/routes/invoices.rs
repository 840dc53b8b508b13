use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use service::invoices::{FolderReport, InvoiceEntry, SavedInvoice};
use tracing::info;

use crate::{errors::JsonApiError, state::ServerState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePdfInput {
    #[serde(default)]
    pub pdf_data: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SavePdfOutput {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub saved: SavedInvoice,
}

#[derive(Debug, Serialize)]
pub struct InvoiceList {
    pub success: bool,
    pub invoices: Vec<InvoiceEntry>,
}

#[derive(Debug, Serialize)]
pub struct FolderCheck {
    pub success: bool,
    #[serde(flatten)]
    pub report: FolderReport,
}

#[derive(Debug, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

pub async fn save_pdf(
    State(state): State<ServerState>,
    body: Result<Json<SavePdfInput>, JsonRejection>,
) -> Result<Json<SavePdfOutput>, JsonApiError> {
    let Json(input) = body?;
    let saved = state
        .invoices
        .save(input.pdf_data.as_deref(), input.file_name.as_deref())
        .await?;
    Ok(Json(SavePdfOutput { success: true, message: "PDF saved successfully", saved }))
}

pub async fn list_invoices(State(state): State<ServerState>) -> Result<Json<InvoiceList>, JsonApiError> {
    let invoices = state.invoices.list().await?;
    Ok(Json(InvoiceList { success: true, invoices }))
}

/// Send the PDF as an attachment.
pub async fn download_invoice(
    State(state): State<ServerState>,
    Path(file_name): Path<String>,
) -> Result<Response, JsonApiError> {
    let bytes = state.invoices.read(&file_name).await?;
    info!(event = "pdf_download", file = %file_name, size = bytes.len(), "invoice downloaded");
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
    ];
    Ok((headers, bytes).into_response())
}

pub async fn delete_invoice(
    State(state): State<ServerState>,
    Path(file_name): Path<String>,
) -> Result<Json<Outcome>, JsonApiError> {
    if state.invoices.delete(&file_name).await? {
        Ok(Json(Outcome { success: true, message: "Invoice deleted successfully", path: None }))
    } else {
        Err(JsonApiError::new(StatusCode::NOT_FOUND, "Not Found", "File not found"))
    }
}

pub async fn check_invoices(State(state): State<ServerState>) -> Result<Json<FolderCheck>, JsonApiError> {
    let report = state.invoices.check_folder().await?;
    Ok(Json(FolderCheck { success: true, report }))
}

pub async fn create_invoices_folder(State(state): State<ServerState>) -> Result<Json<Outcome>, JsonApiError> {
    let created = state.invoices.ensure_folder().await?;
    let message = if created { "Invoices folder created!" } else { "Invoices folder already exists" };
    Ok(Json(Outcome {
        success: true,
        message,
        path: Some(state.invoices.dir().display().to_string()),
    }))
}

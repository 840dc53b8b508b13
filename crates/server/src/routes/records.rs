use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use service::records::{LoadAllOutput, ProbeReport, SaveAllInput, SaveAllReport};
use tracing::{error, warn};

use crate::{errors::JsonApiError, state::ServerState};

/// Save every collection present in the body. Always answers `success: true`;
/// storage trouble and unreadable bodies show up as `message`/`error` warnings.
pub async fn save_all(
    State(state): State<ServerState>,
    body: Result<Json<SaveAllInput>, JsonRejection>,
) -> Json<SaveAllReport> {
    match body {
        Ok(Json(input)) => Json(state.records.save_all(input).await),
        Err(rejection) => {
            // nothing is written for a body we cannot read
            let detail = rejection.body_text();
            warn!(event = "save_all", status = rejection.status().as_u16(), error = %detail, "save-all body ignored");
            Json(SaveAllReport::with_warning(detail))
        }
    }
}

/// Load all four collections, each guaranteed to be an array.
pub async fn load_all(State(state): State<ServerState>) -> Json<LoadAllOutput> {
    Json(state.records.load_all().await)
}

pub async fn test_db(State(state): State<ServerState>) -> Result<Json<ProbeReport>, JsonApiError> {
    state.records.probe().await.map(Json).map_err(|e| {
        error!(backend = state.records.backend_name(), error = %e, "database self-test failed");
        JsonApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Database error", e.to_string())
    })
}

//! Reload endpoint.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Query parameters for reload.
#[derive(Debug, Default, Deserialize)]
pub struct ReloadQuery {
    #[serde(default)]
    pub uuid: String,
}

/// Reload response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// `OK` or `Error`.
    pub status: String,
    /// Address pattern handed to the reload script, empty when nothing ran.
    pub target: String,
    /// Status lines reported by the reload script.
    pub msg: Vec<String>,
}

/// POST or GET /reload - reload every process affected by the session's uploads.
pub async fn reload_handler(
    State(state): State<AppState>,
    Query(query): Query<ReloadQuery>,
) -> Result<Response> {
    if query.uuid.is_empty() {
        return Err(ServerError::Forbidden(
            "Please upload config first".to_string(),
        ));
    }

    let outcome = state.coordinator.reload(&query.uuid).await?;
    let (status, label) = if outcome.success() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Error")
    };
    info!(session = %query.uuid, target = %outcome.target, status = label, "Reload finished");

    let body = ReloadResponse {
        status: label.to_string(),
        target: outcome.target.expression().unwrap_or_default(),
        msg: outcome.report.lines,
    };
    Ok((status, Json(body)).into_response())
}

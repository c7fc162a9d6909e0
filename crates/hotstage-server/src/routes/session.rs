//! Session status endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use hotstage_reload::SessionStatus;
use hotstage_session::StoreStats;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub uuid: String,
}

/// Session status plus store statistics.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub status: SessionStatus,
    pub store: StoreStats,
}

/// GET /session - state of the staging slot as seen by `uuid`.
pub async fn session_status_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<SessionResponse> {
    let status = state.coordinator.status(&query.uuid);
    Json(SessionResponse {
        status,
        store: state.coordinator.store().stats(),
    })
}

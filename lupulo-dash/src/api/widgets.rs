//! Widget snapshot and layout endpoints

use axum::{extract::State, http::StatusCode, Json};
use lupulo_common::events::LayoutReport;
use tracing::{error, info};

use super::StatusResponse;
use crate::dashboard::DashboardSnapshot;
use crate::layout::LayoutEnvelope;
use crate::AppState;

/// GET /api/widgets - Frames from the most recent tick
pub async fn get_widgets(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.runtime.snapshot())
}

/// POST /api/layouts - Apply a layout envelope
///
/// Per-layout failures are part of the report, not an HTTP error.
pub async fn apply_layouts(
    State(state): State<AppState>,
    Json(envelope): Json<LayoutEnvelope>,
) -> Result<Json<LayoutReport>, (StatusCode, Json<StatusResponse>)> {
    info!(
        "Layout request: {} added, {} changed, {} removed",
        envelope.added.len(),
        envelope.changed.len(),
        envelope.removed.len()
    );

    match state.runtime.apply_layouts(envelope).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Failed to apply layouts: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse::error(e)),
            ))
        }
    }
}

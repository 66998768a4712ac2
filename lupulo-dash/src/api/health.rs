//! Liveness and dashboard summary

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Device whose streams the widgets are bound to
    pub device: Option<String>,
    pub devices: usize,
    pub widgets: usize,
    /// Connected UI stream clients
    pub ui_clients: usize,
}

/// GET /health
///
/// Reads the last published snapshot, so it answers even while the
/// runtime loop is busy.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.runtime.snapshot();
    Json(HealthResponse {
        status: "ok",
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        device: snapshot.device,
        devices: snapshot.devices.len(),
        widgets: snapshot.widgets.len(),
        ui_clients: state.bus.subscriber_count(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

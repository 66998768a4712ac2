//! Device listing and selection

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::StatusResponse;
use crate::error::DashError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub selected: Option<String>,
    pub available: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectDeviceRequest {
    pub device: String,
}

/// GET /api/devices
pub async fn list_devices(State(state): State<AppState>) -> Json<DeviceListResponse> {
    let snapshot = state.runtime.snapshot();
    Json(DeviceListResponse {
        selected: snapshot.device,
        available: snapshot.devices,
    })
}

/// POST /api/device - Rebind every widget to another device
pub async fn select_device(
    State(state): State<AppState>,
    Json(req): Json<SelectDeviceRequest>,
) -> Result<Json<DeviceListResponse>, (StatusCode, Json<StatusResponse>)> {
    info!("Select device request: {}", req.device);

    match state.runtime.select_device(&req.device).await {
        Ok(()) => {
            let snapshot = state.runtime.snapshot();
            Ok(Json(DeviceListResponse {
                selected: snapshot.device,
                available: snapshot.devices,
            }))
        }
        Err(e @ DashError::UnknownDevice(_)) => {
            Err((StatusCode::NOT_FOUND, Json(StatusResponse::error(e))))
        }
        Err(e) => {
            error!("Failed to select device: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse::error(e)),
            ))
        }
    }
}

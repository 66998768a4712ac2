//! HTTP API handlers

pub mod devices;
pub mod health;
pub mod sse;
pub mod widgets;

pub use devices::{list_devices, select_device};
pub use health::health_routes;
pub use sse::event_stream;
pub use widgets::{apply_layouts, get_widgets};

use serde::{Deserialize, Serialize};

/// Generic status body for errors and acknowledgements
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            status: format!("error: {}", message),
        }
    }
}

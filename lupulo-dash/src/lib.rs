//! lupulo-dash library - live dashboard service
//!
//! Builds widgets from layout descriptors announced by a data source, binds
//! them to the selected device's event stream and repaints them on a fixed
//! tick. Frames, notices and lifecycle events are published to UI clients
//! over SSE.

use axum::Router;
use lupulo_common::events::EventBus;
use std::sync::Arc;

pub mod accessor;
pub mod api;
pub mod dashboard;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod layout;
pub mod runtime;
pub mod source;
pub mod widget;

pub use dashboard::{Dashboard, DashboardSnapshot};
pub use error::{DashError, Result};
pub use runtime::{Runtime, RuntimeHandle};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus feeding SSE clients
    pub bus: Arc<EventBus>,
    /// Handle to the loop that owns the dashboard
    pub runtime: RuntimeHandle,
}

impl AppState {
    pub fn new(bus: Arc<EventBus>, runtime: RuntimeHandle) -> Self {
        Self { bus, runtime }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let api = Router::new()
        .route("/api/widgets", get(api::get_widgets))
        .route("/api/devices", get(api::list_devices))
        .route("/api/device", post(api::select_device))
        .route("/api/layouts", post(api::apply_layouts))
        .route("/api/events", get(api::event_stream));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! Server-Sent Events stream for dashboard UIs

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events
///
/// Streams every DashEvent: FramesPainted, Notice, LayoutsApplied,
/// DeviceSelected, DevicesChanged and SourceStatus.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    lupulo_common::sse::event_bus_sse_stream(&state.bus)
}

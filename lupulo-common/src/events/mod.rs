//! Event types for the lupulo event system
//!
//! Provides the dashboard event definitions and the EventBus that carries
//! them from the runtime loop to SSE clients.

mod frame_types;
mod notice_types;

pub use frame_types::{Anchor, BatteryBand, Frame, LineSeries, WidgetFrame};
pub use notice_types::{FailedLayout, LayoutReport, Notice, NoticeLevel};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Dashboard event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// The SSE event name is [`DashEvent::event_type`], the data is the JSON
/// encoding of the whole event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashEvent {
    /// Widgets repainted on a tick
    FramesPainted {
        /// Frames of every widget painted on this tick
        frames: Vec<WidgetFrame>,
        /// Tick timestamp
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Warning banner entry (missing data, unknown type, malformed layout)
    Notice {
        notice: Notice,
    },

    /// A layout envelope was applied
    LayoutsApplied {
        report: LayoutReport,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The active device changed
    ///
    /// `device` is None when the selected device disappeared and no other
    /// device is available.
    DeviceSelected {
        device: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The set of known devices changed
    DevicesChanged {
        /// All known device ids, sorted
        devices: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upstream source connection status
    SourceStatus {
        connected: bool,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DashEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            DashEvent::FramesPainted { .. } => "FramesPainted",
            DashEvent::Notice { .. } => "Notice",
            DashEvent::LayoutsApplied { .. } => "LayoutsApplied",
            DashEvent::DeviceSelected { .. } => "DeviceSelected",
            DashEvent::DevicesChanged { .. } => "DevicesChanged",
            DashEvent::SourceStatus { .. } => "SourceStatus",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the runtime loop)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lupulo_common::events::{DashEvent, EventBus};
/// use std::sync::Arc;
///
/// let event_bus = Arc::new(EventBus::new(1000));
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(DashEvent::DeviceSelected {
///     device: Some("1".to_string()),
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "DeviceSelected");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DashEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DashEvent,
    ) -> Result<usize, broadcast::error::SendError<DashEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Frames and notices are published this way: a dashboard with no
    /// connected UI is normal.
    pub fn emit_lossy(&self, event: DashEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

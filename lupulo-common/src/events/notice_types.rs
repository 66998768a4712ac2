//! User-visible warnings and layout application reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A warning banner entry
///
/// Missing payload data, unknown widget or accessor types and malformed
/// layouts all surface as notices. None of them stop the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    /// Widget the notice concerns, if any
    pub widget: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn warning(widget: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            widget: widget.map(str::to_string),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(widget: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            widget: widget.map(str::to_string),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of applying one layout envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<FailedLayout>,
}

impl LayoutReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
            && self.failed.is_empty()
    }
}

/// A layout that could not be turned into a widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedLayout {
    pub name: String,
    pub reason: String,
}

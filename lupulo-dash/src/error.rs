//! Error types for lupulo-dash
//!
//! Layout and registry errors are per-widget: the dashboard reports them as
//! notices and keeps running. Only startup failures reach `main`.

use thiserror::Error;

/// Main error type for the dashboard
#[derive(Error, Debug)]
pub enum DashError {
    /// Layout descriptor missing required fields or carrying invalid values
    #[error("Malformed layout '{name}': {reason}")]
    MalformedLayout { name: String, reason: String },

    /// Widget type name not present in the widget registry
    #[error("Unknown widget type: {0}")]
    UnknownWidgetType(String),

    /// Accessor type tag not present in the accessor registry
    #[error("Unknown accessor type: {0}")]
    UnknownAccessorType(String),

    /// Device id not announced by the source
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Upstream source connection errors
    #[error("Source error: {0}")]
    Source(#[from] reqwest::Error),

    /// Runtime loop no longer running
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Errors from lupulo-common (config, JSON, I/O)
    #[error(transparent)]
    Common(#[from] lupulo_common::Error),
}

impl DashError {
    pub fn malformed(name: &str, reason: impl Into<String>) -> Self {
        DashError::MalformedLayout {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience Result type using DashError
pub type Result<T> = std::result::Result<T, DashError>;

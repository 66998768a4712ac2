//! Rendered widget frames
//!
//! A frame is the serializable rendering surface of one widget: what a UI
//! would draw after the most recent tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Widget anchor point on the dashboard canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

/// One painted widget, addressed by layout name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetFrame {
    /// Layout name (unique per dashboard)
    pub name: String,
    /// Widget type name as given in the layout
    pub widget_type: String,
    /// Instance id, changes whenever the widget is recreated
    pub instance_id: Uuid,
    /// Binding generation of the instance
    pub generation: u64,
    pub anchor: Anchor,
    /// Device the widget is bound to
    pub device: Option<String>,
    pub frame: Frame,
}

/// Renderer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Nothing painted yet
    Blank,

    /// Numeric read-outs, one per accessor
    Digital { values: Vec<String> },

    /// Streaming line chart over a sliding time window
    MultipleLine {
        /// Window length in seconds
        seconds: f64,
        /// Y axis `[min, max]`
        range: [f64; 2],
        lines: Vec<LineSeries>,
    },

    /// Charge level gauge
    Battery {
        /// Level in percent (0-100)
        level: f64,
        band: BatteryBand,
        color: String,
    },
}

/// A single line of a multiple_line chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSeries {
    pub color: String,
    /// `[t, y]` pairs, t in seconds since dashboard start
    pub points: Vec<[f64; 2]>,
}

/// Battery level band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryBand {
    Low,
    Medium,
    High,
}

impl fmt::Display for BatteryBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryBand::Low => write!(f, "low"),
            BatteryBand::Medium => write!(f, "medium"),
            BatteryBand::High => write!(f, "high"),
        }
    }
}

//! Widget renderers
//!
//! A renderer owns a widget's rendering surface. It is painted with the
//! accessor outputs on every tick and exposes the result as a [`Frame`].

mod battery;
mod digital;
mod multiple_line;

pub use battery::Battery;
pub use digital::{Digital, MAX_DIGITS};
pub use multiple_line::MultipleLine;

use lupulo_common::events::Frame;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

/// Rendering surface of one widget
pub trait Renderer: Debug + Send {
    /// Update the surface from this tick's accessor outputs
    ///
    /// `now` is the time since the dashboard started.
    fn paint(&mut self, values: &[Value], now: Duration);

    /// Drop everything painted so far
    fn clear(&mut self);

    /// Current surface contents
    fn frame(&self) -> Frame;
}

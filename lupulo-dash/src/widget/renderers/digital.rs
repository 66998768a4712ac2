//! Numeric read-out display

use super::Renderer;
use crate::error::{DashError, Result};
use crate::layout::Layout;
use lupulo_common::events::Frame;
use serde_json::Value;
use std::time::Duration;

/// Shown for values that are not numbers
const NOT_A_NUMBER: &str = "--";

/// Upper bound for both `digits` and `precision`
pub const MAX_DIGITS: usize = 32;

/// Zero-padded read-outs, one per accessor
///
/// Params: `digits` (integer digits, default 1), `precision` (decimals,
/// default 0).
#[derive(Debug)]
pub struct Digital {
    digits: usize,
    precision: usize,
    values: Vec<String>,
}

impl Digital {
    pub fn from_layout(layout: &Layout) -> Result<Self> {
        let digits = layout.param_usize("digits")?.unwrap_or(1);
        let precision = layout.param_usize("precision")?.unwrap_or(0);
        for (key, value) in [("digits", digits), ("precision", precision)] {
            if value > MAX_DIGITS {
                return Err(DashError::malformed(
                    &layout.name,
                    format!("'{}' must be at most {}, got {}", key, MAX_DIGITS, value),
                ));
            }
        }
        Ok(Self::new(digits, precision))
    }

    /// Both arguments are capped at [`MAX_DIGITS`]
    pub fn new(digits: usize, precision: usize) -> Self {
        Self {
            digits: digits.min(MAX_DIGITS),
            precision: precision.min(MAX_DIGITS),
            values: Vec::new(),
        }
    }

    fn format(&self, value: &Value) -> String {
        let Some(number) = value.as_f64() else {
            return NOT_A_NUMBER.to_string();
        };
        let width = if self.precision > 0 {
            self.digits
                .checked_add(self.precision)
                .and_then(|w| w.checked_add(1))
                .unwrap_or(self.digits)
        } else {
            self.digits
        };
        let body = format!(
            "{:0width$.prec$}",
            number.abs(),
            width = width,
            prec = self.precision
        );
        if number < 0.0 {
            format!("-{}", body)
        } else {
            body
        }
    }
}

impl Renderer for Digital {
    fn paint(&mut self, values: &[Value], _now: Duration) {
        self.values = values.iter().map(|v| self.format(v)).collect();
    }

    fn clear(&mut self) {
        self.values.clear();
    }

    fn frame(&self) -> Frame {
        if self.values.is_empty() {
            Frame::Blank
        } else {
            Frame::Digital {
                values: self.values.clone(),
            }
        }
    }
}

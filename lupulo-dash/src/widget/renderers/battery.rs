//! Battery level gauge

use super::Renderer;
use crate::error::{DashError, Result};
use crate::layout::Layout;
use lupulo_common::events::{BatteryBand, Frame};
use serde_json::Value;
use std::time::Duration;

/// Charge gauge driven by the first accessor
///
/// Params: `thresholds` (`[low, high]`, default `[20, 50]`), `colors`
/// (`[low, medium, high]`, default red/orange/green).
#[derive(Debug)]
pub struct Battery {
    thresholds: [f64; 2],
    colors: [String; 3],
    level: Option<f64>,
}

impl Battery {
    pub fn from_layout(layout: &Layout) -> Result<Self> {
        let thresholds = layout.param_pair("thresholds")?.unwrap_or([20.0, 50.0]);
        if thresholds[0] > thresholds[1] {
            return Err(DashError::malformed(
                &layout.name,
                "'thresholds' must be [low, high] with low <= high",
            ));
        }

        let colors = match layout.param_strings("colors")? {
            None => default_colors(),
            Some(colors) => match <[String; 3]>::try_from(colors) {
                Ok(colors) => colors,
                Err(_) => {
                    return Err(DashError::malformed(
                        &layout.name,
                        "'colors' must list exactly three colors",
                    ))
                }
            },
        };

        Ok(Self {
            thresholds,
            colors,
            level: None,
        })
    }

    pub fn band(&self, level: f64) -> BatteryBand {
        if level < self.thresholds[0] {
            BatteryBand::Low
        } else if level < self.thresholds[1] {
            BatteryBand::Medium
        } else {
            BatteryBand::High
        }
    }
}

fn default_colors() -> [String; 3] {
    ["red".to_string(), "orange".to_string(), "green".to_string()]
}

impl Renderer for Battery {
    fn paint(&mut self, values: &[Value], _now: Duration) {
        if let Some(level) = values.first().and_then(Value::as_f64) {
            self.level = Some(level.clamp(0.0, 100.0));
        }
    }

    fn clear(&mut self) {
        self.level = None;
    }

    fn frame(&self) -> Frame {
        match self.level {
            None => Frame::Blank,
            Some(level) => {
                let band = self.band(level);
                let color = match band {
                    BatteryBand::Low => &self.colors[0],
                    BatteryBand::Medium => &self.colors[1],
                    BatteryBand::High => &self.colors[2],
                };
                Frame::Battery {
                    level,
                    band,
                    color: color.clone(),
                }
            }
        }
    }
}

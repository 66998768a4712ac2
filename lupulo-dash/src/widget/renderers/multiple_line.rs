//! Streaming line chart over a sliding time window

use super::Renderer;
use crate::error::{DashError, Result};
use crate::layout::Layout;
use lupulo_common::events::{Frame, LineSeries};
use lupulo_common::time::duration_secs;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

const PALETTE: [&str; 6] = [
    "steelblue",
    "darkorange",
    "seagreen",
    "crimson",
    "slateblue",
    "goldenrod",
];

/// One line per accessor, one point per line per paint
///
/// Params: `seconds` (window, required), `range` (`[min, max]`, required),
/// `colors` (optional, cycled).
#[derive(Debug)]
pub struct MultipleLine {
    seconds: f64,
    range: [f64; 2],
    colors: Vec<String>,
    lines: Vec<VecDeque<[f64; 2]>>,
}

impl MultipleLine {
    pub fn from_layout(layout: &Layout) -> Result<Self> {
        let seconds = layout
            .param_f64("seconds")?
            .ok_or_else(|| DashError::malformed(&layout.name, "multiple_line needs 'seconds'"))?;
        let range = layout
            .param_pair("range")?
            .ok_or_else(|| DashError::malformed(&layout.name, "multiple_line needs 'range'"))?;
        let colors = layout.param_strings("colors")?.unwrap_or_default();
        Self::new(seconds, range, colors).map_err(|reason| DashError::malformed(&layout.name, reason))
    }

    pub fn new(seconds: f64, range: [f64; 2], colors: Vec<String>) -> std::result::Result<Self, String> {
        if !(seconds > 0.0) {
            return Err(format!("'seconds' must be > 0, got {}", seconds));
        }
        if !(range[0] < range[1]) {
            return Err(format!("'range' must be [min, max] with min < max, got {:?}", range));
        }
        Ok(Self {
            seconds,
            range,
            colors,
            lines: Vec::new(),
        })
    }

    fn color(&self, line: usize) -> String {
        if self.colors.is_empty() {
            PALETTE[line % PALETTE.len()].to_string()
        } else {
            self.colors[line % self.colors.len()].clone()
        }
    }
}

impl Renderer for MultipleLine {
    fn paint(&mut self, values: &[Value], now: Duration) {
        let t = duration_secs(now);
        if self.lines.len() != values.len() {
            self.lines.resize_with(values.len(), VecDeque::new);
        }

        let [min, max] = self.range;
        for (line, value) in self.lines.iter_mut().zip(values) {
            if let Some(y) = value.as_f64() {
                line.push_back([t, y.clamp(min, max)]);
            }
        }

        let oldest = t - self.seconds;
        for line in &mut self.lines {
            while line.front().is_some_and(|point| point[0] < oldest) {
                line.pop_front();
            }
        }
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn frame(&self) -> Frame {
        if self.lines.is_empty() {
            return Frame::Blank;
        }
        Frame::MultipleLine {
            seconds: self.seconds,
            range: self.range,
            lines: self
                .lines
                .iter()
                .enumerate()
                .map(|(i, points)| LineSeries {
                    color: self.color(i),
                    points: points.iter().copied().collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn points(frame: &Frame) -> Vec<Vec<[f64; 2]>> {
        match frame {
            Frame::MultipleLine { lines, .. } => lines.iter().map(|l| l.points.clone()).collect(),
            other => panic!("expected multiple_line frame, got {:?}", other),
        }
    }

    #[test]
    fn test_window_drops_old_points() {
        let mut chart = MultipleLine::new(2.0, [0.0, 100.0], vec![]).unwrap();
        for s in 0..5 {
            chart.paint(&[json!(s * 10)], Duration::from_secs(s));
        }
        // t=4, window 2s keeps t >= 2
        assert_eq!(
            points(&chart.frame()),
            vec![vec![[2.0, 20.0], [3.0, 30.0], [4.0, 40.0]]]
        );
    }

    #[test]
    fn test_values_clamped_and_non_numeric_skipped() {
        let mut chart = MultipleLine::new(10.0, [0.0, 50.0], vec!["red".into()]).unwrap();
        chart.paint(&[json!(80), json!(-3), json!("n/a")], Duration::from_secs(1));
        let frame = chart.frame();
        assert_eq!(
            points(&frame),
            vec![vec![[1.0, 50.0]], vec![[1.0, 0.0]], vec![]]
        );
        match frame {
            Frame::MultipleLine { lines, .. } => {
                assert_eq!(lines[0].color, "red");
                assert_eq!(lines[1].color, "red");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_invalid_params() {
        assert!(MultipleLine::new(0.0, [0.0, 1.0], vec![]).is_err());
        assert!(MultipleLine::new(5.0, [1.0, 1.0], vec![]).is_err());
        assert!(MultipleLine::new(f64::NAN, [0.0, 1.0], vec![]).is_err());
    }

    #[test]
    fn test_clear_blanks_frame() {
        let mut chart = MultipleLine::new(5.0, [0.0, 1.0], vec![]).unwrap();
        chart.paint(&[json!(0.5)], Duration::from_secs(1));
        chart.clear();
        assert_eq!(chart.frame(), Frame::Blank);
    }
}

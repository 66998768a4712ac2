//! Warning banner collection
//!
//! Recoverable problems (missing payload data, unknown types, malformed
//! layouts) are logged and collected as notices. The runtime drains them after
//! every step and publishes them on the EventBus.

use lupulo_common::events::Notice;
use std::collections::HashSet;
use tracing::{error, warn};

/// Notice collector, deduplicated between drains
#[derive(Debug, Default)]
pub struct Diagnostics {
    notices: Vec<Notice>,
    seen: HashSet<(Option<String>, String)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, widget: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        if self.first_sighting(widget, &message) {
            match widget {
                Some(name) => warn!(widget = name, "{}", message),
                None => warn!("{}", message),
            }
            self.notices.push(Notice::warning(widget, message));
        }
    }

    pub fn error(&mut self, widget: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        if self.first_sighting(widget, &message) {
            match widget {
                Some(name) => error!(widget = name, "{}", message),
                None => error!("{}", message),
            }
            self.notices.push(Notice::error(widget, message));
        }
    }

    /// Take every notice collected since the last drain
    pub fn drain(&mut self) -> Vec<Notice> {
        self.seen.clear();
        std::mem::take(&mut self.notices)
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    fn first_sighting(&mut self, widget: Option<&str>, message: &str) -> bool {
        self.seen
            .insert((widget.map(str::to_string), message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lupulo_common::events::NoticeLevel;

    #[test]
    fn test_duplicates_suppressed_until_drain() {
        let mut diag = Diagnostics::new();
        diag.warn(Some("w"), "missing key 'level'");
        diag.warn(Some("w"), "missing key 'level'");
        diag.warn(Some("other"), "missing key 'level'");
        assert_eq!(diag.len(), 2);

        let drained = diag.drain();
        assert_eq!(drained.len(), 2);
        assert!(diag.is_empty());

        diag.warn(Some("w"), "missing key 'level'");
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_error_level() {
        let mut diag = Diagnostics::new();
        diag.error(None, "malformed layout");
        let notices = diag.drain();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].widget.is_none());
    }
}

//! Accessors: value extraction from event payloads
//!
//! An accessor pulls one value out of a widget's `jdata` (last payload per
//! logical event name). Every stage keeps the last value it extracted
//! successfully; when data is missing the accessor answers with that value
//! and reports a warning instead of failing.
//!
//! Chained accessors (`after`) feed the output of one stage to the next as
//! that stage's whole payload.

mod builder;
mod registry;

pub use builder::{accessor_events, build_accessors, MAX_ACCESSORS};
pub use registry::{AccessorKind, AccessorRegistry};

use crate::diagnostics::Diagnostics;
use serde_json::Value;
use std::collections::HashMap;

/// Last payload per logical event name
pub type JData = HashMap<String, Value>;

/// What one stage reads from its payload
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selector {
    Index(usize),
    Key(String),
    Whole,
}

/// A built accessor (possibly a chain of stages)
#[derive(Debug, Clone)]
pub struct Accessor {
    event: String,
    kind: AccessorKind,
    selector: Selector,
    cached: Value,
    next: Option<Box<Accessor>>,
}

impl Accessor {
    pub(crate) fn new(event: &str, kind: AccessorKind, selector: Selector) -> Self {
        Self {
            event: event.to_string(),
            kind,
            selector,
            cached: Value::from(0),
            next: None,
        }
    }

    pub(crate) fn chained(mut self, next: Accessor) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    /// Logical event name the first stage reads
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn kind(&self) -> AccessorKind {
        self.kind
    }

    /// Number of stages in the chain
    pub fn depth(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |next| next.depth())
    }

    /// Last complete output of the chain
    pub fn last_value(&self) -> &Value {
        match &self.next {
            Some(next) => next.last_value(),
            None => &self.cached,
        }
    }

    /// Extract from a widget's jdata
    ///
    /// `jdata` is `None` when the widget has not received anything yet.
    pub fn extract(&mut self, jdata: Option<&JData>, widget: &str, diag: &mut Diagnostics) -> Value {
        let payload = jdata.and_then(|data| data.get(&self.event));
        self.extract_payload(payload, widget, diag)
    }

    fn extract_payload(
        &mut self,
        payload: Option<&Value>,
        widget: &str,
        diag: &mut Diagnostics,
    ) -> Value {
        match self.select(payload) {
            Ok(value) => {
                self.cached = value.clone();
                match self.next.as_mut() {
                    Some(next) => next.extract_payload(Some(&value), widget, diag),
                    None => value,
                }
            }
            Err(reason) => {
                diag.warn(Some(widget), format!("{}, keeping last value", reason));
                self.last_value().clone()
            }
        }
    }

    fn select(&self, payload: Option<&Value>) -> std::result::Result<Value, String> {
        let payload = match payload {
            None | Some(Value::Null) => {
                return Err(format!("no data for event '{}'", self.event));
            }
            Some(payload) => payload,
        };

        let found = match &self.selector {
            Selector::Whole => Some(payload),
            Selector::Index(i) => payload.as_array().and_then(|items| items.get(*i)),
            Selector::Key(key) => payload.as_object().and_then(|map| map.get(key)),
        };

        match found {
            Some(Value::Null) | None => Err(match &self.selector {
                Selector::Index(i) => format!("index {} missing in event '{}'", i, self.event),
                Selector::Key(key) => format!("key '{}' missing in event '{}'", key, self.event),
                Selector::Whole => format!("no data for event '{}'", self.event),
            }),
            Some(value) => Ok(value.clone()),
        }
    }
}

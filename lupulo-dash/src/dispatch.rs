//! Dispatch bridge: physical event name → registered widget listeners
//!
//! Data events arrive under device-scoped physical names
//! (`id<device>-<source>`). The bridge maps each name to the widgets bound to
//! it and turns an incoming payload into one [`Delivery`] per listener.
//!
//! Every registration carries the generation of the binding that created it.
//! Deliveries inherit that generation, and a widget drops deliveries from any
//! generation other than its current one. A payload dispatched before a
//! rebind therefore never lands in the rebound widget, even if it is applied
//! afterwards.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Physical event name for a device-scoped source
pub fn physical_name(device: &str, source: &str) -> String {
    format!("id{}-{}", device, source)
}

/// Split a physical event name into `(device, source)`
///
/// Splits at the first `-` after the `id` prefix, so device ids cannot
/// contain `-` while source names can.
pub fn parse_physical_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix("id")?;
    let (device, source) = rest.split_once('-')?;
    if device.is_empty() || source.is_empty() {
        return None;
    }
    Some((device, source))
}

/// One listener entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub widget: String,
    /// Logical source name the widget knows the event by
    pub source: String,
    pub generation: u64,
}

/// A payload addressed to one widget binding
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub event: String,
    pub widget: String,
    pub source: String,
    pub generation: u64,
    pub payload: Value,
}

/// Listener table for the single upstream connection
#[derive(Debug, Default)]
pub struct DispatchBridge {
    routes: BTreeMap<String, Vec<Registration>>,
}

impl DispatchBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a widget binding under a physical event name
    ///
    /// Registering the same (widget, source, generation) twice is a no-op.
    pub fn subscribe(&mut self, event: &str, registration: Registration) {
        let listeners = self.routes.entry(event.to_string()).or_default();
        if !listeners.contains(&registration) {
            debug!(
                "Subscribed widget '{}' to {} (generation {})",
                registration.widget, event, registration.generation
            );
            listeners.push(registration);
        }
    }

    /// Remove every registration of a widget, returning how many were removed
    pub fn unsubscribe_widget(&mut self, widget: &str) -> usize {
        let mut removed = 0;
        self.routes.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|r| r.widget != widget);
            removed += before - listeners.len();
            !listeners.is_empty()
        });
        if removed > 0 {
            debug!("Unsubscribed widget '{}' from {} events", widget, removed);
        }
        removed
    }

    /// Physical event names a widget is registered under, sorted
    pub fn registrations_for(&self, widget: &str) -> Vec<String> {
        self.routes
            .iter()
            .filter(|(_, listeners)| listeners.iter().any(|r| r.widget == widget))
            .map(|(event, _)| event.clone())
            .collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.routes.get(event).map_or(0, Vec::len)
    }

    /// Every physical event name with at least one listener, sorted
    pub fn event_names(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    /// Total registrations across all events
    pub fn total_listeners(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Fan a payload out to every listener of `event`
    pub fn dispatch(&self, event: &str, payload: &Value) -> Vec<Delivery> {
        match self.routes.get(event) {
            Some(listeners) => listeners
                .iter()
                .map(|r| Delivery {
                    event: event.to_string(),
                    widget: r.widget.clone(),
                    source: r.source.clone(),
                    generation: r.generation,
                    payload: payload.clone(),
                })
                .collect(),
            None => {
                debug!("No listeners for event {}", event);
                Vec::new()
            }
        }
    }
}

//! Widget lifecycle manager
//!
//! Owns every widget instance, the dispatch bridge and the known device set.
//! Each widget name moves through `absent -> active -> (rebinding) -> active
//! -> removed`. Whenever a binding changes, all old registrations are removed
//! from the bridge before any new one is added, and the new binding gets a
//! fresh generation.
//!
//! After every public operation the widgets' bound event names and the
//! bridge's registrations agree (see [`Dashboard::is_consistent`]).

use crate::accessor::AccessorRegistry;
use crate::diagnostics::Diagnostics;
use crate::dispatch::{physical_name, Delivery, DispatchBridge, Registration};
use crate::error::{DashError, Result};
use crate::layout::{DeviceEnvelope, Layout, LayoutEnvelope};
use crate::widget::{Widget, WidgetRegistry};
use lupulo_common::events::{FailedLayout, LayoutReport, Notice, WidgetFrame};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info};

/// Point-in-time view of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Selected device
    pub device: Option<String>,
    /// Known devices, sorted
    pub devices: Vec<String>,
    /// Every widget, sorted by name
    pub widgets: Vec<WidgetFrame>,
}

/// Result of applying a device envelope
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub devices: Vec<String>,
    pub selected: Option<String>,
    /// True when the selection differs from before the envelope
    pub selection_changed: bool,
}

pub struct Dashboard {
    widget_registry: WidgetRegistry,
    accessor_registry: AccessorRegistry,
    widgets: BTreeMap<String, Widget>,
    bridge: DispatchBridge,
    devices: BTreeSet<String>,
    selected: Option<String>,
    /// Preferred device when auto-selecting
    preferred: Option<String>,
    next_generation: u64,
    diag: Diagnostics,
}

impl Dashboard {
    pub fn new(widget_registry: WidgetRegistry, accessor_registry: AccessorRegistry) -> Self {
        Self {
            widget_registry,
            accessor_registry,
            widgets: BTreeMap::new(),
            bridge: DispatchBridge::new(),
            devices: BTreeSet::new(),
            selected: None,
            preferred: None,
            next_generation: 1,
            diag: Diagnostics::new(),
        }
    }

    /// Dashboard with the built-in widget and accessor types
    pub fn with_builtins() -> Self {
        Self::new(WidgetRegistry::with_builtins(), AccessorRegistry::with_builtins())
    }

    /// Device to pick first when it is announced
    pub fn with_preferred_device(mut self, device: Option<String>) -> Self {
        self.preferred = device;
        self
    }

    // ========================================
    // Layouts
    // ========================================

    /// Apply a layout envelope: removals, then changes, then additions
    pub fn apply_layouts(&mut self, envelope: LayoutEnvelope) -> LayoutReport {
        let mut report = LayoutReport::default();

        for name in envelope.removed {
            if self.remove_widget(&name) {
                report.removed.push(name);
            } else {
                self.diag
                    .warn(Some(name.as_str()), "removal of unknown widget ignored");
            }
        }

        for (name, raw) in envelope.changed {
            self.install(&name, &raw, &mut report);
        }

        for (name, raw) in envelope.added {
            self.install(&name, &raw, &mut report);
        }

        if !report.is_empty() {
            info!(
                "Layouts applied: {} added, {} changed, {} removed, {} failed",
                report.added.len(),
                report.changed.len(),
                report.removed.len(),
                report.failed.len()
            );
        }
        report
    }

    /// Build a widget and put it in place of any existing widget of that name
    ///
    /// A layout that fails to build leaves the existing widget untouched.
    fn install(&mut self, name: &str, raw: &Value, report: &mut LayoutReport) {
        let widget = match self.build_widget(name, raw) {
            Ok(widget) => widget,
            Err(e) => {
                match &e {
                    DashError::UnknownWidgetType(_) => self.diag.warn(Some(name), e.to_string()),
                    _ => self.diag.error(Some(name), e.to_string()),
                }
                report.failed.push(FailedLayout {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let replaced = self.remove_widget(name);
        self.insert_widget(widget);
        if replaced {
            report.changed.push(name.to_string());
        } else {
            report.added.push(name.to_string());
        }
    }

    fn build_widget(&mut self, name: &str, raw: &Value) -> Result<Widget> {
        let layout = Layout::from_value(name, raw)?;
        Widget::build(
            layout,
            &self.widget_registry,
            &self.accessor_registry,
            &mut self.diag,
        )
    }

    /// Unbind and drop a widget; false if no widget has that name
    fn remove_widget(&mut self, name: &str) -> bool {
        match self.widgets.remove(name) {
            Some(mut widget) => {
                self.bridge.unsubscribe_widget(name);
                widget.mark_removed();
                debug!("Widget '{}' removed", name);
                true
            }
            None => false,
        }
    }

    /// Register a freshly built widget and bind it to the selected device
    fn insert_widget(&mut self, mut widget: Widget) {
        if let Some(device) = self.selected.clone() {
            self.bind(&mut widget, &device);
        }
        self.widgets.insert(widget.name().to_string(), widget);
    }

    fn bind(&mut self, widget: &mut Widget, device: &str) {
        let generation = self.next_generation;
        self.next_generation += 1;

        widget.bind(device, generation);
        for source in widget.sources() {
            let event = physical_name(device, source);
            self.bridge.subscribe(
                &event,
                Registration {
                    widget: widget.name().to_string(),
                    source: source.clone(),
                    generation,
                },
            );
        }
    }

    // ========================================
    // Devices
    // ========================================

    /// Switch every widget to `device`
    ///
    /// All old registrations are dropped first; then each widget is rebuilt
    /// from its stored layout and bound to the new device.
    pub fn select_device(&mut self, device: &str) -> Result<()> {
        if !self.devices.contains(device) {
            return Err(DashError::UnknownDevice(device.to_string()));
        }
        self.unbind_all();
        self.selected = Some(device.to_string());

        let layouts: Vec<Layout> = self.widgets.values().map(|w| w.layout().clone()).collect();
        self.widgets.clear();
        for layout in layouts {
            let name = layout.name.clone();
            match Widget::build(
                layout,
                &self.widget_registry,
                &self.accessor_registry,
                &mut self.diag,
            ) {
                Ok(widget) => self.insert_widget(widget),
                Err(e) => self.diag.error(Some(name.as_str()), e.to_string()),
            }
        }

        info!(
            "Selected device {} ({} widgets bound)",
            device,
            self.widgets.len()
        );
        Ok(())
    }

    /// Update the known device set from an envelope
    pub fn apply_devices(&mut self, envelope: DeviceEnvelope) -> DeviceUpdate {
        let before = self.selected.clone();

        for device in envelope.added {
            if device.contains('-') {
                self.diag
                    .warn(None, format!("device id '{}' contains '-', ignored", device));
                continue;
            }
            self.devices.insert(device);
        }
        for device in &envelope.removed {
            self.devices.remove(device);
        }

        if let Some(selected) = self.selected.clone() {
            if !self.devices.contains(&selected) {
                info!("Selected device {} disappeared", selected);
                self.unbind_all();
                self.selected = None;
            }
        }

        if self.selected.is_none() {
            if let Some(device) = self.auto_select_candidate() {
                // Candidate comes from the known set, so selection cannot fail
                if let Err(e) = self.select_device(&device) {
                    self.diag.error(None, e.to_string());
                }
            }
        }

        DeviceUpdate {
            devices: self.devices(),
            selected: self.selected.clone(),
            selection_changed: before != self.selected,
        }
    }

    fn auto_select_candidate(&self) -> Option<String> {
        match &self.preferred {
            Some(preferred) if self.devices.contains(preferred) => Some(preferred.clone()),
            _ => self.devices.iter().next().cloned(),
        }
    }

    fn unbind_all(&mut self) {
        for (name, widget) in self.widgets.iter_mut() {
            widget.begin_rebind();
            self.bridge.unsubscribe_widget(name);
        }
    }

    // ========================================
    // Data
    // ========================================

    /// Fan a payload out into deliveries without applying them
    pub fn dispatch(&self, event: &str, payload: &Value) -> Vec<Delivery> {
        self.bridge.dispatch(event, payload)
    }

    /// Apply one delivery; false when the widget is gone or the delivery is stale
    pub fn deliver(&mut self, delivery: &Delivery) -> bool {
        match self.widgets.get_mut(&delivery.widget) {
            Some(widget) => widget.accept(delivery),
            None => false,
        }
    }

    /// Dispatch and deliver; returns how many widgets took the payload
    pub fn ingest(&mut self, event: &str, payload: &Value) -> usize {
        let deliveries = self.dispatch(event, payload);
        deliveries.iter().filter(|d| self.deliver(d)).count()
    }

    /// Paint every active widget that has data
    pub fn tick(&mut self, now: Duration) -> Vec<WidgetFrame> {
        let mut frames = Vec::new();
        for widget in self.widgets.values_mut() {
            if widget.paint(now, &mut self.diag) {
                frames.push(widget.frame());
            }
        }
        frames
    }

    // ========================================
    // Inspection
    // ========================================

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            device: self.selected.clone(),
            devices: self.devices(),
            widgets: self.widgets.values().map(Widget::frame).collect(),
        }
    }

    /// Notices collected since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.diag.drain()
    }

    /// Every widget's bound names match its bridge registrations, and the
    /// bridge holds nothing else
    pub fn is_consistent(&self) -> bool {
        let bound: usize = self.widgets.values().map(|w| w.event_sources().len()).sum();
        let widgets_match = self
            .widgets
            .values()
            .all(|w| self.bridge.registrations_for(w.name()) == w.event_sources());
        widgets_match && bound == self.bridge.total_listeners()
    }

    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.get(name)
    }

    /// Widget names, sorted
    pub fn widget_names(&self) -> Vec<String> {
        self.widgets.keys().cloned().collect()
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Known devices, sorted
    pub fn devices(&self) -> Vec<String> {
        self.devices.iter().cloned().collect()
    }

    pub fn bridge(&self) -> &DispatchBridge {
        &self.bridge
    }
}

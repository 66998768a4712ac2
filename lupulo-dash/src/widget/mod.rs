//! Widget instances
//!
//! A widget is built from a layout descriptor and the two registries. It is
//! created unbound; the dashboard binds it to a device, which fixes the
//! physical event names it listens to and the generation its deliveries must
//! carry.

mod registry;
pub mod renderers;

pub use registry::{WidgetKind, WidgetRegistry};

use crate::accessor::{accessor_events, build_accessors, Accessor, AccessorRegistry, JData};
use crate::diagnostics::Diagnostics;
use crate::dispatch::{physical_name, Delivery};
use crate::error::Result;
use crate::layout::Layout;
use lupulo_common::events::WidgetFrame;
use renderers::Renderer;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle state of one widget instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetState {
    /// Built, no device bound yet
    Unbound,
    Active,
    /// Old bindings released, waiting to be rebound or replaced
    Rebinding,
    Removed,
}

#[derive(Debug)]
pub struct Widget {
    instance_id: Uuid,
    layout: Layout,
    kind: WidgetKind,
    accessors: Vec<Accessor>,
    renderer: Box<dyn Renderer>,
    jdata: Option<JData>,
    /// Logical source names: `event_names` followed by accessor events
    sources: Vec<String>,
    /// Physical event names currently bound, sorted
    event_sources: Vec<String>,
    device: Option<String>,
    generation: u64,
    state: WidgetState,
}

impl Widget {
    /// Build an unbound widget from its layout
    pub fn build(
        layout: Layout,
        widgets: &WidgetRegistry,
        accessors: &AccessorRegistry,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let kind = widgets.resolve(&layout.widget_type)?;
        let built = build_accessors(accessors, &layout.accessors, &layout.name, diag)?;
        let renderer = kind.build_renderer(&layout)?;

        let mut sources = layout.event_names.clone();
        for event in accessor_events(&built) {
            if !sources.contains(&event) {
                sources.push(event);
            }
        }

        Ok(Self {
            instance_id: Uuid::new_v4(),
            layout,
            kind,
            accessors: built,
            renderer,
            jdata: None,
            sources,
            event_sources: Vec::new(),
            device: None,
            generation: 0,
            state: WidgetState::Unbound,
        })
    }

    /// Physical event names this widget would listen to on `device`, sorted
    pub fn physical_names(&self, device: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .map(|source| physical_name(device, source))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Record a binding to `device` under `generation`
    ///
    /// The caller registers the same names with the dispatch bridge.
    pub fn bind(&mut self, device: &str, generation: u64) {
        self.event_sources = self.physical_names(device);
        self.device = Some(device.to_string());
        self.generation = generation;
        self.state = WidgetState::Active;
        debug!(
            "Widget '{}' bound to device {} (generation {})",
            self.layout.name, device, generation
        );
    }

    /// Release every binding and forget received data
    pub fn begin_rebind(&mut self) {
        self.event_sources.clear();
        self.device = None;
        self.jdata = None;
        self.renderer.clear();
        self.state = WidgetState::Rebinding;
    }

    pub fn mark_removed(&mut self) {
        self.begin_rebind();
        self.state = WidgetState::Removed;
    }

    /// Store a delivered payload; stale or misaddressed deliveries are rejected
    pub fn accept(&mut self, delivery: &Delivery) -> bool {
        if self.state != WidgetState::Active
            || delivery.generation != self.generation
            || delivery.widget != self.layout.name
            || !self.event_sources.contains(&delivery.event)
            || !self.sources.contains(&delivery.source)
        {
            debug!(
                "Widget '{}' dropped delivery for {} (generation {}, current {})",
                self.layout.name, delivery.event, delivery.generation, self.generation
            );
            return false;
        }

        self.jdata
            .get_or_insert_with(JData::new)
            .insert(delivery.source.clone(), delivery.payload.clone());
        true
    }

    /// Evaluate accessors and paint; returns false when there is nothing to paint
    pub fn paint(&mut self, now: Duration, diag: &mut Diagnostics) -> bool {
        if self.state != WidgetState::Active {
            return false;
        }
        let Some(jdata) = self.jdata.as_ref() else {
            return false;
        };

        let name = &self.layout.name;
        let values: Vec<_> = self
            .accessors
            .iter_mut()
            .map(|accessor| accessor.extract(Some(jdata), name, diag))
            .collect();
        self.renderer.paint(&values, now);
        true
    }

    pub fn frame(&self) -> WidgetFrame {
        WidgetFrame {
            name: self.layout.name.clone(),
            widget_type: self.layout.widget_type.clone(),
            instance_id: self.instance_id,
            generation: self.generation,
            anchor: self.layout.anchor,
            device: self.device.clone(),
            frame: self.renderer.frame(),
        }
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn jdata(&self) -> Option<&JData> {
        self.jdata.as_ref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn event_sources(&self) -> &[String] {
        &self.event_sources
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn accessor_count(&self) -> usize {
        self.accessors.len()
    }
}

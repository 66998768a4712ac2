//! Widget type registry

use super::renderers::{Battery, Digital, MultipleLine, Renderer};
use crate::error::{DashError, Result};
use crate::layout::Layout;
use std::collections::BTreeMap;

/// Built-in widget kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Digital,
    MultipleLine,
    Battery,
}

impl WidgetKind {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::Digital => "digital",
            WidgetKind::MultipleLine => "multiple_line",
            WidgetKind::Battery => "battery",
        }
    }

    /// Construct a fresh rendering surface from the layout's params
    pub fn build_renderer(&self, layout: &Layout) -> Result<Box<dyn Renderer>> {
        Ok(match self {
            WidgetKind::Digital => Box::new(Digital::from_layout(layout)?),
            WidgetKind::MultipleLine => Box::new(MultipleLine::from_layout(layout)?),
            WidgetKind::Battery => Box::new(Battery::from_layout(layout)?),
        })
    }
}

/// Maps layout `type` names to widget kinds
#[derive(Debug, Clone, Default)]
pub struct WidgetRegistry {
    kinds: BTreeMap<String, WidgetKind>,
}

impl WidgetRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `digital`, `multiple_line` and `battery`
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for kind in [WidgetKind::Digital, WidgetKind::MultipleLine, WidgetKind::Battery] {
            registry.register(kind.name(), kind);
        }
        registry
    }

    pub fn register(&mut self, name: &str, kind: WidgetKind) -> Option<WidgetKind> {
        self.kinds.insert(name.to_string(), kind)
    }

    pub fn resolve(&self, name: &str) -> Result<WidgetKind> {
        self.kinds
            .get(name)
            .copied()
            .ok_or_else(|| DashError::UnknownWidgetType(name.to_string()))
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }
}

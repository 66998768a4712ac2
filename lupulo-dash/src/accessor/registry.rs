//! Accessor kind registry
//!
//! Type tags from layout JSON are resolved to [`AccessorKind`] once, when a
//! widget is built. Evaluation never looks at strings again.

use crate::error::{DashError, Result};
use std::collections::BTreeMap;

/// Built-in accessor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    /// `data[event][i]` for every i in `[start, end)`
    Index,
    /// `data[event][key]`
    Dict,
    /// `data[event]`
    Primitive,
}

impl AccessorKind {
    pub fn name(&self) -> &'static str {
        match self {
            AccessorKind::Index => "index",
            AccessorKind::Dict => "dict",
            AccessorKind::Primitive => "primitive",
        }
    }
}

/// Maps accessor type tags to kinds
///
/// Passed by reference to whoever builds accessors; there is no global
/// registry.
#[derive(Debug, Clone, Default)]
pub struct AccessorRegistry {
    kinds: BTreeMap<String, AccessorKind>,
}

impl AccessorRegistry {
    /// Registry with no tags at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `index`, `dict` and `primitive`
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for kind in [AccessorKind::Index, AccessorKind::Dict, AccessorKind::Primitive] {
            registry.register(kind.name(), kind);
        }
        registry
    }

    /// Register a tag (or an alias for an existing kind)
    ///
    /// Returns the kind previously registered under that tag.
    pub fn register(&mut self, tag: &str, kind: AccessorKind) -> Option<AccessorKind> {
        self.kinds.insert(tag.to_string(), kind)
    }

    pub fn resolve(&self, tag: &str) -> Result<AccessorKind> {
        self.kinds
            .get(tag)
            .copied()
            .ok_or_else(|| DashError::UnknownAccessorType(tag.to_string()))
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = AccessorRegistry::with_builtins();
        assert_eq!(registry.resolve("index").unwrap(), AccessorKind::Index);
        assert_eq!(registry.resolve("dict").unwrap(), AccessorKind::Dict);
        assert_eq!(registry.resolve("primitive").unwrap(), AccessorKind::Primitive);
        assert_eq!(registry.tags(), vec!["dict", "index", "primitive"]);
    }

    #[test]
    fn test_unknown_tag() {
        let registry = AccessorRegistry::with_builtins();
        match registry.resolve("regex") {
            Err(DashError::UnknownAccessorType(tag)) => assert_eq!(tag, "regex"),
            other => panic!("expected UnknownAccessorType, got {:?}", other),
        }
        assert!(AccessorRegistry::empty().resolve("index").is_err());
    }

    #[test]
    fn test_alias_registration() {
        let mut registry = AccessorRegistry::with_builtins();
        assert!(registry.register("list", AccessorKind::Index).is_none());
        assert_eq!(registry.resolve("list").unwrap(), AccessorKind::Index);
        assert_eq!(
            registry.register("list", AccessorKind::Dict),
            Some(AccessorKind::Index)
        );
    }
}

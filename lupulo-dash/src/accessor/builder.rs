//! Accessor specification → accessor list

use super::{Accessor, AccessorKind, AccessorRegistry, Selector};
use crate::diagnostics::Diagnostics;
use crate::error::{DashError, Result};
use serde_json::{Map, Value};

/// Most accessors one widget may expand to
pub const MAX_ACCESSORS: usize = 4096;

/// Build the accessors described by a specification tree
///
/// `spec` is one accessor object or an array of them. Unknown type tags are
/// reported and skipped; structural problems make the whole widget
/// malformed, and so does expanding to more than [`MAX_ACCESSORS`].
pub fn build_accessors(
    registry: &AccessorRegistry,
    spec: &Value,
    widget: &str,
    diag: &mut Diagnostics,
) -> Result<Vec<Accessor>> {
    Builder {
        registry,
        widget,
        diag,
    }
    .build(spec, None)
}

/// Logical event names read by the first stage of each accessor, deduplicated
pub fn accessor_events(accessors: &[Accessor]) -> Vec<String> {
    let mut events: Vec<String> = Vec::new();
    for accessor in accessors {
        if !events.iter().any(|e| e == accessor.event()) {
            events.push(accessor.event().to_string());
        }
    }
    events
}

struct Builder<'a> {
    registry: &'a AccessorRegistry,
    widget: &'a str,
    diag: &'a mut Diagnostics,
}

impl Builder<'_> {
    fn build(&mut self, spec: &Value, inherited_event: Option<&str>) -> Result<Vec<Accessor>> {
        match spec {
            Value::Array(specs) => {
                let mut accessors = Vec::new();
                for spec in specs {
                    accessors.extend(self.build(spec, inherited_event)?);
                    self.check_count(accessors.len())?;
                }
                Ok(accessors)
            }
            Value::Object(spec) => self.build_one(spec, inherited_event),
            _ => Err(self.malformed("accessor spec must be an object or an array")),
        }
    }

    fn build_one(
        &mut self,
        spec: &Map<String, Value>,
        inherited_event: Option<&str>,
    ) -> Result<Vec<Accessor>> {
        let tag = match spec.get("type") {
            Some(Value::String(tag)) => tag.as_str(),
            Some(_) => return Err(self.malformed("accessor 'type' must be a string")),
            None => return Err(self.malformed("accessor missing 'type'")),
        };

        let kind = match self.registry.resolve(tag) {
            Ok(kind) => kind,
            Err(e) => {
                self.diag.warn(Some(self.widget), format!("{}, accessor skipped", e));
                return Ok(Vec::new());
            }
        };

        let event = match spec.get("event") {
            Some(Value::String(event)) if !event.is_empty() => event.clone(),
            Some(_) => return Err(self.malformed("accessor 'event' must be a non-empty string")),
            None => match inherited_event {
                Some(event) => event.to_string(),
                None => return Err(self.malformed(format!("{} accessor missing 'event'", tag))),
            },
        };

        let parents: Vec<Accessor> = match kind {
            AccessorKind::Index => {
                let start = self.index_bound(spec, "start")?;
                let end = self.index_bound(spec, "end")?;
                if start >= end {
                    return Err(self.malformed(format!(
                        "index accessor needs start < end, got {}..{}",
                        start, end
                    )));
                }
                self.check_count(end - start)?;
                (start..end)
                    .map(|i| Accessor::new(&event, kind, Selector::Index(i)))
                    .collect()
            }
            AccessorKind::Dict => {
                let key = match spec.get("key") {
                    Some(Value::String(key)) => key.clone(),
                    Some(_) => return Err(self.malformed("dict accessor 'key' must be a string")),
                    None => return Err(self.malformed("dict accessor missing 'key'")),
                };
                vec![Accessor::new(&event, kind, Selector::Key(key))]
            }
            AccessorKind::Primitive => vec![Accessor::new(&event, kind, Selector::Whole)],
        };

        let after = match spec.get("after") {
            None | Some(Value::Null) => return Ok(parents),
            Some(after) => after,
        };

        let children = self.build(after, Some(&event))?;
        self.check_count(parents.len().saturating_mul(children.len()))?;
        let mut chained = Vec::with_capacity(parents.len() * children.len());
        for parent in &parents {
            for child in &children {
                chained.push(parent.clone().chained(child.clone()));
            }
        }
        Ok(chained)
    }

    fn index_bound(&self, spec: &Map<String, Value>, field: &str) -> Result<usize> {
        match spec.get(field) {
            Some(value) => value.as_u64().map(|v| v as usize).ok_or_else(|| {
                self.malformed(format!("index accessor '{}' must be a non-negative integer", field))
            }),
            None => Err(self.malformed(format!("index accessor missing '{}'", field))),
        }
    }

    fn check_count(&self, count: usize) -> Result<()> {
        if count > MAX_ACCESSORS {
            return Err(self.malformed(format!(
                "expands to {} accessors, at most {} allowed",
                count, MAX_ACCESSORS
            )));
        }
        Ok(())
    }

    fn malformed(&self, reason: impl Into<String>) -> DashError {
        DashError::malformed(self.widget, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::JData;
    use serde_json::json;

    fn build(spec: Value) -> (Result<Vec<Accessor>>, Diagnostics) {
        let registry = AccessorRegistry::with_builtins();
        let mut diag = Diagnostics::new();
        let result = build_accessors(&registry, &spec, "w", &mut diag);
        (result, diag)
    }

    fn extract_all(accessors: &mut [Accessor], data: &JData) -> Vec<Value> {
        let mut diag = Diagnostics::new();
        accessors
            .iter_mut()
            .map(|a| a.extract(Some(data), "w", &mut diag))
            .collect()
    }

    fn jdata(payload: Value) -> JData {
        let mut data = JData::new();
        data.insert("evt".to_string(), payload);
        data
    }

    #[test]
    fn test_index_expands_range() {
        let (result, _) = build(json!({"type": "index", "event": "evt", "start": 0, "end": 3}));
        let mut accessors = result.unwrap();
        assert_eq!(accessors.len(), 3);
        let values = extract_all(&mut accessors, &jdata(json!([7, 8, 9])));
        assert_eq!(values, vec![json!(7), json!(8), json!(9)]);
    }

    #[test]
    fn test_dict_hit_then_miss() {
        let (result, _) = build(json!({"type": "dict", "event": "evt", "key": "level"}));
        let mut accessors = result.unwrap();
        assert_eq!(extract_all(&mut accessors, &jdata(json!({}))), vec![json!(0)]);
        assert_eq!(
            extract_all(&mut accessors, &jdata(json!({"level": 42}))),
            vec![json!(42)]
        );
        assert_eq!(extract_all(&mut accessors, &jdata(json!({}))), vec![json!(42)]);
    }

    #[test]
    fn test_after_chain_dict_then_index() {
        let (result, _) = build(json!({
            "type": "dict", "event": "evt", "key": "sub",
            "after": {"type": "index", "start": 0, "end": 2}
        }));
        let mut accessors = result.unwrap();
        assert_eq!(accessors.len(), 2);
        assert!(accessors.iter().all(|a| a.depth() == 2 && a.event() == "evt"));
        let values = extract_all(&mut accessors, &jdata(json!({"sub": [1, 2, 3]})));
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_after_chain_is_cartesian() {
        let (result, _) = build(json!({
            "type": "index", "event": "evt", "start": 0, "end": 2,
            "after": [
                {"type": "dict", "key": "x"},
                {"type": "dict", "key": "y"}
            ]
        }));
        let mut accessors = result.unwrap();
        assert_eq!(accessors.len(), 4);
        let values = extract_all(
            &mut accessors,
            &jdata(json!([{"x": 1, "y": 2}, {"x": 3, "y": 4}])),
        );
        assert_eq!(values, vec![json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_array_spec_concatenates() {
        let (result, _) = build(json!([
            {"type": "primitive", "event": "a"},
            {"type": "dict", "event": "b", "key": "k"}
        ]));
        let accessors = result.unwrap();
        assert_eq!(accessor_events(&accessors), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_type_skipped_with_warning() {
        let (result, mut diag) = build(json!([
            {"type": "regex", "event": "a"},
            {"type": "primitive", "event": "b"}
        ]));
        let accessors = result.unwrap();
        assert_eq!(accessors.len(), 1);
        let notices = diag.drain();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("Unknown accessor type: regex"));
    }

    #[test]
    fn test_structural_errors_are_malformed() {
        let cases = [
            json!({"type": "primitive"}),
            json!({"type": "dict", "event": "evt"}),
            json!({"type": "index", "event": "evt", "start": 2, "end": 2}),
            json!({"type": "index", "event": "evt", "start": -1, "end": 2}),
            json!({"event": "evt"}),
            json!("primitive"),
        ];
        for spec in cases {
            let (result, _) = build(spec.clone());
            assert!(
                matches!(result, Err(DashError::MalformedLayout { .. })),
                "spec {} should be malformed",
                spec
            );
        }
    }

    #[test]
    fn test_oversized_index_range_is_malformed() {
        let (result, _) = build(json!({"type": "index", "event": "evt", "start": 0, "end": 1u64 << 40}));
        assert!(matches!(result, Err(DashError::MalformedLayout { .. })));

        let (result, _) = build(json!({
            "type": "index", "event": "evt", "start": 0, "end": MAX_ACCESSORS
        }));
        assert_eq!(result.unwrap().len(), MAX_ACCESSORS);
    }

    #[test]
    fn test_oversized_chain_product_is_malformed() {
        // 128 x 128 stays under the per-range limit but not the product limit
        let (result, _) = build(json!({
            "type": "index", "event": "evt", "start": 0, "end": 128,
            "after": {"type": "index", "start": 0, "end": 128}
        }));
        assert!(matches!(result, Err(DashError::MalformedLayout { .. })));
    }

    #[test]
    fn test_oversized_array_is_malformed() {
        let spec = json!({"type": "index", "event": "evt", "start": 0, "end": 4000});
        let (result, _) = build(json!([spec.clone(), spec]));
        assert!(matches!(result, Err(DashError::MalformedLayout { .. })));
    }

    #[test]
    fn test_duplicate_events_listed_once() {
        let (result, _) = build(json!({"type": "index", "event": "evt", "start": 0, "end": 4}));
        assert_eq!(accessor_events(&result.unwrap()), vec!["evt"]);
    }
}

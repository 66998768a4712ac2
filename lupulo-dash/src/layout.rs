//! Layout descriptors and the envelopes that carry them
//!
//! The source announces widgets with a `new_widgets` event whose data is a
//! layout envelope, and devices with a `new_devices` event whose data is a
//! device envelope. Each layout in an envelope is parsed on its own so that
//! one malformed layout never prevents the others from being applied.

use crate::error::{DashError, Result};
use lupulo_common::events::Anchor;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fields with a fixed meaning; everything else is a rendering parameter
const RESERVED_FIELDS: [&str; 4] = ["type", "anchor", "event_names", "accessors"];

/// Declarative description of one widget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub name: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    pub anchor: Anchor,
    /// Logical source names the widget listens to
    pub event_names: Vec<String>,
    /// Accessor specification tree (object or array)
    pub accessors: Value,
    /// Widget-specific rendering parameters
    pub params: Map<String, Value>,
}

impl Layout {
    /// Parse a layout descriptor
    ///
    /// `type` and `accessors` are required; `anchor` defaults to the origin
    /// and `event_names` to an empty list.
    pub fn from_value(name: &str, value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DashError::malformed(name, "layout must be a JSON object"))?;

        let widget_type = match object.get("type") {
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            Some(_) => return Err(DashError::malformed(name, "'type' must be a non-empty string")),
            None => return Err(DashError::malformed(name, "missing 'type'")),
        };

        let accessors = match object.get("accessors") {
            Some(spec @ (Value::Object(_) | Value::Array(_))) => spec.clone(),
            Some(_) => {
                return Err(DashError::malformed(
                    name,
                    "'accessors' must be an object or an array",
                ))
            }
            None => return Err(DashError::malformed(name, "missing 'accessors'")),
        };

        let anchor = match object.get("anchor") {
            None | Some(Value::Null) => Anchor::default(),
            Some(raw) => serde_json::from_value::<Anchor>(raw.clone())
                .map_err(|e| DashError::malformed(name, format!("invalid 'anchor': {}", e)))?,
        };

        let event_names = match object.get("event_names") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        DashError::malformed(name, "'event_names' must contain strings")
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(DashError::malformed(name, "'event_names' must be an array")),
        };

        let params = object
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            widget_type,
            anchor,
            event_names,
            accessors,
            params,
        })
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    /// Numeric parameter; present but non-numeric is malformed
    pub fn param_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.param(key) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                DashError::malformed(&self.name, format!("'{}' must be a number", key))
            }),
        }
    }

    /// Non-negative integer parameter
    pub fn param_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.param(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(|v| Some(v as usize)).ok_or_else(|| {
                DashError::malformed(
                    &self.name,
                    format!("'{}' must be a non-negative integer", key),
                )
            }),
        }
    }

    /// `[a, b]` numeric pair parameter
    pub fn param_pair(&self, key: &str) -> Result<Option<[f64; 2]>> {
        match self.param(key) {
            None => Ok(None),
            Some(Value::Array(items)) if items.len() == 2 => {
                match (items[0].as_f64(), items[1].as_f64()) {
                    (Some(a), Some(b)) => Ok(Some([a, b])),
                    _ => Err(DashError::malformed(
                        &self.name,
                        format!("'{}' must contain two numbers", key),
                    )),
                }
            }
            Some(_) => Err(DashError::malformed(
                &self.name,
                format!("'{}' must be a two element array", key),
            )),
        }
    }

    /// List of strings parameter
    pub fn param_strings(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.param(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        DashError::malformed(&self.name, format!("'{}' must contain strings", key))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(_) => Err(DashError::malformed(
                &self.name,
                format!("'{}' must be an array", key),
            )),
        }
    }
}

/// `{added, removed, changed}` layout envelope
///
/// Layout bodies stay raw JSON until the dashboard builds each widget.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LayoutEnvelope {
    #[serde(default)]
    pub added: Map<String, Value>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub changed: Map<String, Value>,
}

impl LayoutEnvelope {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| DashError::Common(e.into()))
    }
}

/// `{added, removed}` device envelope
///
/// Device ids may be sent as numbers or strings; both become strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DeviceEnvelope {
    #[serde(default, deserialize_with = "device_ids")]
    pub added: Vec<String>,
    #[serde(default, deserialize_with = "device_ids")]
    pub removed: Vec<String>,
}

impl DeviceEnvelope {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| DashError::Common(e.into()))
    }
}

fn device_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|id| match id {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "device id must be a string or number, got {}",
                other
            ))),
        })
        .collect()
}

//! Request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vp_core::RemoteId;

use crate::methods;
use crate::{ProtocolError, ProtocolResult};

/// How a data array drives the color of a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    #[serde(rename = "SOLID", alias = "solid")]
    Solid,
    #[serde(rename = "ARRAY", alias = "array")]
    Array,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Solid => "SOLID",
            ColorMode::Array => "ARRAY",
        }
    }
}

/// Where the coloring array is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorLocation {
    #[serde(rename = "POINTS", alias = "points")]
    Points,
    #[serde(rename = "CELLS", alias = "cells")]
    Cells,
}

impl ColorLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorLocation::Points => "POINTS",
            ColorLocation::Cells => "CELLS",
        }
    }
}

/// Relative time navigation; the server has no direct seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcrAction {
    First,
    Prev,
    Next,
    Last,
}

impl VcrAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcrAction::First => "first",
            VcrAction::Prev => "prev",
            VcrAction::Next => "next",
            VcrAction::Last => "last",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "first" => Some(VcrAction::First),
            "prev" => Some(VcrAction::Prev),
            "next" => Some(VcrAction::Next),
            "last" => Some(VcrAction::Last),
            _ => None,
        }
    }
}

/// One entry of a `pv.proxy.manager.update` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub id: String,
    pub name: String,
    pub value: Value,
}

impl PropertyUpdate {
    pub fn single(id: RemoteId, name: &str, value: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            value: value.map_or(Value::Null, |v| Value::String(v.to_string())),
        }
    }

    pub fn multi(id: RemoteId, name: &str, values: &[String]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            value: Value::Array(values.iter().cloned().map(Value::String).collect()),
        }
    }
}

/// Reply to a `pv.proxy.manager.update` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReply {
    pub success: bool,
    #[serde(rename = "errorList", default)]
    pub error_list: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default)]
    pub time: Vec<f64>,
}

/// Full description of one remote object as returned by `pv.proxy.manager.get`.
///
/// `ui` and `properties` are index-aligned: entry `i` of each describes the
/// same property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyObject {
    #[serde(default)]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub ui: Vec<Value>,
    #[serde(default)]
    pub properties: Vec<Value>,
}

impl ProxyObject {
    pub fn times(&self) -> ProtocolResult<Vec<f64>> {
        self.data
            .as_ref()
            .map(|data| data.time.clone())
            .ok_or_else(|| ProtocolError::malformed(methods::PROXY_GET, "missing data.time"))
    }

    fn property_entry(&self, index: usize) -> ProtocolResult<&serde_json::Map<String, Value>> {
        self.properties
            .get(index)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ProtocolError::malformed(
                    methods::PROXY_GET,
                    format!("no property at index {index}"),
                )
            })
    }

    /// Name the server uses for the property at `index`.
    pub fn property_name(&self, index: usize) -> ProtocolResult<String> {
        self.property_entry(index)?
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProtocolError::malformed(
                    methods::PROXY_GET,
                    format!("property {index} has no name"),
                )
            })
    }

    /// Allowed values listed in the UI metadata at `index`.
    pub fn allowed_values(&self, index: usize) -> ProtocolResult<Vec<String>> {
        let values = self
            .ui
            .get(index)
            .and_then(|entry| entry.get("values"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProtocolError::malformed(methods::PROXY_GET, format!("ui {index} has no values"))
            })?;
        Ok(values.iter().filter_map(value_to_string).collect())
    }

    /// Scalar value of the property at `index`. A null value is `None`.
    pub fn value(&self, index: usize) -> ProtocolResult<Option<String>> {
        Ok(self
            .property_entry(index)?
            .get("value")
            .and_then(value_to_string))
    }

    /// List value of the property at `index`.
    pub fn values(&self, index: usize) -> ProtocolResult<Vec<String>> {
        let values = self
            .property_entry(index)?
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProtocolError::malformed(
                    methods::PROXY_GET,
                    format!("property {index} value is not a list"),
                )
            })?;
        Ok(values.iter().filter_map(value_to_string).collect())
    }
}

/// String form of a scalar JSON value. Arrays, objects and null have none.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Remote ids arrive either as numbers or as numeric strings.
pub fn id_from_value(value: &Value) -> Option<RemoteId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

//! The data tree: one configuration instance as a recursive value.
//!
//! Unlike [`serde_json::Value`] there is no null variant; absent values are
//! simply missing from their parent mapping.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Named children of a mapping node.
pub type Map = IndexMap<String, DataTree>;

/// A configuration value: scalar, ordered list, or named mapping.
///
/// Map equality ignores key order, list equality does not.
#[derive(Debug, Clone, PartialEq)]
pub enum DataTree {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    List(Vec<DataTree>),
    Map(Map),
}

impl DataTree {
    /// An empty mapping, the placeholder used when padding lists.
    pub fn empty_map() -> Self {
        DataTree::Map(Map::new())
    }

    /// JSON Schema style name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DataTree::Bool(_) => "boolean",
            DataTree::Integer(_) => "integer",
            DataTree::Number(_) => "number",
            DataTree::String(_) => "string",
            DataTree::List(_) => "array",
            DataTree::Map(_) => "object",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataTree::List(_) | DataTree::Map(_))
    }

    /// True for an empty list or an empty mapping.
    pub fn is_empty_container(&self) -> bool {
        match self {
            DataTree::List(items) => items.is_empty(),
            DataTree::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            DataTree::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            DataTree::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DataTree]> {
        match self {
            DataTree::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<DataTree>> {
        match self {
            DataTree::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataTree::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataTree::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataTree::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataTree::Integer(i) => Some(*i as f64),
            DataTree::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Natural text form of a scalar, as shown in an input field.
    ///
    /// Returns `None` for lists and mappings.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            DataTree::Bool(b) => Some(b.to_string()),
            DataTree::Integer(i) => Some(i.to_string()),
            DataTree::Number(n) => Some(n.to_string()),
            DataTree::String(s) => Some(s.clone()),
            DataTree::List(_) | DataTree::Map(_) => None,
        }
    }

    /// Convert from a JSON value, dropping `null` leaves.
    ///
    /// Returns `None` only when `value` itself is `null`.
    pub fn from_json(value: &Value) -> Option<DataTree> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(DataTree::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => DataTree::Integer(i),
                None => DataTree::Number(n.as_f64().unwrap_or_default()),
            }),
            Value::String(s) => Some(DataTree::String(s.clone())),
            Value::Array(items) => Some(DataTree::List(
                items.iter().filter_map(DataTree::from_json).collect(),
            )),
            Value::Object(map) => Some(DataTree::Map(
                map.iter()
                    .filter_map(|(k, v)| DataTree::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    /// Convert into a JSON value.
    ///
    /// Non-finite numbers have no JSON form and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            DataTree::Bool(b) => Value::Bool(*b),
            DataTree::Integer(i) => Value::Number((*i).into()),
            DataTree::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DataTree::String(s) => Value::String(s.clone()),
            DataTree::List(items) => Value::Array(items.iter().map(DataTree::to_json).collect()),
            DataTree::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for DataTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for DataTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataTree::Bool(b) => serializer.serialize_bool(*b),
            DataTree::Integer(i) => serializer.serialize_i64(*i),
            DataTree::Number(n) => serializer.serialize_f64(*n),
            DataTree::String(s) => serializer.serialize_str(s),
            DataTree::List(items) => items.serialize(serializer),
            DataTree::Map(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DataTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        DataTree::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom("null is not a configuration value"))
    }
}

impl From<bool> for DataTree {
    fn from(value: bool) -> Self {
        DataTree::Bool(value)
    }
}

impl From<i64> for DataTree {
    fn from(value: i64) -> Self {
        DataTree::Integer(value)
    }
}

impl From<f64> for DataTree {
    fn from(value: f64) -> Self {
        DataTree::Number(value)
    }
}

impl From<&str> for DataTree {
    fn from(value: &str) -> Self {
        DataTree::String(value.to_string())
    }
}

impl From<String> for DataTree {
    fn from(value: String) -> Self {
        DataTree::String(value)
    }
}

impl From<Vec<DataTree>> for DataTree {
    fn from(value: Vec<DataTree>) -> Self {
        DataTree::List(value)
    }
}

impl From<Map> for DataTree {
    fn from(value: Map) -> Self {
        DataTree::Map(value)
    }
}

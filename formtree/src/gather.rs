//! Gather engine: read a binding tree back into a data tree.
//!
//! The walk follows the schema, never the binding tree, so bindings the
//! schema does not describe are ignored. Blank inputs are absent, except
//! the string value of a named open-map entry. A container whose children
//! are all absent is absent itself: the gathered tree never holds empty
//! maps or empty lists.

use std::fmt;

use crate::{
    binding::{Binding, FieldHandle},
    path::Path,
    schema::{ObjectShape, ScalarType, SchemaKind, SchemaNode},
    value::{DataTree, Map},
};

/// A field whose raw value could not be converted to its declared type.
///
/// The field is left out of the gathered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherIssue {
    pub path: Path,
    pub expected: ScalarType,
    /// The text that failed to convert.
    pub raw: String,
}

impl fmt::Display for GatherIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}`: expected {}, got {:?}",
            self.path,
            self.expected.name(),
            self.raw
        )
    }
}

/// Result of [`gather`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gathered {
    /// Always a mapping, possibly empty.
    pub tree: DataTree,
    pub issues: Vec<GatherIssue>,
}

impl Gathered {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Assemble the data tree described by `schema` from the handles in
/// `bindings`.
pub fn gather(schema: &SchemaNode, bindings: &Binding) -> Gathered {
    let mut gatherer = Gatherer {
        path: Path::root(),
        issues: Vec::new(),
    };
    let tree = gatherer
        .node(schema, bindings)
        .filter(|tree| tree.as_map().is_some())
        .unwrap_or_else(DataTree::empty_map);
    if !gatherer.issues.is_empty() {
        debug!("gather: {} field(s) failed to convert", gatherer.issues.len());
    }
    Gathered {
        tree,
        issues: gatherer.issues,
    }
}

/// Convert one raw input to `ty`.
///
/// `Ok(None)` means the input is blank. Booleans are handled by the caller
/// since a toggle is never blank.
pub fn coerce(raw: &str, ty: ScalarType) -> Result<Option<DataTree>, ScalarType> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = match ty {
        ScalarType::String => DataTree::String(strip_quotes(raw).to_string()),
        ScalarType::Integer => DataTree::Integer(trimmed.parse().map_err(|_| ty)?),
        ScalarType::Number => match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => DataTree::Number(n),
            _ => return Err(ty),
        },
        ScalarType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => DataTree::Bool(true),
            "false" | "0" | "off" | "no" => DataTree::Bool(false),
            _ => return Err(ty),
        },
    };
    Ok(Some(value))
}

/// Remove one layer of enclosing double quotes. A lone `"` strips to the
/// empty string.
fn strip_quotes(raw: &str) -> &str {
    match raw.strip_prefix('"') {
        Some("") => "",
        Some(rest) => rest.strip_suffix('"').unwrap_or(raw),
        None => raw,
    }
}

struct Gatherer {
    path: Path,
    issues: Vec<GatherIssue>,
}

impl Gatherer {
    fn node(&mut self, schema: &SchemaNode, binding: &Binding) -> Option<DataTree> {
        match (&schema.kind, binding) {
            (SchemaKind::Object(ObjectShape::Structured(fields)), Binding::Object(children)) => {
                let mut map = Map::new();
                for (name, child_schema) in fields {
                    let Some(child) = children.get(name) else {
                        continue;
                    };
                    self.path.push_key(name.as_str());
                    if let Some(value) = self.node(child_schema, child) {
                        map.insert(name.clone(), value);
                    }
                    self.path.pop();
                }
                (!map.is_empty()).then_some(DataTree::Map(map))
            }
            (SchemaKind::Object(ObjectShape::OpenMap { values }), Binding::Map(map_binding)) => {
                let ty = values
                    .as_deref()
                    .and_then(SchemaNode::scalar_type)
                    .unwrap_or(ScalarType::String);
                let mut map = Map::new();
                for entry in &map_binding.entries {
                    let key = entry.key.raw();
                    let key = key.trim();
                    if key.is_empty() {
                        continue;
                    }
                    self.path.push_key(key);
                    // a named entry keeps its text even when blank
                    let value = if ty == ScalarType::String {
                        Some(DataTree::String(strip_quotes(&entry.value.raw()).to_string()))
                    } else {
                        self.scalar(&entry.value, ty)
                    };
                    if let Some(value) = value {
                        map.insert(key.to_string(), value);
                    }
                    self.path.pop();
                }
                (!map.is_empty()).then_some(DataTree::Map(map))
            }
            (SchemaKind::Array(array), Binding::Array(array_binding)) => {
                let mut items = Vec::new();
                for (i, item) in array_binding.items.iter().enumerate() {
                    self.path.push_index(i);
                    items.extend(self.node(&array.items, item));
                    self.path.pop();
                }
                (!items.is_empty()).then_some(DataTree::List(items))
            }
            (_, Binding::Field(handle)) => match schema.scalar_type() {
                Some(ty) => self.scalar(handle, ty),
                None => {
                    debug!("gather: `{}` is bound to a field but not a scalar", self.path);
                    None
                }
            },
            (_, binding) => {
                debug!(
                    "gather: `{}` expects {}, bound to a {}",
                    self.path,
                    schema.type_label(),
                    binding.kind()
                );
                None
            }
        }
    }

    fn scalar(&mut self, handle: &FieldHandle, ty: ScalarType) -> Option<DataTree> {
        if ty == ScalarType::Boolean {
            return Some(DataTree::Bool(handle.checked()));
        }
        let raw = handle.raw();
        match coerce(&raw, ty) {
            Ok(value) => value,
            Err(expected) => {
                warn!("gather: `{}` is not a valid {}: {raw:?}", self.path, expected.name());
                self.issues.push(GatherIssue {
                    path: self.path.clone(),
                    expected,
                    raw,
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::populate;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DataTree {
        DataTree::from_json(&value).unwrap()
    }

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn schema() -> SchemaNode {
        SchemaNode::object([
            ("name", SchemaNode::string()),
            ("port", SchemaNode::integer()),
            ("ratio", SchemaNode::number()),
            ("debug", SchemaNode::boolean()),
            ("names", SchemaNode::array(SchemaNode::string())),
            (
                "rules",
                SchemaNode::array(SchemaNode::object([
                    ("x", SchemaNode::string()),
                    ("n", SchemaNode::integer()),
                ])),
            ),
            ("tags", SchemaNode::open_map()),
            ("limits", SchemaNode::open_map_of(SchemaNode::integer())),
            ("inner", SchemaNode::object([("v", SchemaNode::string())])),
        ])
    }

    #[test]
    fn test_empty_bindings_gather_to_booleans_only() {
        let schema = schema();
        let bindings = Binding::build(&schema);
        let gathered = gather(&schema, &bindings);
        assert_eq!(gathered.tree, tree(json!({"debug": false})));
        assert!(gathered.is_clean());
    }

    #[test]
    fn test_scalar_coercion() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        bindings.handle_mut(&path("name")).unwrap().set_raw("\"quoted\"");
        bindings.handle_mut(&path("port")).unwrap().set_raw(" 8080 ");
        bindings.handle_mut(&path("ratio")).unwrap().set_raw("0.25");
        bindings.handle_mut(&path("debug")).unwrap().set_checked(true);

        let gathered = gather(&schema, &bindings);
        assert_eq!(
            gathered.tree,
            tree(json!({"name": "quoted", "port": 8080, "ratio": 0.25, "debug": true}))
        );
    }

    #[test]
    fn test_string_keeps_surrounding_whitespace() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        bindings.handle_mut(&path("name")).unwrap().set_raw("  padded ");
        let gathered = gather(&schema, &bindings);
        assert_eq!(
            gathered.tree.as_map().unwrap()["name"],
            DataTree::from("  padded ")
        );
    }

    #[test]
    fn test_coercion_failure_is_reported() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        bindings.handle_mut(&path("port")).unwrap().set_raw("12x");
        bindings.handle_mut(&path("ratio")).unwrap().set_raw("inf");

        let gathered = gather(&schema, &bindings);
        assert_eq!(gathered.tree, tree(json!({"debug": false})));
        assert_eq!(
            gathered.issues,
            [
                GatherIssue {
                    path: path("port"),
                    expected: ScalarType::Integer,
                    raw: "12x".into(),
                },
                GatherIssue {
                    path: path("ratio"),
                    expected: ScalarType::Number,
                    raw: "inf".into(),
                },
            ]
        );
        assert_eq!(
            gathered.issues[0].to_string(),
            "`port`: expected integer, got \"12x\""
        );
    }

    #[test]
    fn test_scalar_array_is_compacted() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        let names = bindings.array_mut(&path("names")).unwrap();
        for raw in ["ann", "", "bo"] {
            let i = names.push_item();
            if let Binding::Field(handle) = &mut names.items[i] {
                handle.set_raw(raw);
            }
        }
        let gathered = gather(&schema, &bindings);
        assert_eq!(
            gathered.tree.as_map().unwrap()["names"],
            tree(json!(["ann", "bo"]))
        );
    }

    #[test]
    fn test_empty_object_items_are_dropped() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        let rules = bindings.array_mut(&path("rules")).unwrap();
        rules.push_item();
        rules.push_item();
        bindings.handle_mut(&path("rules[1].n")).unwrap().set_raw("4");

        let gathered = gather(&schema, &bindings);
        assert_eq!(
            gathered.tree.as_map().unwrap()["rules"],
            tree(json!([{"n": 4}]))
        );
    }

    #[test]
    fn test_open_map_entries() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        let tags = bindings.map_mut(&path("tags")).unwrap();
        for (key, value) in [("env", "dev"), ("", "lost"), ("env", "prod"), ("tier", "1")] {
            let i = tags.push_entry();
            tags.entries[i].key.set_raw(key);
            tags.entries[i].value.set_raw(value);
        }
        let limits = bindings.map_mut(&path("limits")).unwrap();
        let i = limits.push_entry();
        limits.entries[i].key.set_raw("cpu");
        limits.entries[i].value.set_raw("4");

        let gathered = gather(&schema, &bindings);
        let map = gathered.tree.as_map().unwrap();
        assert_eq!(map["tags"], tree(json!({"env": "prod", "tier": "1"})));
        assert_eq!(map["limits"], tree(json!({"cpu": 4})));
    }

    #[test]
    fn test_open_map_keeps_blank_values() {
        let schema = schema();
        let mut bindings = Binding::build(&schema);
        let tags = bindings.map_mut(&path("tags")).unwrap();
        let i = tags.push_entry();
        tags.entries[i].key.set_raw("flag");
        let limits = bindings.map_mut(&path("limits")).unwrap();
        let i = limits.push_entry();
        limits.entries[i].key.set_raw("cpu");

        let gathered = gather(&schema, &bindings);
        let map = gathered.tree.as_map().unwrap();
        assert_eq!(map["tags"], tree(json!({"flag": ""})));
        // numeric values stay absent when blank
        assert!(!map.contains_key("limits"));
        assert!(gathered.is_clean());
    }

    #[test]
    fn test_populate_then_gather_fixpoint() {
        let schema = schema();
        let data = tree(json!({
            "name": "svc",
            "port": 80,
            "ratio": 1.5,
            "debug": true,
            "rules": [{"x": "a", "n": 1}, {"x": "b"}],
            "inner": {"v": "deep"}
        }));
        let mut bindings = Binding::build(&schema);
        populate(&mut bindings, &schema, &data);
        let gathered = gather(&schema, &bindings);
        assert_eq!(gathered.tree, data);
        assert_eq!(gather(&schema, &bindings), gathered);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce("  ", ScalarType::Integer), Ok(None));
        assert_eq!(
            coerce("-3", ScalarType::Integer),
            Ok(Some(DataTree::Integer(-3)))
        );
        assert_eq!(coerce("3.5", ScalarType::Integer), Err(ScalarType::Integer));
        assert_eq!(
            coerce("1e3", ScalarType::Number),
            Ok(Some(DataTree::Number(1000.0)))
        );
        assert_eq!(coerce("NaN", ScalarType::Number), Err(ScalarType::Number));
        assert_eq!(
            coerce("\"\"", ScalarType::String),
            Ok(Some(DataTree::from("")))
        );
        assert_eq!(coerce("off", ScalarType::Boolean), Ok(Some(DataTree::Bool(false))));
        assert_eq!(
            coerce("\"", ScalarType::String),
            Ok(Some(DataTree::from("")))
        );
        assert_eq!(
            coerce("\"open", ScalarType::String),
            Ok(Some(DataTree::from("\"open")))
        );
    }
}

//! JSON Schema parsing into [`SchemaNode`].
//!
//! Handles the subset produced by `schemars` and by hand-written draft-07
//! / 2020-12 documents: `type` (string or list with `null`), `properties`,
//! `additionalProperties`, `items`, `enum`, `const` variants under
//! `oneOf`/`anyOf`, `default`, `format`, and local `$ref`s into `$defs` or
//! `definitions`.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};

use super::{ArraySchema, ObjectShape, SchemaKind, SchemaNode, StringSchema};
use crate::{error::SchemaError, path::is_valid_key, value::DataTree};

impl SchemaNode {
    /// Parse a JSON Schema node of any kind.
    pub fn from_json_schema(schema: &Value) -> Result<Self, SchemaError> {
        Parser::new(schema).parse(schema, "")
    }

    /// Parse a root schema, which must describe a structured object.
    pub fn root_from_json_schema(schema: &Value) -> Result<Self, SchemaError> {
        let node = Self::from_json_schema(schema)?;
        if node.properties().is_none() {
            return Err(SchemaError::RootNotObject);
        }
        Ok(node)
    }
}

impl TryFrom<&Value> for SchemaNode {
    type Error = SchemaError;

    fn try_from(schema: &Value) -> Result<Self, Self::Error> {
        Self::root_from_json_schema(schema)
    }
}

struct Parser<'a> {
    root: &'a Value,
    /// Definitions currently being expanded, to detect cycles.
    resolving: Vec<String>,
}

fn str_field(obj: &JsonMap<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn is_null_schema(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("null")
        || value.get("const").is_some_and(Value::is_null)
}

/// The single constant a variant admits, if it is an enum-like variant.
fn variant_constant(value: &Value) -> Option<String> {
    let constant = match value.get("const") {
        Some(c) => c,
        None => match value.get("enum").and_then(Value::as_array)?.as_slice() {
            [only] => only,
            _ => return None,
        },
    };
    DataTree::from_json(constant)?.scalar_text()
}

impl<'a> Parser<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            resolving: Vec::new(),
        }
    }

    fn parse(&mut self, node: &Value, path: &str) -> Result<SchemaNode, SchemaError> {
        let obj = node.as_object().ok_or_else(|| SchemaError::NotAnObject {
            path: path.to_string(),
        })?;
        let title = str_field(obj, "title");
        let description = str_field(obj, "description");

        let mut parsed = if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            self.resolve_ref(reference, path)?
        } else if let Some(all_of) = obj.get("allOf").and_then(Value::as_array)
            && all_of.len() == 1
        {
            self.parse(&all_of[0], path)?
        } else if let Some(variants) = obj
            .get("oneOf")
            .or_else(|| obj.get("anyOf"))
            .and_then(Value::as_array)
        {
            self.parse_variants(variants, path)?
        } else {
            SchemaNode {
                title: None,
                description: None,
                kind: self.parse_kind(obj, path)?,
            }
        };

        if title.is_some() {
            parsed.title = title;
        }
        if description.is_some() {
            parsed.description = description;
        }
        if let Some(default) = obj.get("default") {
            apply_default(&mut parsed, default, path)?;
        }
        Ok(parsed)
    }

    fn resolve_ref(&mut self, reference: &str, path: &str) -> Result<SchemaNode, SchemaError> {
        let unresolved = || SchemaError::UnresolvedRef {
            path: path.to_string(),
            reference: reference.to_string(),
        };
        let recursive = || SchemaError::RecursiveRef {
            path: path.to_string(),
            reference: reference.to_string(),
        };

        if reference == "#" {
            return Err(recursive());
        }
        let (container, name) = if let Some(name) = reference.strip_prefix("#/$defs/") {
            ("$defs", name)
        } else if let Some(name) = reference.strip_prefix("#/definitions/") {
            ("definitions", name)
        } else {
            return Err(unresolved());
        };
        if self.resolving.iter().any(|r| r == name) {
            return Err(recursive());
        }

        let root = self.root;
        let target = root
            .get(container)
            .and_then(|defs| defs.get(name))
            .ok_or_else(unresolved)?;

        self.resolving.push(name.to_string());
        let parsed = self.parse(target, path);
        self.resolving.pop();
        parsed
    }

    fn parse_variants(&mut self, variants: &[Value], path: &str) -> Result<SchemaNode, SchemaError> {
        let non_null: Vec<&Value> = variants.iter().filter(|v| !is_null_schema(v)).collect();

        if let [only] = non_null.as_slice()
            && variant_constant(only).is_none()
        {
            return self.parse(only, path);
        }

        let constants: Option<Vec<String>> = non_null.iter().map(|v| variant_constant(v)).collect();
        match constants {
            Some(enum_values) if !enum_values.is_empty() => Ok(SchemaNode {
                title: None,
                description: None,
                kind: SchemaKind::String(StringSchema {
                    enum_values,
                    ..Default::default()
                }),
            }),
            _ => Err(SchemaError::UnsupportedType {
                path: path.to_string(),
                ty: "oneOf".into(),
            }),
        }
    }

    fn parse_kind(
        &mut self,
        obj: &JsonMap<String, Value>,
        path: &str,
    ) -> Result<SchemaKind, SchemaError> {
        let declared = match obj.get("type") {
            Some(Value::String(ty)) => Some(ty.as_str()),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|ty| *ty != "null"),
            _ => None,
        };
        let ty = declared.unwrap_or_else(|| {
            if obj.contains_key("properties") || obj.contains_key("additionalProperties") {
                "object"
            } else if obj.contains_key("items") {
                "array"
            } else {
                debug!("schema at `{path}` has no type, binding as free text");
                "string"
            }
        });

        let kind = match ty {
            "string" => SchemaKind::String(StringSchema {
                enum_values: obj
                    .get("enum")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| DataTree::from_json(v)?.scalar_text())
                            .collect()
                    })
                    .unwrap_or_default(),
                format: str_field(obj, "format"),
                default: None,
            }),
            "number" => SchemaKind::Number { default: None },
            "integer" => SchemaKind::Integer { default: None },
            "boolean" => SchemaKind::Boolean { default: None },
            "object" => SchemaKind::Object(self.parse_object(obj, path)?),
            "array" => {
                let items = match obj.get("items") {
                    Some(Value::Array(tuple)) if !tuple.is_empty() => {
                        self.parse(&tuple[0], &format!("{path}[]"))?
                    }
                    Some(items) if items.is_object() => self.parse(items, &format!("{path}[]"))?,
                    _ => SchemaNode::string(),
                };
                SchemaKind::Array(ArraySchema {
                    items: Box::new(items),
                    default: Vec::new(),
                })
            }
            other => {
                return Err(SchemaError::UnsupportedType {
                    path: path.to_string(),
                    ty: other.to_string(),
                });
            }
        };
        Ok(kind)
    }

    fn parse_object(
        &mut self,
        obj: &JsonMap<String, Value>,
        path: &str,
    ) -> Result<ObjectShape, SchemaError> {
        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            let mut fields = IndexMap::with_capacity(properties.len());
            for (name, child) in properties {
                if !is_valid_key(name) {
                    return Err(SchemaError::InvalidFieldName {
                        path: path.to_string(),
                        name: name.clone(),
                    });
                }
                let child = self.parse(child, &child_path(path, name))?;
                fields.insert(name.clone(), child);
            }
            return Ok(ObjectShape::Structured(fields));
        }

        let values = match obj.get("additionalProperties") {
            Some(values) if values.is_object() => {
                let values = self.parse(values, &child_path(path, "*"))?;
                if !values.is_scalar() {
                    return Err(SchemaError::UnsupportedType {
                        path: path.to_string(),
                        ty: format!("map<{}>", values.type_label()),
                    });
                }
                Some(Box::new(values))
            }
            _ => None,
        };
        Ok(ObjectShape::OpenMap { values })
    }
}

fn apply_default(node: &mut SchemaNode, default: &Value, path: &str) -> Result<(), SchemaError> {
    let mismatch = |expected: &str| SchemaError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: default.to_string(),
    };
    if default.is_null() {
        return Ok(());
    }

    match &mut node.kind {
        SchemaKind::String(s) => {
            s.default = Some(
                DataTree::from_json(default)
                    .and_then(|d| d.scalar_text())
                    .ok_or_else(|| mismatch("string"))?,
            );
        }
        SchemaKind::Number { default: slot } => {
            *slot = Some(default.as_f64().ok_or_else(|| mismatch("number"))?);
        }
        SchemaKind::Integer { default: slot } => {
            *slot = Some(default.as_i64().ok_or_else(|| mismatch("integer"))?);
        }
        SchemaKind::Boolean { default: slot } => {
            *slot = Some(default.as_bool().ok_or_else(|| mismatch("boolean"))?);
        }
        SchemaKind::Array(array) => {
            let items = default.as_array().ok_or_else(|| mismatch("array"))?;
            array.default = items.iter().filter_map(DataTree::from_json).collect();
        }
        SchemaKind::Object(_) => {
            debug!("ignoring object default at `{path}`");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;
    use serde_json::json;

    fn service_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Service Config",
            "type": "object",
            "required": ["host", "port"],
            "properties": {
                "host": {"type": "string", "default": "127.0.0.1"},
                "port": {"type": "integer", "default": 8080},
                "log": {
                    "type": "object",
                    "properties": {
                        "level": {
                            "type": "string",
                            "enum": ["trace", "debug", "info", "warn", "error"],
                            "default": "info"
                        }
                    }
                },
                "features": {"type": "array", "items": {"type": "string"}},
                "env": {"type": "object", "additionalProperties": {"type": "string"}},
                "public": {"type": "boolean", "default": false}
            }
        })
    }

    #[test]
    fn test_parse_service_schema() {
        let schema = SchemaNode::try_from(&service_schema()).unwrap();
        assert_eq!(schema.title.as_deref(), Some("Service Config"));

        let props = schema.properties().unwrap();
        let names: Vec<_> = props.keys().map(String::as_str).collect();
        assert_eq!(names, ["host", "port", "log", "features", "env", "public"]);

        assert_eq!(props["port"].scalar_default(), Some(DataTree::Integer(8080)));
        assert_eq!(props["public"].scalar_default(), Some(DataTree::Bool(false)));
        assert_eq!(
            props["log"].properties().unwrap()["level"].type_label(),
            "enum[trace|debug|info|warn|error]"
        );
        assert_eq!(props["features"].type_label(), "array<string>");
        assert_eq!(props["env"].type_label(), "map<string>");
    }

    #[test]
    fn test_nullable_type_list() {
        let schema = SchemaNode::from_json_schema(&json!({"type": ["integer", "null"]})).unwrap();
        assert_eq!(schema.scalar_type(), Some(ScalarType::Integer));
    }

    #[test]
    fn test_ref_and_option() {
        let schema = json!({
            "type": "object",
            "properties": {
                "retry": {
                    "anyOf": [{"$ref": "#/$defs/Retry"}, {"type": "null"}],
                    "description": "Retry policy"
                },
                "legacy": {"$ref": "#/definitions/Legacy"}
            },
            "$defs": {
                "Retry": {
                    "type": "object",
                    "properties": {"delay": {"type": "number", "default": 1.5}}
                }
            },
            "definitions": {
                "Legacy": {"type": "boolean"}
            }
        });
        let parsed = SchemaNode::root_from_json_schema(&schema).unwrap();
        let props = parsed.properties().unwrap();
        let retry = &props["retry"];
        assert_eq!(retry.description.as_deref(), Some("Retry policy"));
        assert_eq!(
            retry.properties().unwrap()["delay"].scalar_default(),
            Some(DataTree::Number(1.5))
        );
        assert_eq!(props["legacy"].scalar_type(), Some(ScalarType::Boolean));
    }

    #[test]
    fn test_const_variants_become_enum() {
        let schema = json!({
            "oneOf": [
                {"type": "string", "const": "Trace", "description": "Trace level"},
                {"type": "string", "const": "Info"}
            ]
        });
        let parsed = SchemaNode::from_json_schema(&schema).unwrap();
        assert_eq!(parsed.type_label(), "enum[Trace|Info]");
    }

    #[test]
    fn test_unresolved_and_recursive_refs() {
        let missing = json!({"type": "object", "properties": {"a": {"$ref": "#/$defs/Nope"}}});
        assert!(matches!(
            SchemaNode::from_json_schema(&missing),
            Err(SchemaError::UnresolvedRef { .. })
        ));

        let cyclic = json!({
            "type": "object",
            "properties": {"node": {"$ref": "#/$defs/Node"}},
            "$defs": {
                "Node": {"type": "object", "properties": {"next": {"$ref": "#/$defs/Node"}}}
            }
        });
        assert!(matches!(
            SchemaNode::from_json_schema(&cyclic),
            Err(SchemaError::RecursiveRef { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_input() {
        let dotted = json!({"type": "object", "properties": {"a.b": {"type": "string"}}});
        assert!(matches!(
            SchemaNode::from_json_schema(&dotted),
            Err(SchemaError::InvalidFieldName { .. })
        ));

        assert_eq!(
            SchemaNode::root_from_json_schema(&json!({"type": "array"})),
            Err(SchemaError::RootNotObject)
        );

        let bad_default = json!({"type": "integer", "default": "many"});
        assert!(matches!(
            SchemaNode::from_json_schema(&bad_default),
            Err(SchemaError::TypeMismatch { .. })
        ));

        let map_of_lists = json!({
            "type": "object",
            "additionalProperties": {"type": "array", "items": {"type": "string"}}
        });
        assert!(matches!(
            SchemaNode::from_json_schema(&map_of_lists),
            Err(SchemaError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_inferred_types() {
        let schema = json!({
            "properties": {
                "list": {"items": {"type": "integer"}, "default": [1, 2]},
                "dict": {"additionalProperties": true},
                "any": {}
            }
        });
        let parsed = SchemaNode::root_from_json_schema(&schema).unwrap();
        let props = parsed.properties().unwrap();
        assert_eq!(props["list"].type_label(), "array<integer>");
        match &props["list"].kind {
            SchemaKind::Array(array) => {
                assert_eq!(array.default, vec![DataTree::Integer(1), DataTree::Integer(2)])
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(props["dict"].type_label(), "map");
        assert_eq!(props["any"].scalar_type(), Some(ScalarType::String));
    }
}

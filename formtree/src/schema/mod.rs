//! Schema model: a closed description of a configuration's shape.
//!
//! Schemas are usually parsed from a JSON Schema document (see
//! [`SchemaNode::from_json_schema`]) but can also be built in code:
//!
//! ```
//! use formtree::schema::SchemaNode;
//!
//! let schema = SchemaNode::object([
//!     ("host", SchemaNode::string().with_default("127.0.0.1")),
//!     ("port", SchemaNode::integer().with_default(8080_i64)),
//!     ("tags", SchemaNode::open_map()),
//! ]);
//! assert!(schema.properties().unwrap().contains_key("port"));
//! ```

use std::fmt::Write;

use indexmap::IndexMap;

use crate::value::DataTree;

mod parse;

/// A recursive type descriptor with optional UI metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Display title.
    pub title: Option<String>,
    /// Help text.
    pub description: Option<String>,
    /// What kind of value this node describes.
    pub kind: SchemaKind,
}

/// The kind of value a [`SchemaNode`] describes.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String(StringSchema),
    Number { default: Option<f64> },
    Integer { default: Option<i64> },
    Boolean { default: Option<bool> },
    Object(ObjectShape),
    Array(ArraySchema),
}

/// String constraints and default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    /// Allowed values; empty means free text.
    pub enum_values: Vec<String>,
    /// Format hint such as `uri` or `path`.
    pub format: Option<String>,
    pub default: Option<String>,
}

/// An object is either a set of named fields or a free-form dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectShape {
    /// Fixed, ordered named children.
    Structured(IndexMap<String, SchemaNode>),
    /// User-defined keys; values follow `values` when it names a scalar
    /// type, otherwise they are kept as strings.
    OpenMap { values: Option<Box<SchemaNode>> },
}

/// Array item type and default list.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub items: Box<SchemaNode>,
    pub default: Vec<DataTree>,
}

/// Scalar leaf types, the targets of coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Integer => "integer",
            ScalarType::Boolean => "boolean",
        }
    }
}

impl SchemaNode {
    fn with_kind(kind: SchemaKind) -> Self {
        Self {
            title: None,
            description: None,
            kind,
        }
    }

    pub fn string() -> Self {
        Self::with_kind(SchemaKind::String(StringSchema::default()))
    }

    pub fn number() -> Self {
        Self::with_kind(SchemaKind::Number { default: None })
    }

    pub fn integer() -> Self {
        Self::with_kind(SchemaKind::Integer { default: None })
    }

    pub fn boolean() -> Self {
        Self::with_kind(SchemaKind::Boolean { default: None })
    }

    /// A structured object with the given children, in order.
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, SchemaNode)>) -> Self {
        Self::with_kind(SchemaKind::Object(ObjectShape::Structured(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// A free-form dictionary of string values.
    pub fn open_map() -> Self {
        Self::with_kind(SchemaKind::Object(ObjectShape::OpenMap { values: None }))
    }

    /// A free-form dictionary whose values follow `values`.
    pub fn open_map_of(values: SchemaNode) -> Self {
        Self::with_kind(SchemaKind::Object(ObjectShape::OpenMap {
            values: Some(Box::new(values)),
        }))
    }

    pub fn array(items: SchemaNode) -> Self {
        Self::with_kind(SchemaKind::Array(ArraySchema {
            items: Box::new(items),
            default: Vec::new(),
        }))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default value.
    ///
    /// Values that do not fit the node's kind are ignored.
    pub fn with_default(mut self, value: impl Into<DataTree>) -> Self {
        let value = value.into();
        match (&mut self.kind, value) {
            (SchemaKind::String(s), v) if v.is_scalar() => s.default = v.scalar_text(),
            (SchemaKind::Number { default }, v) if v.as_f64().is_some() => *default = v.as_f64(),
            (SchemaKind::Integer { default }, DataTree::Integer(i)) => *default = Some(i),
            (SchemaKind::Boolean { default }, DataTree::Bool(b)) => *default = Some(b),
            (SchemaKind::Array(array), DataTree::List(items)) => array.default = items,
            _ => {}
        }
        self
    }

    /// Restrict a string node to the given variants.
    pub fn with_enum<S: Into<String>>(mut self, variants: impl IntoIterator<Item = S>) -> Self {
        if let SchemaKind::String(s) = &mut self.kind {
            s.enum_values = variants.into_iter().map(Into::into).collect();
        }
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        if let SchemaKind::String(s) = &mut self.kind {
            s.format = Some(format.into());
        }
        self
    }

    /// Scalar type of a leaf node, `None` for objects and arrays.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.kind {
            SchemaKind::String(_) => Some(ScalarType::String),
            SchemaKind::Number { .. } => Some(ScalarType::Number),
            SchemaKind::Integer { .. } => Some(ScalarType::Integer),
            SchemaKind::Boolean { .. } => Some(ScalarType::Boolean),
            SchemaKind::Object(_) | SchemaKind::Array(_) => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar_type().is_some()
    }

    /// Named children of a structured object.
    pub fn properties(&self) -> Option<&IndexMap<String, SchemaNode>> {
        match &self.kind {
            SchemaKind::Object(ObjectShape::Structured(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Default value of a scalar node as a data tree.
    pub fn scalar_default(&self) -> Option<DataTree> {
        match &self.kind {
            SchemaKind::String(s) => s.default.clone().map(DataTree::String),
            SchemaKind::Number { default } => default.map(DataTree::Number),
            SchemaKind::Integer { default } => default.map(DataTree::Integer),
            SchemaKind::Boolean { default } => default.map(DataTree::Bool),
            SchemaKind::Object(_) | SchemaKind::Array(_) => None,
        }
    }

    /// Short type label, e.g. `string`, `array<object>`, `map<integer>`.
    pub fn type_label(&self) -> String {
        match &self.kind {
            SchemaKind::String(s) if !s.enum_values.is_empty() => {
                format!("enum[{}]", s.enum_values.join("|"))
            }
            SchemaKind::Object(ObjectShape::Structured(_)) => "object".into(),
            SchemaKind::Object(ObjectShape::OpenMap { values }) => match values {
                Some(v) => format!("map<{}>", v.type_label()),
                None => "map".into(),
            },
            SchemaKind::Array(array) => format!("array<{}>", array.items.type_label()),
            _ => self.scalar_type().map(ScalarType::name).unwrap_or("?").into(),
        }
    }

    /// Indented, human-readable outline of the schema tree.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let children = match &self.kind {
            SchemaKind::Object(ObjectShape::Structured(fields)) => Some(fields),
            SchemaKind::Array(array) => array.items.properties(),
            _ => None,
        };
        for (name, child) in children.into_iter().flatten() {
            let indent = "  ".repeat(depth);
            let _ = write!(out, "{indent}{name}: {}", child.type_label());
            if let Some(default) = child.scalar_default() {
                let _ = write!(out, " = {default}");
            }
            if let Some(title) = &child.title {
                let _ = write!(out, "  # {title}");
            }
            out.push('\n');
            child.write_outline(out, depth + 1);
        }
    }
}

//! Field binding tree: live editable handles arranged in the schema's shape.
//!
//! A binding tree is built once per schema with [`Binding::build`]. Data is
//! loaded into it with [`crate::populate`], user edits mutate its handles
//! directly, and [`crate::gather`] reads it back into a data tree.
//!
//! Arrays and open maps grow through explicit add actions and shrink from
//! the end through remove actions; the tree is never rebuilt to load new
//! data into the same schema.

use indexmap::IndexMap;

use crate::{
    error::PathError,
    path::{Path, Segment},
    schema::{ObjectShape, SchemaKind, SchemaNode},
};

mod handle;

pub use handle::{ChoiceHandle, FieldHandle};

/// One node of the binding tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Scalar leaf.
    Field(FieldHandle),
    /// Structured object with a binding per named child.
    Object(IndexMap<String, Binding>),
    /// Free-form dictionary of key/value handles.
    Map(MapBinding),
    /// Growable list of item bindings.
    Array(ArrayBinding),
}

/// One key/value pair of an open map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: FieldHandle,
    pub value: FieldHandle,
}

/// Ordered entries of an open map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapBinding {
    /// Prototype for new value handles.
    template: FieldHandle,
    pub entries: Vec<MapEntry>,
}

/// Item bindings of an array, built from the item schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBinding {
    item_schema: SchemaNode,
    pub items: Vec<Binding>,
}

impl MapBinding {
    /// Append an empty entry and return its position.
    pub fn push_entry(&mut self) -> usize {
        self.entries.push(MapEntry {
            key: FieldHandle::text(),
            value: self.template.clone(),
        });
        self.entries.len() - 1
    }

    /// Remove the last entry.
    pub fn pop_entry(&mut self) -> Option<MapEntry> {
        self.entries.pop()
    }

    /// Value handle of the first entry whose key reads `key`.
    pub fn value(&self, key: &str) -> Option<&FieldHandle> {
        self.entries
            .iter()
            .find(|e| e.key.raw().trim() == key)
            .map(|e| &e.value)
    }

    pub fn value_mut(&mut self, key: &str) -> Option<&mut FieldHandle> {
        self.entries
            .iter_mut()
            .find(|e| e.key.raw().trim() == key)
            .map(|e| &mut e.value)
    }
}

impl ArrayBinding {
    pub fn item_schema(&self) -> &SchemaNode {
        &self.item_schema
    }

    /// Append a fresh item with the item schema's defaults and return its index.
    pub fn push_item(&mut self) -> usize {
        self.items.push(Binding::build(&self.item_schema));
        self.items.len() - 1
    }

    /// Remove the last item.
    pub fn pop_item(&mut self) -> Option<Binding> {
        self.items.pop()
    }
}

impl Binding {
    /// Build a binding tree for `schema`, with defaults applied.
    ///
    /// Array defaults produce one preloaded item per default element.
    pub fn build(schema: &SchemaNode) -> Binding {
        match &schema.kind {
            SchemaKind::Object(ObjectShape::Structured(fields)) => Binding::Object(
                fields
                    .iter()
                    .map(|(name, child)| (name.clone(), Binding::build(child)))
                    .collect(),
            ),
            SchemaKind::Object(ObjectShape::OpenMap { values }) => Binding::Map(MapBinding {
                template: values
                    .as_deref()
                    .and_then(FieldHandle::for_schema)
                    .unwrap_or_else(FieldHandle::text),
                entries: Vec::new(),
            }),
            SchemaKind::Array(array) => {
                let items = array
                    .default
                    .iter()
                    .map(|value| {
                        let mut item = Binding::build(&array.items);
                        crate::populate::populate(&mut item, &array.items, value);
                        item
                    })
                    .collect();
                Binding::Array(ArrayBinding {
                    item_schema: (*array.items).clone(),
                    items,
                })
            }
            SchemaKind::String(_)
            | SchemaKind::Number { .. }
            | SchemaKind::Integer { .. }
            | SchemaKind::Boolean { .. } => Binding::Field(
                FieldHandle::for_schema(schema).unwrap_or_else(FieldHandle::text),
            ),
        }
    }

    /// Short name of the binding kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Field(_) => "field",
            Binding::Object(_) => "object",
            Binding::Map(_) => "map",
            Binding::Array(_) => "array",
        }
    }

    /// Binding node at `path`. Open map entries are not binding nodes; use
    /// [`Binding::handle`] to reach their value handles.
    pub fn get(&self, path: &Path) -> Option<&Binding> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| match (node, segment) {
                (Binding::Object(children), Segment::Key(key)) => children.get(key),
                (Binding::Array(array), Segment::Index(index)) => array.items.get(*index),
                _ => None,
            })
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Binding> {
        let mut node = self;
        for segment in path.segments() {
            node = match (node, segment) {
                (Binding::Object(children), Segment::Key(key)) => children.get_mut(key)?,
                (Binding::Array(array), Segment::Index(index)) => array.items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Scalar handle at `path`, including values of open map entries
    /// addressed by their key.
    pub fn handle(&self, path: &Path) -> Option<&FieldHandle> {
        if let Some(Binding::Field(handle)) = self.get(path) {
            return Some(handle);
        }
        let (Some(Segment::Key(key)), Some(parent)) = (path.last(), path.parent()) else {
            return None;
        };
        match self.get(&parent)? {
            Binding::Map(map) => map.value(key),
            _ => None,
        }
    }

    pub fn handle_mut(&mut self, path: &Path) -> Option<&mut FieldHandle> {
        if matches!(self.get(path), Some(Binding::Field(_))) {
            return match self.get_mut(path) {
                Some(Binding::Field(handle)) => Some(handle),
                _ => None,
            };
        }
        let (Some(Segment::Key(key)), Some(parent)) = (path.last(), path.parent()) else {
            return None;
        };
        match self.get_mut(&parent)? {
            Binding::Map(map) => map.value_mut(key),
            _ => None,
        }
    }

    /// The array binding at `path`.
    pub fn array_mut(&mut self, path: &Path) -> Result<&mut ArrayBinding, PathError> {
        match self.get_mut(path) {
            Some(Binding::Array(array)) => Ok(array),
            Some(_) => Err(PathError::WrongKind {
                path: path.to_string(),
                expected: "an array",
            }),
            None => Err(PathError::NoBinding(path.to_string())),
        }
    }

    /// The open map binding at `path`.
    pub fn map_mut(&mut self, path: &Path) -> Result<&mut MapBinding, PathError> {
        match self.get_mut(path) {
            Some(Binding::Map(map)) => Ok(map),
            Some(_) => Err(PathError::WrongKind {
                path: path.to_string(),
                expected: "a map",
            }),
            None => Err(PathError::NoBinding(path.to_string())),
        }
    }

    /// Every scalar handle with its path, depth first.
    ///
    /// Open map values are listed under their key. Entries with a blank
    /// key have no path and are left out.
    pub fn fields(&self) -> Vec<(Path, &FieldHandle)> {
        let mut out = Vec::new();
        self.collect_fields(Path::root(), &mut out);
        out
    }

    fn collect_fields<'a>(&'a self, path: Path, out: &mut Vec<(Path, &'a FieldHandle)>) {
        match self {
            Binding::Field(handle) => out.push((path, handle)),
            Binding::Object(children) => {
                for (name, child) in children {
                    child.collect_fields(path.key(name), out);
                }
            }
            Binding::Map(map) => {
                for entry in &map.entries {
                    let key = entry.key.raw();
                    let key = key.trim();
                    if !key.is_empty() {
                        out.push((path.key(key), &entry.value));
                    }
                }
            }
            Binding::Array(array) => {
                for (i, item) in array.items.iter().enumerate() {
                    item.collect_fields(path.index(i), out);
                }
            }
        }
    }
}

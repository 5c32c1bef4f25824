//! Populate engine: write a data tree into an existing binding tree.
//!
//! The walk follows the schema and writes into handles that already
//! exist. Values missing from the data leave their handles untouched, and
//! bindings are never removed. The only structural change is appending
//! items to arrays of containers, because an item's inner fields must exist
//! before they can be written.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    binding::Binding,
    path::Path,
    schema::{ObjectShape, SchemaKind, SchemaNode},
    value::DataTree,
};

/// Growth policy for collections whose size is normally a user decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct PopulateOptions {
    /// Append item bindings to arrays of scalars when the data is longer.
    pub grow_scalar_arrays: bool,
    /// Append entries to open maps when the data has more keys.
    pub grow_maps: bool,
}

impl PopulateOptions {
    /// Grow every collection to fit the data, as when loading into a fresh
    /// binding tree.
    pub fn grow_all() -> Self {
        Self {
            grow_scalar_arrays: true,
            grow_maps: true,
        }
    }
}

/// Counters describing what a populate call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Handles that received a value.
    pub written: usize,
    /// Item bindings and map entries appended to make room for data.
    pub appended: usize,
    /// Values ignored because of a shape or type mismatch, or because no
    /// binding existed for them.
    pub ignored: usize,
}

/// Populate with the default options.
pub fn populate(bindings: &mut Binding, schema: &SchemaNode, data: &DataTree) -> PopulateReport {
    populate_with(bindings, schema, data, &PopulateOptions::default())
}

/// Write `data` into `bindings` following `schema`.
pub fn populate_with(
    bindings: &mut Binding,
    schema: &SchemaNode,
    data: &DataTree,
    options: &PopulateOptions,
) -> PopulateReport {
    let mut populator = Populator {
        options,
        report: PopulateReport::default(),
        path: Path::root(),
    };
    populator.node(bindings, schema, data);
    trace!("populate finished: {:?}", populator.report);
    populator.report
}

struct Populator<'o> {
    options: &'o PopulateOptions,
    report: PopulateReport,
    /// Path of the node being visited, for diagnostics.
    path: Path,
}

impl Populator<'_> {
    fn mismatch(&mut self, expected: &str, data: &DataTree) {
        debug!(
            "populate: `{}` expects {expected}, found {}; left untouched",
            self.path,
            data.kind()
        );
        self.report.ignored += 1;
    }

    fn node(&mut self, binding: &mut Binding, schema: &SchemaNode, data: &DataTree) {
        match (&schema.kind, binding) {
            (SchemaKind::Object(ObjectShape::Structured(fields)), Binding::Object(children)) => {
                let Some(map) = data.as_map() else {
                    return self.mismatch("an object", data);
                };
                for (name, child_schema) in fields {
                    let (Some(value), Some(child)) = (map.get(name), children.get_mut(name)) else {
                        continue;
                    };
                    self.path.push_key(name.as_str());
                    self.node(child, child_schema, value);
                    self.path.pop();
                }
            }
            (SchemaKind::Object(ObjectShape::OpenMap { .. }), Binding::Map(map_binding)) => {
                let Some(map) = data.as_map() else {
                    return self.mismatch("an object", data);
                };
                for (i, (key, value)) in map.iter().enumerate() {
                    if i >= map_binding.entries.len() {
                        if !self.options.grow_maps {
                            debug!(
                                "populate: `{}` has {} entries, {} keys left unbound",
                                self.path,
                                map_binding.entries.len(),
                                map.len() - i
                            );
                            self.report.ignored += map.len() - i;
                            break;
                        }
                        map_binding.push_entry();
                        self.report.appended += 1;
                    }
                    let entry = &mut map_binding.entries[i];
                    entry.key.set_raw(key.as_str());
                    self.path.push_key(key.as_str());
                    let path = self.path.to_string();
                    match entry.value.update_from_value(value, &path) {
                        Ok(()) => self.report.written += 1,
                        Err(e) => {
                            debug!("populate: {e}");
                            self.report.ignored += 1;
                        }
                    }
                    self.path.pop();
                }
            }
            (SchemaKind::Array(array_schema), Binding::Array(array)) => {
                let Some(list) = data.as_list() else {
                    return self.mismatch("an array", data);
                };
                let grow = !array_schema.items.is_scalar() || self.options.grow_scalar_arrays;
                if grow {
                    while array.items.len() < list.len() {
                        array.push_item();
                        self.report.appended += 1;
                    }
                } else if list.len() > array.items.len() {
                    debug!(
                        "populate: `{}` has {} item bindings, {} values ignored",
                        self.path,
                        array.items.len(),
                        list.len() - array.items.len()
                    );
                    self.report.ignored += list.len() - array.items.len();
                }
                for (i, (value, item)) in list.iter().zip(array.items.iter_mut()).enumerate() {
                    self.path.push_index(i);
                    self.node(item, &array_schema.items, value);
                    self.path.pop();
                }
            }
            (_, Binding::Field(handle)) if schema.is_scalar() => {
                let path = self.path.to_string();
                match handle.update_from_value(data, &path) {
                    Ok(()) => self.report.written += 1,
                    Err(e) => {
                        debug!("populate: {e}");
                        self.report.ignored += 1;
                    }
                }
            }
            (_, binding) => {
                warn!(
                    "populate: binding at `{}` is a {} but the schema expects {}",
                    self.path,
                    binding.kind(),
                    schema.type_label()
                );
                self.report.ignored += 1;
            }
        }
    }
}

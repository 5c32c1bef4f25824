use crate::{
    error::SchemaError,
    schema::{SchemaKind, SchemaNode},
    value::DataTree,
};

/// Editable input bound to one scalar schema node.
///
/// Handles keep what the user typed verbatim; conversion to the declared
/// type happens when the tree is gathered.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldHandle {
    /// Free text entry, used for strings, numbers and integers.
    Text { value: String },
    /// Checkbox state.
    Toggle { checked: bool },
    /// Selection among enumerated variants.
    Choice(ChoiceHandle),
}

/// Enum variants and selected index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceHandle {
    /// List of variant labels.
    pub variants: Vec<String>,
    /// Selected variant index.
    pub selected: Option<usize>,
}

impl ChoiceHandle {
    pub fn new(variants: Vec<String>) -> Self {
        Self {
            variants,
            selected: None,
        }
    }

    /// Get the currently selected variant as string, if any.
    pub fn value_str(&self) -> Option<&str> {
        self.selected
            .and_then(|idx| self.variants.get(idx).map(String::as_str))
    }

    /// Select a variant by label. Returns `false` for unknown labels.
    pub fn select(&mut self, label: &str) -> bool {
        match self.variants.iter().position(|v| v == label) {
            Some(idx) => {
                self.selected = Some(idx);
                true
            }
            None => false,
        }
    }

    /// Update the selection from a data value.
    ///
    /// Accepts a scalar whose text matches a variant, or an integer index.
    pub fn update_from_value(&mut self, value: &DataTree, path: &str) -> Result<(), SchemaError> {
        if let Some(text) = value.scalar_text()
            && self.select(&text)
        {
            return Ok(());
        }

        match value {
            DataTree::Integer(idx) if *idx >= 0 && (*idx as usize) < self.variants.len() => {
                self.selected = Some(*idx as usize);
                Ok(())
            }
            _ => Err(SchemaError::TypeMismatch {
                path: path.to_string(),
                expected: format!("one of: {:?}", self.variants),
                actual: value.to_string(),
            }),
        }
    }
}

impl FieldHandle {
    /// Build the handle for a scalar node, preloaded with its default.
    ///
    /// Returns `None` for objects and arrays.
    pub fn for_schema(node: &SchemaNode) -> Option<FieldHandle> {
        let handle = match &node.kind {
            SchemaKind::String(s) if !s.enum_values.is_empty() => {
                let mut choice = ChoiceHandle::new(s.enum_values.clone());
                if let Some(default) = &s.default {
                    choice.select(default);
                }
                FieldHandle::Choice(choice)
            }
            SchemaKind::Boolean { default } => FieldHandle::Toggle {
                checked: default.unwrap_or(false),
            },
            SchemaKind::String(_) | SchemaKind::Number { .. } | SchemaKind::Integer { .. } => {
                FieldHandle::Text {
                    value: node
                        .scalar_default()
                        .and_then(|d| d.scalar_text())
                        .unwrap_or_default(),
                }
            }
            SchemaKind::Object(_) | SchemaKind::Array(_) => return None,
        };
        Some(handle)
    }

    /// An empty text handle.
    pub fn text() -> Self {
        FieldHandle::Text {
            value: String::new(),
        }
    }

    /// The raw value as the user sees it.
    ///
    /// Toggles read as `true`/`false`, an empty choice reads as `""`.
    pub fn raw(&self) -> String {
        match self {
            FieldHandle::Text { value } => value.clone(),
            FieldHandle::Toggle { checked } => checked.to_string(),
            FieldHandle::Choice(choice) => choice.value_str().unwrap_or_default().to_string(),
        }
    }

    /// Overwrite the raw value.
    ///
    /// Toggles accept `true`/`1`/`on`/`yes`; choices keep their selection
    /// when the label is unknown and clear it for an empty string.
    pub fn set_raw(&mut self, raw: impl Into<String>) {
        let raw = raw.into();
        match self {
            FieldHandle::Text { value } => *value = raw,
            FieldHandle::Toggle { checked } => *checked = parse_flag(&raw),
            FieldHandle::Choice(choice) => {
                if raw.is_empty() {
                    choice.selected = None;
                } else if !choice.select(&raw) {
                    debug!("ignoring unknown variant {raw:?}");
                }
            }
        }
    }

    /// Boolean state: the toggle itself, or the raw text read as a flag.
    pub fn checked(&self) -> bool {
        match self {
            FieldHandle::Toggle { checked } => *checked,
            other => parse_flag(&other.raw()),
        }
    }

    pub fn set_checked(&mut self, state: bool) {
        match self {
            FieldHandle::Toggle { checked } => *checked = state,
            other => other.set_raw(state.to_string()),
        }
    }

    /// True when the raw value is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldHandle::Toggle { .. } => false,
            other => other.raw().trim().is_empty(),
        }
    }

    /// Coerce a data value into this handle.
    ///
    /// Lists and mappings never fit a scalar handle.
    pub fn update_from_value(&mut self, value: &DataTree, path: &str) -> Result<(), SchemaError> {
        let mismatch = |expected: &str| SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual: value.to_string(),
        };

        match self {
            FieldHandle::Text { value: current } => {
                *current = value.scalar_text().ok_or_else(|| mismatch("scalar"))?;
                Ok(())
            }
            FieldHandle::Toggle { checked } => {
                *checked = match value {
                    DataTree::Bool(b) => *b,
                    DataTree::String(s) if s == "true" || s == "false" => s == "true",
                    _ => return Err(mismatch("boolean")),
                };
                Ok(())
            }
            FieldHandle::Choice(choice) => choice.update_from_value(value, path),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

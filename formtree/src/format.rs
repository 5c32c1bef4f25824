//! Textual encodings of a data tree.

use std::{fmt, path::Path, str::FromStr};

use crate::{error::FormatError, ini, value::DataTree};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Format {
    Json,
    Toml,
    /// Flattened `[section]` / `key=value` text, see [`crate::ini`].
    Ini,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Toml => "toml",
            Format::Ini => "ini",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Toml => "application/toml",
            Format::Ini => "text/plain",
        }
    }

    /// Preferred file extension, without the dot.
    pub fn extension(self) -> &'static str {
        self.name()
    }

    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        match ext.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "toml" | "tml" => Ok(Format::Toml),
            "ini" => Ok(Format::Ini),
            _ => Err(FormatError::UnknownExtension(ext.to_string())),
        }
    }

    /// Render `tree` as text.
    ///
    /// JSON and TOML are pretty-printed; INI follows [`ini::encode`].
    pub fn encode(self, tree: &DataTree) -> Result<String, FormatError> {
        let s = match self {
            Format::Json => serde_json::to_string_pretty(tree)?,
            Format::Toml => toml::to_string_pretty(tree)?,
            Format::Ini => ini::encode(tree),
        };
        Ok(s)
    }

    /// Parse text into a tree whose root is a mapping.
    ///
    /// Blank input yields an empty mapping. INI never fails; its skipped
    /// lines are logged by the decoder.
    pub fn decode(self, text: &str) -> Result<DataTree, FormatError> {
        if text.trim().is_empty() {
            return Ok(DataTree::empty_map());
        }
        let value: serde_json::Value = match self {
            Format::Json => serde_json::from_str(text)?,
            Format::Toml => {
                let v: toml::Value = toml::from_str(text)?;
                serde_json::to_value(v)?
            }
            Format::Ini => return Ok(ini::decode(text).tree),
        };
        match DataTree::from_json(&value) {
            Some(tree @ DataTree::Map(_)) => Ok(tree),
            Some(other) => Err(FormatError::NotAMap(other.kind())),
            None => Err(FormatError::NotAMap("null")),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "toml" => Ok(Format::Toml),
            "ini" => Ok(Format::Ini),
            _ => Err(FormatError::UnknownFormat(s.to_string())),
        }
    }
}

//! # formtree
//!
//! Schema-driven field binding and a flattened text codec for configuration
//! trees.
//!
//! A JSON Schema describes the shape of a configuration. formtree builds a
//! tree of editable field handles from it, loads existing data into those
//! handles, and gathers the (possibly edited) handles back into a typed data
//! tree that can be written as JSON, TOML or a flattened INI-style text.
//!
//! ## Features
//!
//! - JSON Schema subset parsing (`$ref`, `oneOf` enums, nullable types, defaults)
//! - Canonical paths like `rules.retry[2].delay` for every field
//! - Field handles for text, toggles and enum choices, with growable arrays and maps
//! - Populate and gather engines that reuse the same binding tree across loads
//! - Flattened `[section]` / `key=value` codec with typed scalar parsing
//! - Automatic backup before saving changes
//!
//! ## Quick Start
//!
//! ```rust
//! use formtree::{Format, Session, path::Path};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "a": {"type": "number"},
//!         "b": {"type": "array", "items": {
//!             "type": "object",
//!             "properties": {"x": {"type": "string"}}
//!         }}
//!     }
//! });
//!
//! let mut session = Session::from_json_schema(&schema).unwrap();
//! session
//!     .load_text(r#"{"a": 3.5, "b": [{"x": "hi"}, {"x": "yo"}]}"#, Format::Json)
//!     .unwrap();
//!
//! let x: Path = "b[1].x".parse().unwrap();
//! assert_eq!(session.bindings().handle(&x).unwrap().raw(), "yo");
//!
//! let text = session.save_text(Format::Ini).unwrap();
//! assert_eq!(text, "a=3.5\n\n[b[0]]\nx=hi\n\n[b[1]]\nx=yo");
//! ```
//!
//! ## Modules
//!
//! - [`schema`] - Schema model and JSON Schema parsing
//! - [`path`] - Canonical field paths
//! - [`binding`] - Editable field handles in the schema's shape
//! - [`populate`] / [`gather`] - Data tree to bindings and back
//! - [`ini`] - Flattened text codec
//! - [`session`] / [`run`] - Edit state and the file workflow

#[macro_use]
extern crate log;

pub mod binding;
pub mod error;
pub mod format;
pub mod gather;
pub mod ini;
pub mod path;
pub mod populate;
pub mod run;
pub mod schema;
pub mod session;
pub mod value;

pub use binding::Binding;
pub use error::{Error, Result};
pub use format::Format;
pub use gather::{Gathered, gather};
pub use populate::{PopulateOptions, populate, populate_with};
pub use schema::SchemaNode;
pub use session::{Options, Session};
pub use value::DataTree;

//! Error types and result definitions.
//!
//! Each layer has its own error enum; [`enum@Error`] aggregates them for
//! session-level calls that cross layers.

use thiserror::Error;

/// Errors raised while mapping a JSON Schema document onto [`SchemaNode`]s.
///
/// [`SchemaNode`]: crate::schema::SchemaNode
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A schema node is not a JSON object.
    #[error("schema at `{path}` must be a JSON object")]
    NotAnObject { path: String },
    /// The `type` keyword names something this crate cannot bind.
    #[error("unsupported schema type `{ty}` at `{path}`")]
    UnsupportedType { path: String, ty: String },
    /// A `$ref` does not point into `$defs` or `definitions`.
    #[error("cannot resolve reference `{reference}` at `{path}`")]
    UnresolvedRef { path: String, reference: String },
    /// A `$ref` refers back to a definition that is still being resolved.
    #[error("recursive reference `{reference}` at `{path}`")]
    RecursiveRef { path: String, reference: String },
    /// Property names become path segments and must not contain separators.
    #[error("invalid field name `{name}` at `{path}`")]
    InvalidFieldName { path: String, name: String },
    /// The root schema must describe a structured object.
    #[error("root schema must be an object with named properties")]
    RootNotObject,
    /// A value does not fit the declared type.
    #[error("type mismatch at `{path}`: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

/// Errors raised by path parsing, tree assignment and binding lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The canonical string form could not be parsed.
    #[error("malformed path `{input}`: {reason}")]
    Malformed { input: String, reason: &'static str },
    /// A key contains `.`, `[` or `]`, or is empty.
    #[error("invalid path key `{0}`")]
    InvalidKey(String),
    /// An existing node has a different shape than the path requires.
    #[error("cannot descend into `{path}`: expected {expected}")]
    ShapeConflict {
        path: String,
        expected: &'static str,
    },
    /// An index lies too far past the end of its list to be padded.
    #[error("index `{path}` is too far past the end of a list of {len}")]
    IndexTooFar { path: String, len: usize },
    /// No binding exists at the path.
    #[error("no field bound at `{0}`")]
    NoBinding(String),
    /// The binding at the path does not support the requested action.
    #[error("field at `{path}` is not {expected}")]
    WrongKind {
        path: String,
        expected: &'static str,
    },
}

/// Errors raised when reading or writing a textual encoding.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("cannot write TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
    /// The format name is not one of `json`, `toml`, `ini`.
    #[error("unknown format `{0}`")]
    UnknownFormat(String),
    /// The file extension does not map to a format.
    #[error("unsupported config file extension: {0:?}")]
    UnknownExtension(String),
    /// Configuration documents must have a mapping at the root.
    #[error("document root must be a mapping, found {0}")]
    NotAMap(&'static str),
}

/// Aggregate error for operations spanning schema, paths and formats.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Format(#[from] FormatError),
    /// Conversion between a data tree and a typed Rust value failed.
    #[error("cannot convert configuration: {0}")]
    Convert(#[from] serde_json::Error),
}

/// Result alias using the aggregate [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

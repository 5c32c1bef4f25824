//! Editing session: one schema, its binding tree, and edit state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    binding::{Binding, FieldHandle},
    error::{PathError, Result, SchemaError},
    format::Format,
    gather::{Gathered, gather},
    path::Path,
    populate::{PopulateOptions, PopulateReport, populate_with},
    schema::SchemaNode,
    value::DataTree,
};

/// Metadata keys of a stored configuration envelope.
///
/// An envelope wraps the configuration under `data`:
/// `{"schemaId": "svc", "timestamp": .., "data": {..}}`.
pub const ENVELOPE_KEYS: &[&str] = &[
    "id",
    "filename",
    "schemaName",
    "schemaId",
    "_schemaId",
    "timestamp",
    "data",
];

/// Behavioural options of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct Options {
    /// How loading data grows collections.
    pub populate: PopulateOptions,
}

/// Schema, binding tree and edit state for one configuration.
#[derive(Debug, Clone)]
pub struct Session {
    schema: SchemaNode,
    bindings: Binding,
    /// Options applied when loading data.
    pub options: Options,
    /// Whether the bindings were edited since the last load or save.
    pub needs_save: bool,
}

impl Session {
    /// Start a session with the schema's defaults loaded.
    ///
    /// The schema root must be a structured object.
    pub fn new(schema: SchemaNode) -> Result<Self, SchemaError> {
        if schema.properties().is_none() {
            return Err(SchemaError::RootNotObject);
        }
        let bindings = Binding::build(&schema);
        Ok(Self {
            schema,
            bindings,
            options: Options::default(),
            needs_save: false,
        })
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Start a session from a JSON Schema document.
    pub fn from_json_schema(schema: &serde_json::Value) -> Result<Self, SchemaError> {
        Self::new(SchemaNode::root_from_json_schema(schema)?)
    }

    /// Start a session for the schema `schemars` derives for `C`.
    pub fn for_type<C: JsonSchema>() -> Result<Self> {
        let schema = schemars::schema_for!(C);
        let schema_json = serde_json::to_value(&schema)?;
        Ok(Self::from_json_schema(&schema_json)?)
    }

    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    pub fn bindings(&self) -> &Binding {
        &self.bindings
    }

    /// Load a configuration, unwrapping a stored envelope first.
    ///
    /// Loading does not mark the session as edited.
    pub fn load(&mut self, data: &DataTree) -> PopulateReport {
        let data = unwrap_envelope(data);
        let report = populate_with(&mut self.bindings, &self.schema, data, &self.options.populate);
        debug!(
            "loaded {} value(s), appended {} item(s), ignored {}",
            report.written, report.appended, report.ignored
        );
        report
    }

    /// Decode `text` and load it.
    pub fn load_text(&mut self, text: &str, format: Format) -> Result<PopulateReport> {
        let data = format.decode(text)?;
        Ok(self.load(&data))
    }

    /// Gather the current configuration.
    pub fn collect(&self) -> Gathered {
        gather(&self.schema, &self.bindings)
    }

    /// Gather and encode the current configuration.
    ///
    /// Fields that fail to convert are left out and logged.
    pub fn save_text(&self, format: Format) -> Result<String> {
        let gathered = self.collect();
        for issue in &gathered.issues {
            warn!("not saved: {issue}");
        }
        Ok(format.encode(&gathered.tree)?)
    }

    /// Mutable binding node at `path`. Marks the session as edited.
    pub fn binding_mut(&mut self, path: &Path) -> Option<&mut Binding> {
        let binding = self.bindings.get_mut(path)?;
        self.needs_save = true;
        Some(binding)
    }

    fn handle_mut(&mut self, path: &Path) -> Result<&mut FieldHandle, PathError> {
        let handle = self
            .bindings
            .handle_mut(path)
            .ok_or_else(|| PathError::NoBinding(path.to_string()))?;
        self.needs_save = true;
        Ok(handle)
    }

    /// Overwrite the raw text of the field at `path`.
    pub fn set_raw(&mut self, path: &Path, raw: &str) -> Result<(), PathError> {
        self.handle_mut(path)?.set_raw(raw);
        Ok(())
    }

    pub fn set_checked(&mut self, path: &Path, checked: bool) -> Result<(), PathError> {
        self.handle_mut(path)?.set_checked(checked);
        Ok(())
    }

    /// Select an enum variant by label.
    pub fn select(&mut self, path: &Path, variant: &str) -> Result<()> {
        let handle = self
            .bindings
            .handle_mut(path)
            .ok_or_else(|| PathError::NoBinding(path.to_string()))?;
        let FieldHandle::Choice(choice) = handle else {
            return Err(PathError::WrongKind {
                path: path.to_string(),
                expected: "a choice",
            }
            .into());
        };
        if !choice.select(variant) {
            return Err(SchemaError::TypeMismatch {
                path: path.to_string(),
                expected: format!("one of: {:?}", choice.variants),
                actual: variant.to_string(),
            }
            .into());
        }
        self.needs_save = true;
        Ok(())
    }

    /// Append an item to the array at `path` and return its index.
    pub fn add_item(&mut self, path: &Path) -> Result<usize, PathError> {
        let index = self.bindings.array_mut(path)?.push_item();
        self.needs_save = true;
        Ok(index)
    }

    /// Remove the last item of the array at `path`.
    ///
    /// Returns `false` when the array was already empty.
    pub fn remove_item(&mut self, path: &Path) -> Result<bool, PathError> {
        let removed = self.bindings.array_mut(path)?.pop_item().is_some();
        self.needs_save |= removed;
        Ok(removed)
    }

    /// Append an entry named `key` to the open map at `path` and return its
    /// position. The key may be left blank and filled in later.
    pub fn add_entry(&mut self, path: &Path, key: &str) -> Result<usize, PathError> {
        let map = self.bindings.map_mut(path)?;
        let index = map.push_entry();
        map.entries[index].key.set_raw(key);
        self.needs_save = true;
        Ok(index)
    }

    /// Remove the last entry of the open map at `path`.
    pub fn remove_entry(&mut self, path: &Path) -> Result<bool, PathError> {
        let removed = self.bindings.map_mut(path)?.pop_entry().is_some();
        self.needs_save |= removed;
        Ok(removed)
    }

    /// Replace the schema and rebuild the binding tree from its defaults.
    pub fn switch_schema(&mut self, schema: SchemaNode) -> Result<(), SchemaError> {
        if schema.properties().is_none() {
            return Err(SchemaError::RootNotObject);
        }
        self.bindings = Binding::build(&schema);
        self.schema = schema;
        self.needs_save = false;
        Ok(())
    }

    /// Deserialize the gathered configuration into `C`.
    pub fn to_typed<C: DeserializeOwned>(&self) -> Result<C> {
        let gathered = self.collect();
        Ok(serde_json::from_value(gathered.tree.to_json())?)
    }
}

/// The configuration inside a stored envelope, or `data` itself.
///
/// A mapping is an envelope when its `data` member is a mapping and every
/// other key is one of [`ENVELOPE_KEYS`].
pub fn unwrap_envelope(data: &DataTree) -> &DataTree {
    let Some(map) = data.as_map() else {
        return data;
    };
    match map.get("data") {
        Some(inner)
            if inner.as_map().is_some()
                && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            trace!("unwrapping configuration envelope");
            inner
        }
        _ => data,
    }
}

/// Schema id recorded in a stored envelope.
pub fn envelope_schema_id(data: &DataTree) -> Option<&str> {
    let map = data.as_map()?;
    map.get("schemaId")
        .or_else(|| map.get("_schemaId"))
        .and_then(DataTree::as_str)
}

/// Number of top-level configuration keys of `data` that `schema` declares.
///
/// Envelope metadata keys are not counted.
pub fn schema_match_score(schema: &SchemaNode, data: &DataTree) -> usize {
    let (Some(properties), Some(map)) = (schema.properties(), unwrap_envelope(data).as_map())
    else {
        return 0;
    };
    map.keys()
        .filter(|k| !ENVELOPE_KEYS.contains(&k.as_str()) && properties.contains_key(*k))
        .count()
}

/// The candidate whose schema matches the most keys of `data`.
///
/// Ties go to the earliest candidate; `None` when nothing matches.
pub fn best_match<'a, K>(
    candidates: impl IntoIterator<Item = (K, &'a SchemaNode)>,
    data: &DataTree,
) -> Option<K> {
    let mut best = None;
    let mut best_score = 0;
    for (key, schema) in candidates {
        let score = schema_match_score(schema, data);
        if score > best_score {
            best_score = score;
            best = Some(key);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DataTree {
        DataTree::from_json(&value).unwrap()
    }

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn schema_json() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "default": "svc"},
                "level": {"type": "string", "enum": ["info", "debug"]},
                "debug": {"type": "boolean"},
                "ports": {"type": "array", "items": {"type": "integer"}},
                "rules": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"x": {"type": "string"}}
                    }
                },
                "tags": {"type": "object", "additionalProperties": {"type": "string"}}
            }
        })
    }

    #[test]
    fn test_load_and_collect() {
        let mut session = Session::from_json_schema(&schema_json()).unwrap();
        let report = session
            .load_text(r#"{"level": "debug", "rules": [{"x": "a"}]}"#, Format::Json)
            .unwrap();
        assert_eq!(report.appended, 1);
        assert!(!session.needs_save);
        assert_eq!(
            session.collect().tree,
            tree(json!({
                "name": "svc",
                "level": "debug",
                "debug": false,
                "rules": [{"x": "a"}]
            }))
        );
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let mut session = Session::from_json_schema(&schema_json()).unwrap();
        let envelope = tree(json!({
            "schemaId": "svc",
            "timestamp": "2024-01-01",
            "data": {"name": "wrapped"}
        }));
        assert_eq!(envelope_schema_id(&envelope), Some("svc"));
        session.load(&envelope);
        assert_eq!(
            session.bindings().handle(&path("name")).unwrap().raw(),
            "wrapped"
        );

        // a plain `data` field next to real fields is not an envelope
        let plain = tree(json!({"data": {"a": 1}, "name": "x"}));
        assert_eq!(unwrap_envelope(&plain), &plain);
    }

    #[test]
    fn test_edits_mark_dirty() {
        let mut session = Session::from_json_schema(&schema_json()).unwrap();
        session.set_raw(&path("name"), "api").unwrap();
        assert!(session.needs_save);

        session.add_item(&path("ports")).unwrap();
        session.set_raw(&path("ports[0]"), "8080").unwrap();
        session.set_checked(&path("debug"), true).unwrap();
        session.select(&path("level"), "info").unwrap();
        session.add_entry(&path("tags"), "env").unwrap();
        session.set_raw(&path("tags.env"), "prod").unwrap();

        assert_eq!(
            session.collect().tree,
            tree(json!({
                "name": "api",
                "level": "info",
                "debug": true,
                "ports": [8080],
                "tags": {"env": "prod"}
            }))
        );

        assert!(session.remove_entry(&path("tags")).unwrap());
        assert!(!session.remove_entry(&path("tags")).unwrap());
        assert!(session.remove_item(&path("ports")).unwrap());
        assert_eq!(
            session.save_text(Format::Ini).unwrap(),
            "name=api\nlevel=info\ndebug=true"
        );
    }

    #[test]
    fn test_edit_errors() {
        let mut session = Session::from_json_schema(&schema_json()).unwrap();
        assert!(matches!(
            session.set_raw(&path("missing"), "x"),
            Err(PathError::NoBinding(_))
        ));
        assert!(matches!(
            session.select(&path("name"), "x"),
            Err(Error::Path(PathError::WrongKind { .. }))
        ));
        assert!(matches!(
            session.select(&path("level"), "trace"),
            Err(Error::Schema(SchemaError::TypeMismatch { .. }))
        ));
        assert!(matches!(
            session.add_item(&path("tags")),
            Err(PathError::WrongKind { .. })
        ));
        assert!(!session.needs_save);
    }

    #[test]
    fn test_switch_schema() {
        let mut session = Session::from_json_schema(&schema_json()).unwrap();
        session.set_raw(&path("name"), "api").unwrap();
        session
            .switch_schema(SchemaNode::object([("other", SchemaNode::integer())]))
            .unwrap();
        assert!(!session.needs_save);
        assert!(session.bindings().handle(&path("name")).is_none());
        assert_eq!(
            session.switch_schema(SchemaNode::string()),
            Err(SchemaError::RootNotObject)
        );
    }

    #[test]
    fn test_grow_options() {
        let options = Options {
            populate: PopulateOptions::grow_all(),
        };
        let mut session = Session::from_json_schema(&schema_json())
            .unwrap()
            .with_options(options);
        session.load(&tree(json!({"ports": [1, 2], "tags": {"a": "b"}})));
        let gathered = session.collect().tree;
        let map = gathered.as_map().unwrap();
        assert_eq!(map["ports"], tree(json!([1, 2])));
        assert_eq!(map["tags"], tree(json!({"a": "b"})));
    }

    #[test]
    fn test_best_match() {
        let a = SchemaNode::object([("name", SchemaNode::string()), ("port", SchemaNode::integer())]);
        let b = SchemaNode::object([("url", SchemaNode::string())]);
        let data = tree(json!({"id": "cfg-1", "name": "x", "port": 1}));
        assert_eq!(schema_match_score(&a, &data), 2);
        assert_eq!(schema_match_score(&b, &data), 0);
        assert_eq!(best_match([("a", &a), ("b", &b)], &data), Some("a"));
        assert_eq!(best_match([("b", &b)], &data), None);

        let wrapped = tree(json!({"filename": "f.json", "data": {"url": "http://x"}}));
        assert_eq!(best_match([("a", &a), ("b", &b)], &wrapped), Some("b"));
    }

    #[derive(Debug, PartialEq, serde::Deserialize, schemars::JsonSchema)]
    struct Inner {
        enabled: bool,
    }

    #[derive(Debug, PartialEq, serde::Deserialize, schemars::JsonSchema)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Fast,
        Safe,
    }

    #[derive(Debug, PartialEq, serde::Deserialize, schemars::JsonSchema)]
    struct ServiceConfig {
        name: String,
        port: u16,
        mode: Mode,
        hosts: Vec<String>,
        inner: Inner,
        comment: Option<String>,
    }

    #[test]
    fn test_for_type_and_to_typed() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut session = Session::for_type::<ServiceConfig>().unwrap();
        let report = session
            .load_text(
                "name=api\nport=8080\nmode=safe\nhosts[0]=a\nhosts[1]=b\n\n[inner]\nenabled=true",
                Format::Ini,
            )
            .unwrap();
        assert_eq!(report.ignored, 2);
        session.add_item(&path("hosts")).unwrap();
        session.set_raw(&path("hosts[0]"), "a").unwrap();

        let config: ServiceConfig = session.to_typed().unwrap();
        assert_eq!(
            config,
            ServiceConfig {
                name: "api".into(),
                port: 8080,
                mode: Mode::Safe,
                hosts: vec!["a".into()],
                inner: Inner { enabled: true },
                comment: None,
            }
        );
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, bail};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::{
    format::Format,
    populate::PopulateOptions,
    schema::SchemaNode,
    session::{Options, Session},
    value::DataTree,
};

/// Derive a default schema path from a config path.
///
/// `dir/app.toml` maps to `dir/app-schema.json`.
pub fn default_schema_by_init(config: &Path) -> PathBuf {
    let file_name = config
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name_split = file_name.split('.').collect::<Vec<_>>();
    if name_split.len() > 1 {
        name_split.pop();
    }

    let name = format!("{}-schema.json", name_split.join("."));

    match config.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Read and parse a JSON Schema file describing a configuration root.
pub fn load_schema(path: &Path) -> anyhow::Result<SchemaNode> {
    if !path.exists() {
        bail!("Schema file does not exist: {}", path.display());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let schema_json: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let schema = SchemaNode::root_from_json_schema(&schema_json)
        .with_context(|| format!("Unusable schema {}", path.display()))?;
    Ok(schema)
}

/// Read session options from a TOML file.
pub fn load_options(path: &Path) -> anyhow::Result<Options> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let options = toml::from_str(&content)
        .with_context(|| format!("Invalid options in {}", path.display()))?;
    Ok(options)
}

/// Options for loading into fresh bindings: the TOML file at `path`, or
/// growing every list and map when there is none.
pub fn options_or_grow_all(path: Option<&Path>) -> anyhow::Result<Options> {
    match path {
        Some(path) => load_options(path),
        None => Ok(Options {
            populate: PopulateOptions::grow_all(),
        }),
    }
}

/// Read a document from disk, picking the format by extension.
///
/// A missing file reads as an empty mapping.
pub fn read_tree(path: &Path, format: Option<Format>) -> anyhow::Result<DataTree> {
    let format = match format {
        Some(f) => f,
        None => Format::from_path(path)?,
    };
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let tree = format
        .decode(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(tree)
}

/// Load `config_path` into a session for `schema`, let `edit` change it,
/// and write it back when the session was edited.
///
/// The file is loaded into a fresh binding tree growing every list and
/// map, so saving keeps all of its data; `options` apply to loads made by
/// `edit`. The previous file, if any, is copied to `<name>.bk-<secs>.<ext>`
/// before it is overwritten. Returns the saved tree, or `None` when nothing
/// changed.
pub fn edit_file<F>(
    config_path: impl AsRef<Path>,
    schema: SchemaNode,
    options: Options,
    edit: F,
) -> anyhow::Result<Option<DataTree>>
where
    F: FnOnce(&mut Session) -> anyhow::Result<()>,
{
    let config_path = config_path.as_ref();
    let format = Format::from_path(config_path)?;

    let mut session = Session::new(schema)?;
    session.options.populate = PopulateOptions::grow_all();
    if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        session.load_text(&content, format)?;
    }
    session.options = options;

    edit(&mut session)?;
    if !session.needs_save {
        return Ok(None);
    }

    let gathered = session.collect();
    for issue in &gathered.issues {
        warn!("not saved: {issue}");
    }
    let mut content = format.encode(&gathered.tree)?;
    if format == Format::Ini {
        content.push('\n');
    }

    if config_path.exists() {
        let bk = format!(
            "bk-{:?}.{}",
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)?
                .as_secs(),
            format.extension()
        );
        let backup_path = config_path.with_extension(bk);
        fs::copy(config_path, &backup_path)
            .with_context(|| format!("Failed to back up {}", config_path.display()))?;
        debug!("backed up {} to {}", config_path.display(), backup_path.display());
    }
    fs::write(config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!("saved {}", config_path.display());

    session.needs_save = false;
    Ok(Some(gathered.tree))
}

/// Run the edit workflow for a typed config.
///
/// When `always_edit` is false and the config file already parses as `C`,
/// the parsed config is returned without calling `edit`. Otherwise the
/// file is edited through [`edit_file`] with the schema derived from `C`.
pub fn run<C, F>(
    config_path: impl AsRef<Path>,
    always_edit: bool,
    edit: F,
) -> anyhow::Result<Option<C>>
where
    C: JsonSchema + DeserializeOwned,
    F: FnOnce(&mut Session) -> anyhow::Result<()>,
{
    let config_path = config_path.as_ref();

    if !always_edit
        && config_path.exists()
        && let Ok(c) = to_typed::<C>(config_path)
    {
        return Ok(Some(c));
    }

    let schema = Session::for_type::<C>()?.schema().clone();
    let Some(tree) = edit_file(config_path, schema, Options::default(), edit)? else {
        return Ok(None);
    };
    let c = serde_json::from_value(tree.to_json())
        .with_context(|| format!("Edited config does not match {}", config_path.display()))?;
    Ok(Some(c))
}

fn to_typed<C: DeserializeOwned>(path: &Path) -> anyhow::Result<C> {
    let tree = read_tree(path, None)?;
    Ok(serde_json::from_value(tree.to_json())?)
}

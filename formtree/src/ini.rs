//! Flattened, line-oriented text encoding of data trees.
//!
//! ```text
//! ; comment
//! name=svc
//! ports[0]=80
//! ports[1]=443
//!
//! [rules.retry[0]]
//! delay=1.5
//! ```
//!
//! Scalars are written as `key=value` relative to the current `[section]`,
//! scalar list items as `key[i]=value`, and every nested mapping (including
//! mappings inside lists) gets its own section named by its full path.
//! The format does not depend on a schema; values are typed on decode by
//! their look alone.

use std::fmt;

use crate::{
    path::{Path, Segment},
    value::{DataTree, Map},
};

/// A line that [`decode`] could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    pub reason: String,
}

impl fmt::Display for SkippedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.text)
    }
}

/// Result of [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Always a mapping.
    pub tree: DataTree,
    pub skipped: Vec<SkippedLine>,
}

/// Encode a tree whose root is a mapping.
///
/// Lines are joined with `\n` and there is no trailing newline. Any other
/// root encodes to an empty string.
pub fn encode(tree: &DataTree) -> String {
    let Some(map) = tree.as_map() else {
        warn!("ini: cannot encode a {} root", tree.kind());
        return String::new();
    };
    let mut encoder = Encoder { lines: Vec::new() };
    encoder.section(&Path::root(), map);
    encoder.lines.join("\n")
}

struct Encoder {
    lines: Vec<String>,
}

impl Encoder {
    fn section(&mut self, path: &Path, map: &Map) {
        let mut body = Vec::new();
        for (key, value) in map {
            if key.is_empty() || key.contains(['.', '[', ']', '=']) {
                warn!("ini: key {key:?} under `{path}` will not decode to the same path");
            }
            match value {
                DataTree::Map(_) => {}
                DataTree::List(items) => scalar_items(&mut body, key, items),
                scalar => body.push(format!("{key}={}", scalar_text(scalar))),
            }
        }

        if !path.is_root() && !map.is_empty() {
            if !self.lines.is_empty() {
                self.lines.push(String::new());
            }
            self.lines.push(format!("[{path}]"));
        }
        self.lines.append(&mut body);

        for (key, value) in map {
            match value {
                DataTree::Map(child) if !child.is_empty() => self.section(&path.key(key), child),
                DataTree::List(items) => self.list_sections(&path.key(key), items),
                _ => {}
            }
        }
    }

    fn list_sections(&mut self, path: &Path, items: &[DataTree]) {
        for (i, item) in items.iter().enumerate() {
            match item {
                DataTree::Map(child) => self.section(&path.index(i), child),
                DataTree::List(nested) => self.list_sections(&path.index(i), nested),
                _ => {}
            }
        }
    }
}

/// `key[i]=value` lines for the scalar items of a list, nested lists
/// included.
fn scalar_items(out: &mut Vec<String>, key: &str, items: &[DataTree]) {
    for (i, item) in items.iter().enumerate() {
        match item {
            DataTree::Map(_) => {}
            DataTree::List(nested) => scalar_items(out, &format!("{key}[{i}]"), nested),
            scalar => out.push(format!("{key}[{i}]={}", scalar_text(scalar))),
        }
    }
}

fn scalar_text(value: &DataTree) -> String {
    match value {
        DataTree::Bool(b) => b.to_string(),
        DataTree::Integer(i) => i.to_string(),
        // Debug keeps a trailing `.0` so the value decodes as a float.
        DataTree::Number(n) => format!("{n:?}"),
        DataTree::String(s) => escape(s),
        DataTree::List(_) | DataTree::Map(_) => String::new(),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Current section while decoding.
enum Section {
    Root,
    Named(String),
    /// The last header was malformed; its keys are skipped.
    Broken,
}

/// Decode flattened text. Never fails; unusable lines are reported in
/// [`Decoded::skipped`].
pub fn decode(text: &str) -> Decoded {
    let mut tree = DataTree::empty_map();
    let mut skipped = Vec::new();
    let mut section = Section::Root;

    for (n, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        let result = if line.starts_with('[') && line.ends_with(']') && !line.contains('=') {
            match header(&line[1..line.len() - 1]) {
                Ok(next) => {
                    section = next;
                    Ok(())
                }
                Err(reason) => {
                    section = Section::Broken;
                    Err(reason)
                }
            }
        } else {
            assign_line(&mut tree, &section, line)
        };

        if let Err(reason) = result {
            warn!("ini: skipping line {}: {reason}: {raw_line:?}", n + 1);
            skipped.push(SkippedLine {
                line: n + 1,
                text: raw_line.to_string(),
                reason,
            });
        }
    }

    if !skipped.is_empty() {
        debug!("ini: {} line(s) skipped", skipped.len());
    }
    Decoded { tree, skipped }
}

fn header(name: &str) -> Result<Section, String> {
    let name = name.trim();
    match name.parse::<Path>() {
        Ok(path) if matches!(path.segments().first(), Some(Segment::Key(_))) => {
            Ok(Section::Named(path.to_string()))
        }
        Ok(_) => Err(format!("malformed section `{name}`: must start with a key")),
        Err(e) => Err(format!("malformed section: {e}")),
    }
}

fn assign_line(tree: &mut DataTree, section: &Section, line: &str) -> Result<(), String> {
    let section = match section {
        Section::Root => "",
        Section::Named(name) => name.as_str(),
        Section::Broken => return Err("inside a malformed section".into()),
    };
    let (key, value) = line.split_once('=').ok_or("missing `=`")?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty key".into());
    }
    let path = Path::join_str(section, key)
        .parse::<Path>()
        .map_err(|e| e.to_string())?;
    if matches!(path.segments().first(), Some(Segment::Index(_))) {
        return Err("path must start with a key".into());
    }
    path.assign(tree, parse_scalar(value.trim()))
        .map_err(|e| e.to_string())
}

/// Type a raw value by its look: booleans, then numbers, then strings.
fn parse_scalar(raw: &str) -> DataTree {
    match raw {
        "true" => return DataTree::Bool(true),
        "false" => return DataTree::Bool(false),
        _ => {}
    }
    if looks_numeric(raw) {
        if raw.contains('.') {
            if let Ok(n) = raw.parse::<f64>()
                && n.is_finite()
            {
                return DataTree::Number(n);
            }
        } else if let Ok(i) = raw.parse::<i64>() {
            return DataTree::Integer(i);
        } else if let Ok(n) = raw.parse::<f64>()
            && n.is_finite()
        {
            return DataTree::Number(n);
        }
    }
    DataTree::String(unescape(raw))
}

fn looks_numeric(raw: &str) -> bool {
    raw.bytes().any(|b| b.is_ascii_digit())
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

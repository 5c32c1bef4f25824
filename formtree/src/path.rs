//! Canonical addressing of nodes in data trees and binding trees.
//!
//! A path is a list of segments. Its string form joins keys with `.` and
//! appends array indices as `[n]` with no separator:
//!
//! ```
//! use formtree::path::{Path, Segment};
//!
//! let path: Path = "rules.retry[2].delay".parse().unwrap();
//! assert_eq!(
//!     path.segments(),
//!     &[
//!         Segment::Key("rules".into()),
//!         Segment::Key("retry".into()),
//!         Segment::Index(2),
//!         Segment::Key("delay".into()),
//!     ]
//! );
//! assert_eq!(path.to_string(), "rules.retry[2].delay");
//! ```
//!
//! Keys must not contain `.`, `[` or `]`; the schema parser rejects such
//! field names so every path derived from a schema round-trips.

use std::{fmt, str::FromStr};

use crate::{error::PathError, value::DataTree};

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named child of a mapping.
    Key(String),
    /// Position in a list.
    Index(usize),
}

/// Address of a node, relative to a tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

/// Most placeholders a single [`Path::assign`] may append to one list.
///
/// Indices further past the end of a list are rejected with
/// [`PathError::IndexTooFar`].
pub const MAX_PADDING: usize = 4096;

/// True when `key` can be used as a path segment without escaping.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '[', ']'])
}

impl Path {
    /// The empty path, addressing the root itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(Segment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Child path with a named segment appended.
    pub fn key(&self, key: impl Into<String>) -> Path {
        let mut path = self.clone();
        path.push_key(key);
        path
    }

    /// Like [`Path::key`], but rejects keys that would not survive a
    /// round trip through the string form.
    pub fn checked_key(&self, key: &str) -> Result<Path, PathError> {
        if !is_valid_key(key) {
            return Err(PathError::InvalidKey(key.to_string()));
        }
        Ok(self.key(key))
    }

    /// Child path with an index segment appended.
    pub fn index(&self, index: usize) -> Path {
        let mut path = self.clone();
        path.push_index(index);
        path
    }

    /// Path of the enclosing node, `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, rest) = self.segments.split_last()?;
        Some(Path {
            segments: rest.to_vec(),
        })
    }

    /// Concatenate `other` below `self`.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    /// Join a section name and a key in string form.
    ///
    /// Keys that begin with an index (`[0]`) attach without a separator.
    pub fn join_str(section: &str, key: &str) -> String {
        if section.is_empty() {
            key.to_string()
        } else if key.starts_with('[') {
            format!("{section}{key}")
        } else {
            format!("{section}.{key}")
        }
    }

    fn prefix(&self, len: usize) -> Path {
        Path {
            segments: self.segments[..len].to_vec(),
        }
    }

    /// Look up the node at this path.
    pub fn resolve<'a>(&self, tree: &'a DataTree) -> Option<&'a DataTree> {
        self.segments
            .iter()
            .try_fold(tree, |node, segment| match segment {
                Segment::Key(key) => node.as_map()?.get(key),
                Segment::Index(index) => node.as_list()?.get(*index),
            })
    }

    /// Store `value` at this path, creating intermediate nodes.
    ///
    /// Missing mappings and lists are created on the way down. Lists that
    /// are too short are padded with empty mappings, since list items are
    /// assumed to be objects until a scalar is written into them. An empty
    /// mapping placeholder is turned into a list when an index follows it.
    /// An index more than [`MAX_PADDING`] past the end of its list fails
    /// before anything is created.
    pub fn assign(&self, tree: &mut DataTree, value: DataTree) -> Result<(), PathError> {
        self.check_padding(tree)?;
        let Some((last, init)) = self.segments.split_last() else {
            *tree = value;
            return Ok(());
        };

        let mut node = tree;
        for (depth, segment) in init.iter().enumerate() {
            let wants_list = matches!(self.segments[depth + 1], Segment::Index(_));
            node = self.descend(node, segment, depth, wants_list)?;
        }

        match last {
            Segment::Key(key) => {
                let map = node.as_map_mut().ok_or_else(|| PathError::ShapeConflict {
                    path: self.prefix(init.len()).to_string(),
                    expected: "object",
                })?;
                map.insert(key.clone(), value);
            }
            Segment::Index(index) => {
                let list = as_list_or_placeholder(node).ok_or_else(|| {
                    PathError::ShapeConflict {
                        path: self.prefix(init.len()).to_string(),
                        expected: "array",
                    }
                })?;
                pad_list(list, *index);
                list[*index] = value;
            }
        }
        Ok(())
    }

    fn check_padding(&self, tree: &DataTree) -> Result<(), PathError> {
        let mut node = Some(tree);
        for (depth, segment) in self.segments.iter().enumerate() {
            node = match segment {
                Segment::Key(key) => node.and_then(|n| n.as_map()?.get(key)),
                Segment::Index(index) => {
                    let items = node.and_then(DataTree::as_list);
                    let len = items.map_or(0, |items| items.len());
                    if *index >= len && *index - len > MAX_PADDING {
                        return Err(PathError::IndexTooFar {
                            path: self.prefix(depth + 1).to_string(),
                            len,
                        });
                    }
                    items.and_then(|items| items.get(*index))
                }
            };
        }
        Ok(())
    }

    fn descend<'a>(
        &self,
        node: &'a mut DataTree,
        segment: &Segment,
        depth: usize,
        wants_list: bool,
    ) -> Result<&'a mut DataTree, PathError> {
        match segment {
            Segment::Key(key) => {
                let map = node.as_map_mut().ok_or_else(|| PathError::ShapeConflict {
                    path: self.prefix(depth).to_string(),
                    expected: "object",
                })?;
                Ok(map.entry(key.clone()).or_insert_with(|| {
                    if wants_list {
                        DataTree::List(Vec::new())
                    } else {
                        DataTree::empty_map()
                    }
                }))
            }
            Segment::Index(index) => {
                let list = as_list_or_placeholder(node).ok_or_else(|| {
                    PathError::ShapeConflict {
                        path: self.prefix(depth).to_string(),
                        expected: "array",
                    }
                })?;
                pad_list(list, *index);
                Ok(&mut list[*index])
            }
        }
    }
}

fn as_list_or_placeholder(node: &mut DataTree) -> Option<&mut Vec<DataTree>> {
    if matches!(node, DataTree::Map(map) if map.is_empty()) {
        *node = DataTree::List(Vec::new());
    }
    node.as_list_mut()
}

fn pad_list(list: &mut Vec<DataTree>, index: usize) {
    if index >= list.len() {
        list.resize_with(index + 1, DataTree::empty_map);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| PathError::Malformed {
            input: s.to_string(),
            reason,
        };

        let mut path = Path::root();
        if s.is_empty() {
            return Ok(path);
        }

        for (n, part) in s.split('.').enumerate() {
            let (name, mut indices) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };

            if name.is_empty() && (n > 0 || indices.is_empty()) {
                return Err(malformed("empty key"));
            }
            if name.contains(']') {
                return Err(malformed("unexpected `]`"));
            }
            if !name.is_empty() {
                path.push_key(name);
            }

            while !indices.is_empty() {
                let body = indices
                    .strip_prefix('[')
                    .ok_or_else(|| malformed("expected `[` after index"))?;
                let close = body.find(']').ok_or_else(|| malformed("unclosed `[`"))?;
                let digits = &body[..close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed("index must be a non-negative integer"));
                }
                let index = digits
                    .parse()
                    .map_err(|_| malformed("index out of range"))?;
                path.push_index(index);
                indices = &body[close + 1..];
            }
        }

        Ok(path)
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DataTree {
        DataTree::from_json(&value).unwrap()
    }

    #[test]
    fn test_parse_and_display_inverse() {
        let cases = [
            "",
            "a",
            "a.b.c",
            "rules.retry[2].delay",
            "grid[1][0]",
            "[3].name",
            "items[0][1].x[2]",
        ];
        for case in cases {
            let path: Path = case.parse().unwrap();
            assert_eq!(path.to_string(), case);
        }
    }

    #[test]
    fn test_segments_roundtrip() {
        let path = Path::from(vec![
            Segment::Index(0),
            Segment::Key("a".into()),
            Segment::Index(4),
            Segment::Index(5),
            Segment::Key("b".into()),
        ]);
        let reparsed: Path = path.to_string().parse().unwrap();
        assert_eq!(reparsed, path);
    }

    #[test]
    fn test_parse_malformed() {
        for bad in ["a..b", ".a", "a.", "a[", "a[x]", "a[]", "a]b", "a[0]x", "a.[0]", "[-1]"] {
            assert!(bad.parse::<Path>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_join_str() {
        assert_eq!(Path::join_str("", "a"), "a");
        assert_eq!(Path::join_str("sec", "a"), "sec.a");
        assert_eq!(Path::join_str("b[0]", "x"), "b[0].x");
        assert_eq!(Path::join_str("list", "[2]"), "list[2]");
    }

    #[test]
    fn test_parent_and_builders() {
        let path = Path::root().key("a").index(1).key("b");
        assert_eq!(path.to_string(), "a[1].b");
        assert_eq!(path.parent().unwrap().to_string(), "a[1]");
        assert!(Path::root().parent().is_none());
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_resolve() {
        let t = tree(json!({"a": {"b": [10, {"c": "x"}]}}));
        let c: Path = "a.b[1].c".parse().unwrap();
        assert_eq!(c.resolve(&t), Some(&DataTree::from("x")));
        let b0: Path = "a.b[0]".parse().unwrap();
        assert_eq!(b0.resolve(&t), Some(&DataTree::Integer(10)));
        let missing: Path = "a.b[5]".parse().unwrap();
        assert!(missing.resolve(&t).is_none());
        let wrong: Path = "a[0]".parse().unwrap();
        assert!(wrong.resolve(&t).is_none());
    }

    #[test]
    fn test_assign_creates_intermediates() {
        let mut t = DataTree::empty_map();
        let path: Path = "rules.retry[2].delay".parse().unwrap();
        path.assign(&mut t, DataTree::Integer(5)).unwrap();
        assert_eq!(
            t,
            tree(json!({"rules": {"retry": [{}, {}, {"delay": 5}]}}))
        );
    }

    #[test]
    fn test_assign_scalar_into_list() {
        let mut t = DataTree::empty_map();
        "names[1]"
            .parse::<Path>()
            .unwrap()
            .assign(&mut t, "bo".into())
            .unwrap();
        "names[0]"
            .parse::<Path>()
            .unwrap()
            .assign(&mut t, "ann".into())
            .unwrap();
        assert_eq!(t, tree(json!({"names": ["ann", "bo"]})));
    }

    #[test]
    fn test_assign_placeholder_becomes_list() {
        let mut t = DataTree::empty_map();
        "grid[1][0]"
            .parse::<Path>()
            .unwrap()
            .assign(&mut t, DataTree::Integer(7))
            .unwrap();
        assert_eq!(t, tree(json!({"grid": [{}, [7]]})));
    }

    #[test]
    fn test_assign_shape_conflict() {
        let mut t = tree(json!({"a": 1}));
        let err = "a.b"
            .parse::<Path>()
            .unwrap()
            .assign(&mut t, DataTree::Bool(true))
            .unwrap_err();
        assert_eq!(
            err,
            PathError::ShapeConflict {
                path: "a".into(),
                expected: "object"
            }
        );

        let mut t = tree(json!({"a": {"k": 1}}));
        assert!(
            "a[0]"
                .parse::<Path>()
                .unwrap()
                .assign(&mut t, DataTree::Bool(true))
                .is_err()
        );
    }

    #[test]
    fn test_assign_rejects_far_index() {
        let mut t = tree(json!({"a": [1]}));
        let err = "a[100000].b"
            .parse::<Path>()
            .unwrap()
            .assign(&mut t, DataTree::Integer(1))
            .unwrap_err();
        assert_eq!(
            err,
            PathError::IndexTooFar {
                path: "a[100000]".into(),
                len: 1
            }
        );
        assert_eq!(t, tree(json!({"a": [1]})));

        let max: Path = format!("x[{}]", usize::MAX).parse().unwrap();
        assert!(max.assign(&mut t, DataTree::Integer(1)).is_err());
        // nothing is created on the way down
        assert_eq!(t, tree(json!({"a": [1]})));

        let edge: Path = format!("e[{MAX_PADDING}]").parse().unwrap();
        edge.assign(&mut t, DataTree::Integer(1)).unwrap();
        assert_eq!(edge.resolve(&t), Some(&DataTree::Integer(1)));
    }

    #[test]
    fn test_valid_key() {
        assert!(is_valid_key("name"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("a.b"));
        assert!(!is_valid_key("a[0]"));
        assert_eq!(
            Path::root().checked_key("a.b").unwrap_err(),
            PathError::InvalidKey("a.b".into())
        );
        assert_eq!(Path::root().checked_key("ab").unwrap().to_string(), "ab");
    }
}

//! fmf metadata trees: node hierarchy, inheritance and loading.
//!
//! A tree is read from a single YAML document or from a directory laid out
//! the fmf way. Keys starting with `/` declare child nodes; every other key
//! is node data. Each node's data is inherited by its children, with key
//! suffixes applied as described in [`merge`].

mod loader;
pub mod merge;

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

pub use merge::{KeyOp, MergeError, apply_data, kind_of, split_key};

/// Errors raised while reading or building a tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("node {node:?} must be a mapping, found {found}")]
    NotAMapping { node: String, found: &'static str },

    #[error("node {node:?} has a non-string key {key}")]
    InvalidKey { node: String, key: String },

    #[error("invalid child name {name:?} under node {parent:?}")]
    InvalidName { parent: String, name: String },

    #[error("cannot inherit data into node {node:?}: {source}")]
    Merge {
        node: String,
        #[source]
        source: MergeError,
    },

    #[error("cyclic reference: {} is its own ancestor", .path.display())]
    CyclicReference { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node of a built tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    name: String,
    own: Mapping,
    data: Mapping,
    children: Vec<Node>,
}

impl Node {
    /// Path-like node name, `/` for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data exactly as declared on this node, key suffixes included.
    pub fn own(&self) -> &Mapping {
        &self.own
    }

    /// Data after inheritance from all ancestors.
    pub fn data(&self) -> &Mapping {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node>) {
        if self.is_leaf() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }
}

/// Join a parent node name and a child segment.
pub fn join_name(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Normalize a user-supplied node name: leading slash, no trailing slash.
pub fn normalize_name(name: &str) -> String {
    let segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Render a scalar YAML value as text. Returns `None` for collections.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Raw nodes (before inheritance)
// ---------------------------------------------------------------------------

/// Node data as read from the source, before inheritance is applied.
#[derive(Debug, Default)]
pub(crate) struct RawNode {
    own: Mapping,
    children: Vec<(String, RawNode)>,
    /// Whether any source declared this node.
    defined: bool,
}

impl RawNode {
    fn child_mut(&mut self, name: &str) -> &mut RawNode {
        let index = match self.children.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.children.push((name.to_owned(), RawNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    /// Whether this node or any descendant was declared by a source.
    fn is_defined(&self) -> bool {
        self.defined || self.children.iter().any(|(_, child)| child.is_defined())
    }

    /// Merge a separately read node into the child `name`.
    fn attach(&mut self, name: &str, other: RawNode) {
        self.child_mut(name).merge(other);
    }

    fn merge(&mut self, other: RawNode) {
        self.defined |= other.defined;
        for (key, value) in other.own {
            self.own.insert(key, value);
        }
        for (name, child) in other.children {
            self.attach(&name, child);
        }
    }

    /// Absorb a mapping declared for the node called `node`.
    fn absorb(&mut self, mapping: Mapping, node: &str) -> Result<(), TreeError> {
        self.defined = true;
        for (key, value) in mapping {
            let Some(text) = key.as_str() else {
                return Err(TreeError::InvalidKey {
                    node: node.to_owned(),
                    key: format!("{key:?}"),
                });
            };
            let Some(rest) = text.strip_prefix('/') else {
                self.own.insert(key, value);
                continue;
            };

            let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                return Err(TreeError::InvalidName {
                    parent: node.to_owned(),
                    name: text.to_owned(),
                });
            }

            let mut child = &mut *self;
            let mut child_name = node.to_owned();
            for segment in segments {
                child_name = join_name(&child_name, segment);
                child = child.child_mut(segment);
                child.defined = true;
            }
            let data = as_mapping(value, &child_name)?;
            child.absorb(data, &child_name)?;
        }
        Ok(())
    }

    /// Apply inheritance and produce the final node.
    fn build(self, name: String, inherited: &Mapping) -> Result<Node, TreeError> {
        let mut data = inherited.clone();
        apply_data(&mut data, &self.own).map_err(|source| TreeError::Merge {
            node: name.clone(),
            source,
        })?;

        let mut children = Vec::with_capacity(self.children.len());
        for (child_name, raw) in self.children {
            if !raw.is_defined() {
                continue;
            }
            children.push(raw.build(join_name(&name, &child_name), &data)?);
        }

        Ok(Node {
            name,
            own: self.own,
            data,
            children,
        })
    }
}

/// Interpret a node value as a mapping; `null` is an empty node.
fn as_mapping(value: Value, node: &str) -> Result<Mapping, TreeError> {
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(TreeError::NotAMapping {
            node: node.to_owned(),
            found: kind_of(&other),
        }),
    }
}

fn parse_document(src: &str, origin: &str, node: &str) -> Result<Mapping, TreeError> {
    let value: Value = serde_yaml::from_str(src).map_err(|source| TreeError::Yaml {
        origin: origin.to_owned(),
        source,
    })?;
    as_mapping(value, node)
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A fully built metadata tree.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Node,
    origin: String,
}

impl Tree {
    /// Build a tree from a single YAML document.
    pub fn from_yaml_str(src: &str) -> Result<Self, TreeError> {
        Self::from_document(src, "<string>")
    }

    /// Load a tree from a YAML file or an fmf directory.
    pub fn load(path: &Path) -> Result<Self, TreeError> {
        if path.is_dir() {
            let raw = loader::load_dir(path)?;
            Self::build(raw, path.display().to_string())
        } else {
            let src = std::fs::read_to_string(path).map_err(|source| TreeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_document(&src, &path.display().to_string())
        }
    }

    fn from_document(src: &str, origin: &str) -> Result<Self, TreeError> {
        let mapping = parse_document(src, origin, "/")?;
        let mut raw = RawNode::default();
        raw.absorb(mapping, "/")?;
        Self::build(raw, origin.to_owned())
    }

    fn build(raw: RawNode, origin: String) -> Result<Self, TreeError> {
        let root = raw.build("/".to_owned(), &Mapping::new())?;
        let tree = Self { root, origin };
        debug!(origin = %tree.origin, leaves = tree.leaves().len(), "built metadata tree");
        Ok(tree)
    }

    /// Where the tree was read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Look up a node by name (`/distro/sanity`, `distro/sanity`).
    pub fn find(&self, name: &str) -> Option<&Node> {
        let mut node = &self.root;
        for segment in name.split('/').filter(|s| !s.is_empty()) {
            let wanted = join_name(&node.name, segment);
            node = node.children.iter().find(|c| c.name == wanted)?;
        }
        Some(node)
    }

    /// Leaf nodes in document order (depth first).
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
summary: root
tag: [base]
/a:
    summary: first
    tag+: [extra]
    /x:
        tier: 1
/b/y:
    summary: nested via path key
"#;

    #[test]
    fn builds_hierarchy_in_document_order() {
        let tree = Tree::from_yaml_str(DOC).expect("should build");
        let names: Vec<&str> = tree.leaves().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["/a/x", "/b/y"]);
        assert!(tree.find("/b").is_some());
        assert!(!tree.find("/b").unwrap().is_leaf());
    }

    #[test]
    fn children_inherit_and_append() {
        let tree = Tree::from_yaml_str(DOC).unwrap();
        let x = tree.find("a/x").unwrap();
        assert_eq!(x.get("summary").and_then(Value::as_str), Some("first"));
        let tags: Vec<&str> = x
            .get("tag")
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(tags, vec!["base", "extra"]);
        assert!(x.own().contains_key("tier"));
        assert!(!x.own().contains_key("tag"));
    }

    #[test]
    fn repeated_child_declarations_merge() {
        let tree = Tree::from_yaml_str("/a:\n  one: 1\n/a/b:\n  two: 2\n/a/c: {}\n").unwrap();
        let names: Vec<&str> = tree.leaves().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["/a/b", "/a/c"]);
        assert_eq!(tree.find("/a/b").unwrap().get("one"), Some(&Value::from(1)));
    }

    #[test]
    fn empty_document_is_single_root_leaf() {
        let tree = Tree::from_yaml_str("").unwrap();
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].name(), "/");
    }

    #[test]
    fn rejects_non_mapping_child() {
        let err = Tree::from_yaml_str("/a: [1, 2]").unwrap_err();
        assert!(
            matches!(err, TreeError::NotAMapping { ref node, found: "sequence" } if node == "/a"),
            "expected NotAMapping, got: {err}"
        );
    }

    #[test]
    fn rejects_bare_slash_key() {
        let err = Tree::from_yaml_str("/: {}").unwrap_err();
        assert!(matches!(err, TreeError::InvalidName { .. }), "got: {err}");
    }

    #[test]
    fn reports_merge_conflicts_with_node_name() {
        let err = Tree::from_yaml_str("tag: [a]\n/x:\n  tag+: word\n").unwrap_err();
        assert!(
            matches!(err, TreeError::Merge { ref node, .. } if node == "/x"),
            "expected Merge, got: {err}"
        );
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = Tree::from_yaml_str("a: [unclosed").unwrap_err();
        assert!(matches!(err, TreeError::Yaml { .. }), "got: {err}");
    }

    #[test]
    fn normalize_name_handles_slashes() {
        assert_eq!(normalize_name("distro/sanity/"), "/distro/sanity");
        assert_eq!(normalize_name("/"), "/");
        assert_eq!(normalize_name(""), "/");
    }
}

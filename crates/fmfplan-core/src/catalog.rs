//! Test catalogs: the metadata a discover filter selects from.
//!
//! A catalog is an fmf tree whose leaves are tests. Attribute values are
//! flattened to strings so filters can compare them; anything that is not
//! a scalar or a list of scalars is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;
use tracing::debug;

use crate::plan::ResolvedPlan;
use crate::tree::{Node, Tree, TreeError, scalar_text};

/// Metadata of one discovered test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl TestMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.insert(key.into(), values);
        self
    }

    /// Values of `key`; empty when the test does not carry it.
    pub fn values(&self, key: &str) -> &[String] {
        self.attributes.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn from_node(node: &Node) -> Self {
        let mut meta = Self::new(node.name());
        for (key, value) in node.data() {
            let Some(key) = key.as_str() else {
                continue;
            };
            if key == "summary" {
                meta.summary = scalar_text(value);
                continue;
            }
            let values = match value {
                Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
                other => match scalar_text(other) {
                    Some(text) => vec![text],
                    None => continue,
                },
            };
            meta.attributes.insert(key.to_owned(), values);
        }
        meta
    }
}

/// All tests of a metadata tree, in document order.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
    tests: Vec<TestMeta>,
}

impl TestCatalog {
    pub fn from_tree(tree: &Tree) -> Self {
        let tests: Vec<TestMeta> = tree.leaves().into_iter().map(TestMeta::from_node).collect();
        debug!(origin = tree.origin(), tests = tests.len(), "loaded test catalog");
        Self { tests }
    }

    pub fn load(path: &Path) -> Result<Self, TreeError> {
        Ok(Self::from_tree(&Tree::load(path)?))
    }

    pub fn from_yaml_str(src: &str) -> Result<Self, TreeError> {
        Ok(Self::from_tree(&Tree::from_yaml_str(src)?))
    }

    pub fn tests(&self) -> &[TestMeta] {
        &self.tests
    }

    /// Tests the plan's discover policy selects.
    pub fn select(&self, plan: &ResolvedPlan) -> Vec<&TestMeta> {
        self.tests.iter().filter(|test| plan.selects(test)).collect()
    }
}

//! Evaluation context: the dimensions `when` guards are evaluated against.
//!
//! Dimensions map to one or more values (`distro=fedora-40,centos-stream-9`).
//! Values compare with distro-style version awareness: `fedora` matches
//! `fedora-40`, and `fedora-40` matches `fedora-40.1` but not `fedora-41`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing `name=value` context specs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context spec {0:?} must look like name=value")]
    MissingEquals(String),

    #[error("context spec {0:?} has an empty dimension name")]
    EmptyName(String),

    #[error("context spec {0:?} has no value")]
    EmptyValue(String),
}

/// A set of named dimensions with their values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    dimensions: BTreeMap<String, Vec<String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style single value setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, vec![value.into()]);
        self
    }

    /// Set (replace) the values of a dimension.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.dimensions.insert(name.into(), values);
    }

    /// Parse one `name=value[,value...]` spec.
    pub fn parse_spec(spec: &str) -> Result<(String, Vec<String>), ContextError> {
        let (name, values) = spec
            .split_once('=')
            .ok_or_else(|| ContextError::MissingEquals(spec.to_owned()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ContextError::EmptyName(spec.to_owned()));
        }
        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect();
        if values.is_empty() {
            return Err(ContextError::EmptyValue(spec.to_owned()));
        }
        Ok((name.to_owned(), values))
    }

    /// Build a context from a list of specs. Later specs win.
    pub fn from_specs<I, S>(specs: I) -> Result<Self, ContextError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut context = Self::new();
        for spec in specs {
            let (name, values) = Self::parse_spec(spec.as_ref())?;
            context.set(name, values);
        }
        Ok(context)
    }

    /// Overlay `other` on top of `self`; dimensions in `other` win.
    pub fn merge(&mut self, other: &Context) {
        for (name, values) in &other.dimensions {
            self.dimensions.insert(name.clone(), values.clone());
        }
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.dimensions.get(name).map(Vec::as_slice)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.dimensions.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.dimensions
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, values) in &self.dimensions {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{name}={}", values.join(","))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Value comparison
// ---------------------------------------------------------------------------

/// A context value split into its name and version parts.
///
/// The name is every `-`-separated component up to the first one starting
/// with a digit; the rest, split on `-` and `.`, are the version parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Versioned<'a> {
    name: String,
    parts: Vec<&'a str>,
}

impl<'a> Versioned<'a> {
    fn parse(value: &'a str) -> Self {
        let mut name_parts = Vec::new();
        let mut parts = Vec::new();
        let mut in_version = false;
        for component in value.split('-') {
            if !in_version && component.starts_with(|c: char| c.is_ascii_digit()) {
                in_version = true;
            }
            if in_version {
                parts.extend(component.split('.').filter(|p| !p.is_empty()));
            } else {
                name_parts.push(component);
            }
        }
        Self {
            name: name_parts.join("-"),
            parts,
        }
    }
}

/// Whether the context value `actual` matches the guard value `wanted`.
pub fn value_matches(actual: &str, wanted: &str) -> bool {
    if actual == wanted {
        return true;
    }
    let actual = Versioned::parse(actual);
    let wanted = Versioned::parse(wanted);
    actual.name == wanted.name && actual.parts.starts_with(&wanted.parts)
}

/// Order `actual` relative to `wanted`, comparing only the version parts
/// `wanted` specifies. `None` when the names differ or `wanted` carries
/// no version.
pub fn compare_values(actual: &str, wanted: &str) -> Option<Ordering> {
    let actual = Versioned::parse(actual);
    let wanted = Versioned::parse(wanted);
    if actual.name != wanted.name || wanted.parts.is_empty() {
        return None;
    }
    for (index, want) in wanted.parts.iter().enumerate() {
        let Some(have) = actual.parts.get(index) else {
            return Some(Ordering::Less);
        };
        let ordering = compare_part(have, want);
        if ordering != Ordering::Equal {
            return Some(ordering);
        }
    }
    Some(Ordering::Equal)
}

fn compare_part(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

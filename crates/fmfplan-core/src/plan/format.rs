//! Serde types for the plan keys of a resolved node.
//!
//! These map the node data (after inheritance and adjustments, so without
//! key suffixes) and are deserialized with `serde_yaml::from_value`.
//! Unknown plan keys (`provision`, `report`, ...) are ignored.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

/// The plan-level keys of a leaf node.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlanFormat {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub discover: Option<DiscoverFormat>,
    #[serde(default)]
    pub execute: Option<ExecuteFormat>,
    /// A single step mapping or a list of steps.
    #[serde(default)]
    pub prepare: Option<OneOrMany<StepFormat>>,
    #[serde(default)]
    pub environment: BTreeMap<String, Value>,
}

/// `discover:` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoverFormat {
    #[serde(default = "default_discover_how")]
    pub how: String,
    #[serde(default)]
    pub filter: Option<OneOrMany<String>>,
    #[serde(default)]
    pub test: Option<OneOrMany<String>>,
    /// Engine-specific keys, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for DiscoverFormat {
    fn default() -> Self {
        Self {
            how: default_discover_how(),
            filter: None,
            test: None,
            extra: BTreeMap::new(),
        }
    }
}

/// `execute:` section. `how` is required on plans but checked by the
/// resolver so the error can name the plan.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExecuteFormat {
    #[serde(default)]
    pub how: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One entry of `prepare:`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StepFormat {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub how: Option<String>,
    #[serde(default)]
    pub when: Option<OneOrMany<String>>,
    #[serde(default)]
    pub package: Option<OneOrMany<String>>,
    #[serde(default)]
    pub script: Option<OneOrMany<String>>,
}

/// A value written either as a single item or as a list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_discover_how() -> String {
    "fmf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> PlanFormat {
        let value: Value = serde_yaml::from_str(src).expect("valid yaml");
        serde_yaml::from_value(value).expect("should deserialize")
    }

    #[test]
    fn deserialize_minimal_plan() {
        let plan = parse("execute:\n  how: tmt\n");
        assert!(plan.enabled); // default
        assert!(plan.discover.is_none());
        assert_eq!(plan.execute.unwrap().how.as_deref(), Some("tmt"));
        assert!(plan.prepare.is_none());
        assert!(plan.environment.is_empty());
    }

    #[test]
    fn deserialize_full_plan() {
        let plan = parse(
            r#"
summary: Full plan
enabled: false
discover:
    how: fmf
    filter: [tag:a, tag:b]
    url: https://example.com/tests.git
execute:
    how: tmt
    exit-first: true
prepare:
  - name: deps
    how: install
    package: [make, podman]
  - how: shell
    script: make check
    when: distro == fedora
environment:
    RETRIES: 3
provision:
    how: virtual
"#,
        );
        assert_eq!(plan.summary.as_deref(), Some("Full plan"));
        assert!(!plan.enabled);

        let discover = plan.discover.unwrap();
        assert_eq!(discover.filter.unwrap().into_vec(), vec!["tag:a", "tag:b"]);
        assert_eq!(
            discover.extra.get("url"),
            Some(&serde_json::json!("https://example.com/tests.git"))
        );

        let execute = plan.execute.unwrap();
        assert_eq!(execute.extra.get("exit-first"), Some(&serde_json::json!(true)));

        let steps = plan.prepare.unwrap().into_vec();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].package.clone().unwrap().into_vec(), vec!["make", "podman"]);
        assert_eq!(steps[1].script.clone().unwrap().into_vec(), vec!["make check"]);
        assert_eq!(steps[1].when.clone().unwrap().into_vec(), vec!["distro == fedora"]);
        assert_eq!(plan.environment.get("RETRIES"), Some(&Value::from(3)));
    }

    #[test]
    fn single_prepare_mapping_is_one_step() {
        let plan = parse("prepare:\n  how: shell\n  script: make\n");
        let steps = plan.prepare.map(OneOrMany::into_vec).unwrap_or_default();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].how.as_deref(), Some("shell"));
    }

    #[test]
    fn discover_how_defaults_to_fmf() {
        let plan = parse("discover:\n  filter: tag:x\n");
        assert_eq!(plan.discover.unwrap().how, "fmf");
    }

    #[test]
    fn rejects_wrongly_typed_enabled() {
        let value: Value = serde_yaml::from_str("enabled: [true]").unwrap();
        assert!(serde_yaml::from_value::<PlanFormat>(value).is_err());
    }
}

//! Resolved plans and the validated plan shape they are produced from.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::PlanError;
use super::adjust::AppliedAdjust;
use super::format::{OneOrMany, PlanFormat};
use super::step::{GuardedStep, PrepareStep, SkippedStep, StepProblem};
use crate::catalog::TestMeta;
use crate::context::Context;
use crate::filter::Filter;
use crate::tree::{kind_of, normalize_name, scalar_text};

/// Effective discover policy, handed to the external discovery engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoverPolicy {
    pub how: String,
    /// Every filter must hold for a test to be selected.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    /// Test name prefixes; empty means no restriction.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Effective execute policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutePolicy {
    pub how: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A plan evaluated against a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPlan {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub discover: DiscoverPolicy,
    pub execute: ExecutePolicy,
    /// Steps to run, parent steps first, in declared order.
    pub prepare: Vec<PrepareStep>,
    pub skipped: Vec<SkippedStep>,
    pub environment: BTreeMap<String, String>,
    pub adjustments: Vec<AppliedAdjust>,
}

impl ResolvedPlan {
    /// Whether the discover policy selects `test`.
    pub fn selects(&self, test: &TestMeta) -> bool {
        let named = self.discover.tests.is_empty()
            || self
                .discover
                .tests
                .iter()
                .any(|prefix| has_name_prefix(&test.name, prefix));
        named && self.discover.filters.iter().all(|filter| filter.matches(test))
    }

    /// Filter strings as the discovery engine receives them.
    pub fn filter_strings(&self) -> Vec<&str> {
        self.discover.filters.iter().map(Filter::source).collect()
    }

    /// Hex SHA-256 of the plan's JSON form.
    ///
    /// # Panics
    ///
    /// Panics if the plan cannot be serialized to JSON. All fields are
    /// strings, maps and JSON values, so serialization cannot fail.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).expect("resolved plan serializes to JSON");
        hex::encode(Sha256::digest(&bytes))
    }
}

fn has_name_prefix(name: &str, prefix: &str) -> bool {
    prefix == "/"
        || name == prefix
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

// ---------------------------------------------------------------------------
// Validated plan shape
// ---------------------------------------------------------------------------

/// A plan's data, validated and compiled, before the context is applied.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedPlan {
    summary: Option<String>,
    description: Option<String>,
    enabled: bool,
    discover: DiscoverPolicy,
    execute: ExecutePolicy,
    steps: Vec<GuardedStep>,
    environment: BTreeMap<String, String>,
}

impl ValidatedPlan {
    pub(crate) fn from_data(plan: &str, data: &Mapping) -> Result<Self, PlanError> {
        let format: PlanFormat = serde_yaml::from_value(Value::Mapping(data.clone()))
            .map_err(|source| PlanError::InvalidField {
                plan: plan.to_owned(),
                source,
            })?;

        let missing = |key: &str| PlanError::MissingKey {
            plan: plan.to_owned(),
            key: key.to_owned(),
        };
        let execute = format.execute.ok_or_else(|| missing("execute"))?;
        let execute = ExecutePolicy {
            how: execute.how.ok_or_else(|| missing("execute.how"))?,
            extra: execute.extra,
        };

        let discover = format.discover.unwrap_or_default();
        let mut filters = Vec::new();
        for filter in discover.filter.map(OneOrMany::into_vec).unwrap_or_default() {
            let parsed = Filter::parse(&filter).map_err(|source| PlanError::InvalidFilter {
                plan: plan.to_owned(),
                filter: filter.clone(),
                source,
            })?;
            filters.push(parsed);
        }
        let discover = DiscoverPolicy {
            how: discover.how,
            filters,
            tests: discover
                .test
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .iter()
                .map(|name| normalize_name(name))
                .collect(),
            extra: discover.extra,
        };

        let mut steps = Vec::new();
        let formats = format.prepare.map(OneOrMany::into_vec).unwrap_or_default();
        for (index, step) in formats.into_iter().enumerate() {
            let step = GuardedStep::from_format(index, step).map_err(|problem| match problem {
                StepProblem::Invalid(reason) => PlanError::InvalidStep {
                    plan: plan.to_owned(),
                    step: index + 1,
                    reason,
                },
                StepProblem::Guard { expression, source } => PlanError::InvalidGuard {
                    plan: plan.to_owned(),
                    expression,
                    source,
                },
            })?;
            steps.push(step);
        }

        let mut environment = BTreeMap::new();
        for (key, value) in format.environment {
            let Some(text) = scalar_text(&value) else {
                return Err(PlanError::InvalidValue {
                    plan: plan.to_owned(),
                    key: format!("environment.{key}"),
                    reason: format!("expected a scalar, found {}", kind_of(&value)),
                });
            };
            environment.insert(key, text);
        }

        Ok(Self {
            summary: format.summary,
            description: format.description,
            enabled: format.enabled,
            discover,
            execute,
            steps,
            environment,
        })
    }

    /// Dimensions referenced by step guards.
    pub(crate) fn dimensions(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .flat_map(|step| step.when.iter())
            .flat_map(|(_, guard)| guard.dimensions())
            .map(str::to_owned)
            .collect()
    }

    /// Evaluate step guards under `context`.
    pub(crate) fn evaluate(
        &self,
        name: &str,
        context: &Context,
        adjustments: Vec<AppliedAdjust>,
    ) -> ResolvedPlan {
        let mut prepare = Vec::new();
        let mut skipped = Vec::new();
        for step in &self.steps {
            if step.is_enabled(context) {
                prepare.push(step.step.clone());
            } else {
                debug!(plan = name, step = %step.step.name, "skipping prepare step");
                skipped.push(SkippedStep {
                    step: step.step.clone(),
                    when: step.guard_texts(),
                });
            }
        }

        debug!(
            plan = name,
            enabled = self.enabled,
            steps = prepare.len(),
            skipped = skipped.len(),
            "resolved plan"
        );

        ResolvedPlan {
            name: name.to_owned(),
            summary: self.summary.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            discover: self.discover.clone(),
            execute: self.execute.clone(),
            prepare,
            skipped,
            environment: self.environment.clone(),
            adjustments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(src: &str) -> Mapping {
        serde_yaml::from_str(src).expect("valid mapping")
    }

    fn validate(src: &str) -> Result<ValidatedPlan, PlanError> {
        ValidatedPlan::from_data("/p", &mapping(src))
    }

    #[test]
    fn execute_and_its_method_are_required() {
        let err = validate("summary: x").unwrap_err();
        assert!(
            matches!(err, PlanError::MissingKey { ref key, .. } if key == "execute"),
            "got: {err}"
        );
        let err = validate("execute: {}").unwrap_err();
        assert!(
            matches!(err, PlanError::MissingKey { ref key, .. } if key == "execute.how"),
            "got: {err}"
        );
    }

    #[test]
    fn reports_step_position_one_based() {
        let err = validate(
            "execute: {how: tmt}\nprepare:\n  - {how: shell, script: a}\n  - {how: install}\n",
        )
        .unwrap_err();
        assert!(
            matches!(err, PlanError::InvalidStep { step: 2, .. }),
            "expected InvalidStep, got: {err}"
        );
    }

    #[test]
    fn rejects_bad_filters_and_environment() {
        let err = validate("execute: {how: tmt}\ndiscover: {filter: 'tag:a &'}\n").unwrap_err();
        assert!(matches!(err, PlanError::InvalidFilter { .. }), "got: {err}");

        let err = validate("execute: {how: tmt}\nenvironment: {A: [1]}\n").unwrap_err();
        assert!(
            matches!(err, PlanError::InvalidValue { ref key, .. } if key == "environment.A"),
            "got: {err}"
        );
    }

    #[test]
    fn environment_scalars_become_strings() {
        let plan = validate("execute: {how: tmt}\nenvironment: {N: 3, B: true, S: x}\n")
            .unwrap()
            .evaluate("/p", &Context::new(), Vec::new());
        assert_eq!(plan.environment["N"], "3");
        assert_eq!(plan.environment["B"], "true");
        assert_eq!(plan.environment["S"], "x");
    }

    #[test]
    fn selects_by_filter_and_test_prefix() {
        let plan = validate("execute: {how: tmt}\ndiscover: {filter: 'tag:unit', test: [api]}\n")
            .unwrap()
            .evaluate("/p", &Context::new(), Vec::new());
        let tagged = |name: &str| TestMeta::new(name).with("tag", vec!["unit".to_owned()]);

        assert!(plan.selects(&tagged("/api")));
        assert!(plan.selects(&tagged("/api/login")));
        assert!(!plan.selects(&tagged("/apis")));
        assert!(!plan.selects(&TestMeta::new("/api")));
        assert_eq!(plan.filter_strings(), vec!["tag:unit"]);
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let base = validate("execute: {how: tmt}\nprepare: {how: install, package: make}\n").unwrap();
        let a = base.evaluate("/p", &Context::new(), Vec::new());
        let b = base.evaluate("/p", &Context::new(), Vec::new());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c = base.evaluate("/q", &Context::new(), Vec::new());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}

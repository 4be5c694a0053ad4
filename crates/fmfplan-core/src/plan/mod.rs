//! Plan evaluation.
//!
//! A [`PlanTree`] is a metadata tree whose leaves are plans. Every leaf is
//! validated when the tree is loaded; resolving a plan against a
//! [`Context`] applies its `adjust` rules and evaluates the `when` guards
//! of its prepare steps, which never fails for a plan that loaded.

pub mod adjust;
pub mod format;
pub mod resolve;
pub mod step;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::context::Context;
use crate::filter::FilterError;
use crate::guard::GuardError;
use crate::tree::{MergeError, Node, Tree, TreeError, normalize_name};

pub use adjust::{AdjustRule, AppliedAdjust};
pub use resolve::{DiscoverPolicy, ExecutePolicy, ResolvedPlan};
pub use step::{Payload, PrepareStep, SkippedStep, StepHow, StepHowParseError};

use adjust::{combinations, parse_rules, select_rules};
use resolve::ValidatedPlan;

/// Errors raised while loading or resolving plans.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("no plan named {0:?}")]
    UnknownPlan(String),

    #[error("plan {plan:?} is missing required key {key:?}")]
    MissingKey { plan: String, key: String },

    #[error("plan {plan:?} has an invalid field: {source}")]
    InvalidField {
        plan: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("plan {plan:?}: invalid {key}: {reason}")]
    InvalidValue {
        plan: String,
        key: String,
        reason: String,
    },

    #[error("plan {plan:?}: prepare step {step}: {reason}")]
    InvalidStep {
        plan: String,
        step: usize,
        reason: String,
    },

    #[error("plan {plan:?}: adjust rule {index}: {reason}")]
    InvalidAdjust {
        plan: String,
        index: usize,
        reason: String,
    },

    #[error("plan {plan:?}: invalid guard {expression:?}: {source}")]
    InvalidGuard {
        plan: String,
        expression: String,
        #[source]
        source: GuardError,
    },

    #[error("plan {plan:?}: invalid filter {filter:?}: {source}")]
    InvalidFilter {
        plan: String,
        filter: String,
        #[source]
        source: FilterError,
    },

    #[error("plan {plan:?}: adjust rule {rule} cannot be applied: {source}")]
    Merge {
        plan: String,
        rule: usize,
        #[source]
        source: MergeError,
    },
}

// ---------------------------------------------------------------------------
// PlanTree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CompiledPlan {
    name: String,
    rules: Vec<AdjustRule>,
    /// The plan under every selection of rules that can apply together,
    /// keyed by rule indices. The empty key holds the unadjusted plan.
    variants: BTreeMap<Vec<usize>, ValidatedPlan>,
}

impl CompiledPlan {
    fn compile(node: &Node) -> Result<Self, PlanError> {
        let name = node.name().to_owned();
        let mut data = node.data().clone();
        let rules = match data.remove("adjust") {
            Some(value) => parse_rules(&name, &value)?,
            None => Vec::new(),
        };

        let mut variants = BTreeMap::new();
        for (selected, adjusted) in combinations(&name, &rules, &data)? {
            variants.insert(selected, ValidatedPlan::from_data(&name, &adjusted)?);
        }

        Ok(Self {
            name,
            rules,
            variants,
        })
    }
}

/// A loaded, validated tree of plans.
#[derive(Debug, Clone)]
pub struct PlanTree {
    origin: String,
    plans: Vec<CompiledPlan>,
}

impl PlanTree {
    /// Load plans from a YAML file or an fmf directory.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        Self::from_tree(&Tree::load(path)?)
    }

    pub fn from_yaml_str(src: &str) -> Result<Self, PlanError> {
        Self::from_tree(&Tree::from_yaml_str(src)?)
    }

    pub fn from_tree(tree: &Tree) -> Result<Self, PlanError> {
        let plans = tree
            .leaves()
            .into_iter()
            .map(CompiledPlan::compile)
            .collect::<Result<Vec<_>, _>>()?;
        info!(origin = tree.origin(), plans = plans.len(), "loaded plan tree");
        Ok(Self {
            origin: tree.origin().to_owned(),
            plans,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Plan names in document order.
    pub fn plans(&self) -> Vec<&str> {
        self.plans.iter().map(|plan| plan.name.as_str()).collect()
    }

    fn find(&self, name: &str) -> Option<&CompiledPlan> {
        let name = normalize_name(name);
        self.plans.iter().find(|plan| plan.name == name)
    }

    /// Resolve plan `name` under `context`.
    ///
    /// Fails only with [`PlanError::UnknownPlan`].
    ///
    /// # Panics
    ///
    /// Panics if the selected adjust rules have no compiled variant. Loading
    /// compiles every selection the rules can produce.
    pub fn resolve(&self, name: &str, context: &Context) -> Result<ResolvedPlan, PlanError> {
        let plan = self
            .find(name)
            .ok_or_else(|| PlanError::UnknownPlan(name.to_owned()))?;

        let selected = select_rules(&plan.name, &plan.rules, context);
        let validated = plan
            .variants
            .get(&selected)
            .expect("every selection of adjust rules is compiled at load");
        let adjustments = selected
            .iter()
            .map(|&index| AppliedAdjust::from(&plan.rules[index]))
            .collect();
        Ok(validated.evaluate(&plan.name, context, adjustments))
    }

    /// Resolve every plan, in document order.
    pub fn resolve_all(&self, context: &Context) -> Result<Vec<ResolvedPlan>, PlanError> {
        self.plans
            .iter()
            .map(|plan| self.resolve(&plan.name, context))
            .collect()
    }

    /// Context dimensions any guard in the tree refers to.
    pub fn dimensions(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for plan in &self.plans {
            for rule in &plan.rules {
                out.extend(rule.guard.dimensions().into_iter().map(str::to_owned));
            }
            for variant in plan.variants.values() {
                out.extend(variant.dimensions());
            }
        }
        out
    }
}

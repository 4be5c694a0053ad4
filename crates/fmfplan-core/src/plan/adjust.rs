//! `adjust` rules: conditional changes to a plan's data.
//!
//! ```yaml
//! adjust:
//!   - when: initiator is not defined or initiator != packit
//!     enabled: false
//!     because: only run upstream plans from packit
//!   - when: distro == centos
//!     prepare+:
//!       - how: install
//!         package: epel-release
//! ```
//!
//! Rules run in order. A rule whose guard holds applies its remaining keys
//! with the same suffix semantics as inheritance; `continue: false` stops
//! processing after that rule. Every combination of rules that can apply
//! together is merged and validated when the plan is loaded.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::PlanError;
use crate::context::Context;
use crate::guard::Guard;
use crate::tree::{apply_data, kind_of, split_key};

/// Maximum number of adjust rules on one plan. Every combination of rules
/// is validated at load, so the cost doubles with each rule.
pub const MAX_RULES: usize = 12;

/// One parsed adjust rule.
#[derive(Debug, Clone)]
pub struct AdjustRule {
    pub when: String,
    pub guard: Guard,
    pub because: Option<String>,
    pub continue_: bool,
    /// Keys applied when the guard holds, suffixes included.
    pub changes: Mapping,
}

/// A rule that applied during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedAdjust {
    pub when: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub because: Option<String>,
}

/// Parse the `adjust` value of plan `plan`: a single rule mapping or a list.
pub fn parse_rules(plan: &str, value: &Value) -> Result<Vec<AdjustRule>, PlanError> {
    let rules: Vec<&Value> = match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items.iter().collect(),
        other => vec![other],
    };
    if rules.len() > MAX_RULES {
        return Err(PlanError::InvalidAdjust {
            plan: plan.to_owned(),
            index: MAX_RULES + 1,
            reason: format!("a plan may have at most {MAX_RULES} adjust rules"),
        });
    }
    rules
        .into_iter()
        .enumerate()
        .map(|(index, rule)| parse_rule(plan, index + 1, rule))
        .collect()
}

fn parse_rule(plan: &str, index: usize, value: &Value) -> Result<AdjustRule, PlanError> {
    let invalid = |reason: String| PlanError::InvalidAdjust {
        plan: plan.to_owned(),
        index,
        reason,
    };
    let Value::Mapping(mapping) = value else {
        return Err(invalid(format!("expected a mapping, found {}", kind_of(value))));
    };

    let mut when = None;
    let mut because = None;
    let mut continue_ = true;
    let mut changes = Mapping::new();
    for (key, value) in mapping {
        let Some(name) = key.as_str() else {
            return Err(invalid(format!("non-string key {key:?}")));
        };
        match name {
            "when" => match value {
                Value::String(text) => when = Some(text.clone()),
                other => {
                    return Err(invalid(format!(
                        "`when` must be a string, found {}",
                        kind_of(other)
                    )));
                }
            },
            "because" => match value {
                Value::String(text) => because = Some(text.clone()),
                other => {
                    return Err(invalid(format!(
                        "`because` must be a string, found {}",
                        kind_of(other)
                    )));
                }
            },
            "continue" => match value {
                Value::Bool(flag) => continue_ = *flag,
                other => {
                    return Err(invalid(format!(
                        "`continue` must be a boolean, found {}",
                        kind_of(other)
                    )));
                }
            },
            _ if split_key(name).0 == "adjust" => {
                return Err(invalid("rules cannot change `adjust`".to_owned()));
            }
            _ => {
                changes.insert(key.clone(), value.clone());
            }
        }
    }

    let when = when.ok_or_else(|| PlanError::MissingKey {
        plan: plan.to_owned(),
        key: format!("adjust[{index}].when"),
    })?;
    let guard = Guard::parse(&when).map_err(|source| PlanError::InvalidGuard {
        plan: plan.to_owned(),
        expression: when.clone(),
        source,
    })?;

    Ok(AdjustRule {
        when,
        guard,
        because,
        continue_,
        changes,
    })
}

impl From<&AdjustRule> for AppliedAdjust {
    fn from(rule: &AdjustRule) -> Self {
        Self {
            when: rule.when.clone(),
            because: rule.because.clone(),
        }
    }
}

/// Indices of the rules that hold under `context`, in order.
///
/// Selection stops after a holding rule with `continue: false`.
pub fn select_rules(plan: &str, rules: &[AdjustRule], context: &Context) -> Vec<usize> {
    let mut selected = Vec::new();
    for (index, rule) in rules.iter().enumerate() {
        if !rule.guard.evaluate(context) {
            debug!(plan, when = %rule.when, "adjust rule does not apply");
            continue;
        }
        debug!(plan, when = %rule.when, "applying adjust rule");
        selected.push(index);
        if !rule.continue_ {
            break;
        }
    }
    selected
}

/// Every rule selection [`select_rules`] can produce, paired with `data`
/// after those rules are applied in order.
///
/// The empty selection comes first. Guards are not consulted, so rules
/// whose guards exclude each other are still combined.
pub fn combinations(
    plan: &str,
    rules: &[AdjustRule],
    data: &Mapping,
) -> Result<Vec<(Vec<usize>, Mapping)>, PlanError> {
    let mut open = vec![(Vec::new(), data.clone())];
    let mut stopped = Vec::new();
    for (index, rule) in rules.iter().enumerate() {
        let mut extended = Vec::with_capacity(open.len());
        for (selected, data) in &open {
            let mut adjusted = data.clone();
            apply_data(&mut adjusted, &rule.changes).map_err(|source| PlanError::Merge {
                plan: plan.to_owned(),
                rule: index + 1,
                source,
            })?;
            let mut selected = selected.clone();
            selected.push(index);
            if rule.continue_ {
                extended.push((selected, adjusted));
            } else {
                stopped.push((selected, adjusted));
            }
        }
        open.extend(extended);
    }
    open.append(&mut stopped);
    Ok(open)
}

//! Prepare steps.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::format::{OneOrMany, StepFormat};
use crate::guard::Guard;

/// How a prepare step provisions the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepHow {
    Install,
    Shell,
}

impl fmt::Display for StepHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Install => "install",
            Self::Shell => "shell",
        };
        f.write_str(s)
    }
}

impl FromStr for StepHow {
    type Err = StepHowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "shell" => Ok(Self::Shell),
            other => Err(StepHowParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`StepHow`] string.
#[derive(Debug, Clone)]
pub struct StepHowParseError(pub String);

impl fmt::Display for StepHowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown step method {:?} (expected install or shell)", self.0)
    }
}

impl std::error::Error for StepHowParseError {}

// ---------------------------------------------------------------------------

/// What a step hands to its executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "how", rename_all = "snake_case")]
pub enum Payload {
    Install { package: Vec<String> },
    Shell { script: Vec<String> },
}

/// A concrete prepare step, as handed to the external executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareStep {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl PrepareStep {
    pub fn how(&self) -> StepHow {
        match self.payload {
            Payload::Install { .. } => StepHow::Install,
            Payload::Shell { .. } => StepHow::Shell,
        }
    }

    /// Packages for `install` steps, script lines for `shell` steps.
    pub fn items(&self) -> &[String] {
        match &self.payload {
            Payload::Install { package } => package,
            Payload::Shell { script } => script,
        }
    }
}

/// A step whose `when` guard did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStep {
    #[serde(flatten)]
    pub step: PrepareStep,
    pub when: Vec<String>,
}

/// A validated step with its compiled guards.
#[derive(Debug, Clone)]
pub(crate) struct GuardedStep {
    pub step: PrepareStep,
    pub when: Vec<(String, Guard)>,
}

/// Why a step could not be built. The resolver attaches plan and position.
#[derive(Debug)]
pub(crate) enum StepProblem {
    Invalid(String),
    Guard {
        expression: String,
        source: crate::guard::GuardError,
    },
}

impl GuardedStep {
    /// Build step number `index` (0-based) from its format.
    pub fn from_format(index: usize, format: StepFormat) -> Result<Self, StepProblem> {
        let how: StepHow = format
            .how
            .as_deref()
            .ok_or_else(|| StepProblem::Invalid("missing `how`".to_owned()))?
            .parse()
            .map_err(|e: StepHowParseError| StepProblem::Invalid(e.to_string()))?;

        let payload = match how {
            StepHow::Install => Payload::Install {
                package: required_items(format.package, "package")?,
            },
            StepHow::Shell => Payload::Shell {
                script: required_items(format.script, "script")?,
            },
        };

        let mut when = Vec::new();
        for expression in format.when.map(OneOrMany::into_vec).unwrap_or_default() {
            let guard = Guard::parse(&expression).map_err(|source| StepProblem::Guard {
                expression: expression.clone(),
                source,
            })?;
            when.push((expression, guard));
        }

        Ok(Self {
            step: PrepareStep {
                name: format.name.unwrap_or_else(|| format!("default-{index}")),
                summary: format.summary,
                payload,
            },
            when,
        })
    }

    /// A step without guards always runs; otherwise any holding guard
    /// enables it.
    pub fn is_enabled(&self, context: &crate::context::Context) -> bool {
        self.when.is_empty() || self.when.iter().any(|(_, guard)| guard.evaluate(context))
    }

    pub fn guard_texts(&self) -> Vec<String> {
        self.when.iter().map(|(text, _)| text.clone()).collect()
    }
}

fn required_items(items: Option<OneOrMany<String>>, key: &str) -> Result<Vec<String>, StepProblem> {
    let items: Vec<String> = items
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect();
    if items.is_empty() {
        return Err(StepProblem::Invalid(format!("missing or empty `{key}`")));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn format(how: &str) -> StepFormat {
        StepFormat {
            name: None,
            summary: None,
            how: Some(how.to_owned()),
            when: None,
            package: None,
            script: None,
        }
    }

    #[test]
    fn step_how_display_roundtrip() {
        for how in [StepHow::Install, StepHow::Shell] {
            let parsed: StepHow = how.to_string().parse().unwrap();
            assert_eq!(parsed, how);
        }
        assert!("ansible".parse::<StepHow>().is_err());
    }

    #[test]
    fn builds_install_step_with_default_name() {
        let mut f = format("install");
        f.package = Some(OneOrMany::One("podman".to_owned()));
        let step = GuardedStep::from_format(2, f).unwrap();
        assert_eq!(step.step.name, "default-2");
        assert_eq!(step.step.how(), StepHow::Install);
        assert_eq!(step.step.items(), ["podman"]);
        assert!(step.is_enabled(&Context::new()));
    }

    #[test]
    fn serializes_as_how_and_payload() {
        let mut f = format("shell");
        f.name = Some("pip".to_owned());
        f.script = Some(OneOrMany::Many(vec!["pip3 install .".to_owned()]));
        let step = GuardedStep::from_format(0, f).unwrap().step;
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            serde_json::json!({"name": "pip", "how": "shell", "script": ["pip3 install ."]})
        );
    }

    #[test]
    fn any_guard_enables_step() {
        let mut f = format("shell");
        f.script = Some(OneOrMany::One("true".to_owned()));
        f.when = Some(OneOrMany::Many(vec![
            "distro == centos".to_owned(),
            "arch == x86_64".to_owned(),
        ]));
        let step = GuardedStep::from_format(0, f).unwrap();
        assert!(step.is_enabled(&Context::new().with("arch", "x86_64")));
        assert!(!step.is_enabled(&Context::new().with("distro", "fedora")));
        assert_eq!(step.guard_texts().len(), 2);
    }

    #[test]
    fn rejects_malformed_steps() {
        let missing_how = StepFormat {
            how: None,
            ..format("shell")
        };
        assert!(matches!(
            GuardedStep::from_format(0, missing_how),
            Err(StepProblem::Invalid(_))
        ));
        assert!(matches!(
            GuardedStep::from_format(0, format("ansible")),
            Err(StepProblem::Invalid(_))
        ));

        let mut empty = format("install");
        empty.package = Some(OneOrMany::Many(vec![]));
        assert!(matches!(
            GuardedStep::from_format(0, empty),
            Err(StepProblem::Invalid(ref reason)) if reason.contains("package")
        ));

        let mut bad_guard = format("shell");
        bad_guard.script = Some(OneOrMany::One("true".to_owned()));
        bad_guard.when = Some(OneOrMany::One("distro ==".to_owned()));
        assert!(matches!(
            GuardedStep::from_format(0, bad_guard),
            Err(StepProblem::Guard { .. })
        ));
    }
}

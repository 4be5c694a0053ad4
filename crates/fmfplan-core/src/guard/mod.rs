//! `when` guard expressions.
//!
//! A guard is a boolean predicate over a [`Context`]:
//!
//! ```text
//! initiator == packit && distro == fedora
//! initiator is not defined or initiator != packit
//! not (distro < fedora-40) and arch == x86_64, aarch64
//! ```
//!
//! `and`/`&&` binds tighter than `or`/`||`; evaluation short-circuits left
//! to right. A comparison lists one or more values and holds when any of
//! them matches any value of the dimension.
//!
//! Undefined dimensions never raise an error. They behave as having no
//! value: `==` and ordering comparisons are false, `!=` is true.

mod lexer;
mod parser;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::context::{Context, compare_values, value_matches};

/// Errors raised while parsing a guard expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("guard expression is empty")]
    EmptyInput,

    #[error("unexpected {found} at {position}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },

    #[error("unexpected character {found:?} at {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: usize },

    #[error("expression nests deeper than {max} levels at {position}")]
    NestingTooDeep { max: usize, position: usize },
}

/// Comparison operator between a dimension and its listed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Literal(bool),
    Defined {
        dimension: String,
        negated: bool,
    },
    Compare {
        dimension: String,
        op: Comparison,
        values: Vec<String>,
    },
    Not(Box<Guard>),
    And(Vec<Guard>),
    Or(Vec<Guard>),
}

impl Guard {
    pub fn parse(input: &str) -> Result<Self, GuardError> {
        let tokens = lexer::tokenize(input)?;
        parser::Parser::new(tokens).parse()
    }

    /// Evaluate against `context`. Never fails.
    pub fn evaluate(&self, context: &Context) -> bool {
        match self {
            Self::Literal(value) => *value,
            Self::Defined { dimension, negated } => context.is_defined(dimension) != *negated,
            Self::Compare {
                dimension,
                op,
                values,
            } => match context.values(dimension) {
                None => *op == Comparison::Ne,
                Some(actual) => compare(*op, actual, values),
            },
            Self::Not(inner) => !inner.evaluate(context),
            Self::And(parts) => parts.iter().all(|part| part.evaluate(context)),
            Self::Or(parts) => parts.iter().any(|part| part.evaluate(context)),
        }
    }

    /// Dimension names the expression refers to.
    pub fn dimensions(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_dimensions(&mut out);
        out
    }

    fn collect_dimensions<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Defined { dimension, .. } | Self::Compare { dimension, .. } => {
                out.insert(dimension.as_str());
            }
            Self::Not(inner) => inner.collect_dimensions(out),
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_dimensions(out);
                }
            }
        }
    }
}

fn compare(op: Comparison, actual: &[String], wanted: &[String]) -> bool {
    let equal = || {
        wanted
            .iter()
            .any(|w| actual.iter().any(|a| value_matches(a, w)))
    };
    match op {
        Comparison::Eq => equal(),
        Comparison::Ne => !equal(),
        _ => wanted.iter().any(|w| {
            actual
                .iter()
                .any(|a| compare_values(a, w).is_some_and(|ordering| op.accepts(ordering)))
        }),
    }
}

impl FromStr for Guard {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Defined { dimension, negated } => {
                let not = if *negated { " not" } else { "" };
                write!(f, "{dimension} is{not} defined")
            }
            Self::Compare {
                dimension,
                op,
                values,
            } => {
                let values: Vec<String> = values.iter().map(|v| render_value(v)).collect();
                write!(f, "{dimension} {} {}", op.symbol(), values.join(", "))
            }
            Self::Not(inner) => write!(f, "not ({inner})"),
            Self::And(parts) => write_joined(f, parts, " and "),
            Self::Or(parts) => write_joined(f, parts, " or "),
        }
    }
}

/// Quote values that would not survive tokenizing as a bare word.
fn render_value(value: &str) -> String {
    if value.is_empty() || value.chars().any(lexer::is_delimiter) {
        format!("{value:?}")
    } else {
        value.to_owned()
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Guard], sep: &str) -> fmt::Result {
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            f.write_str(sep)?;
        }
        match part {
            Guard::And(_) | Guard::Or(_) => write!(f, "({part})")?,
            _ => write!(f, "{part}")?,
        }
    }
    Ok(())
}

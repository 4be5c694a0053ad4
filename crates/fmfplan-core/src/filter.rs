//! Discover filters: tag-boolean expressions over test metadata.
//!
//! ```text
//! tag:upstream & tag:base
//! tag:lint | tag:coverage & tag:stable
//! tier: 1 & tag: -slow
//! ```
//!
//! `&` binds tighter than `|`. A literal `key:value` holds when the test's
//! `key` attribute contains `value`; `key:-value` holds when it does not.
//! A test without the attribute has no values for it.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::catalog::TestMeta;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter is empty")]
    EmptyInput,

    #[error("filter {filter:?} has an empty clause")]
    EmptyClause { filter: String },

    #[error("invalid filter literal {literal:?} (expected key:value)")]
    InvalidLiteral { literal: String },
}

/// A single `key:value` or `key:-value` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub key: String,
    pub value: String,
    pub negated: bool,
}

impl Literal {
    fn parse(text: &str) -> Result<Self, FilterError> {
        let invalid = || FilterError::InvalidLiteral {
            literal: text.to_owned(),
        };
        let (key, value) = text.split_once(':').ok_or_else(invalid)?;
        let key = key.trim();
        let mut value = value.trim();
        let negated = value.starts_with('-');
        if negated {
            value = value[1..].trim_start();
        }
        if key.is_empty() || value.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            key: key.to_owned(),
            value: value.to_owned(),
            negated,
        })
    }

    fn matches(&self, test: &TestMeta) -> bool {
        let present = test.values(&self.key).iter().any(|v| *v == self.value);
        present != self.negated
    }
}

/// A parsed filter in disjunctive normal form: any clause whose literals
/// all hold selects the test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    source: String,
    clauses: Vec<Vec<Literal>>,
}

impl Filter {
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(FilterError::EmptyInput);
        }

        let mut clauses = Vec::new();
        for clause in trimmed.split('|') {
            let mut literals = Vec::new();
            for literal in clause.split('&') {
                let literal = literal.trim();
                if literal.is_empty() {
                    return Err(FilterError::EmptyClause {
                        filter: trimmed.to_owned(),
                    });
                }
                literals.push(Literal::parse(literal)?);
            }
            clauses.push(literals);
        }

        Ok(Self {
            source: trimmed.to_owned(),
            clauses,
        })
    }

    /// The filter as written, passed on verbatim to discovery engines.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    pub fn matches(&self, test: &TestMeta) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|literal| literal.matches(test)))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

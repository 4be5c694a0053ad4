//! Key merge semantics shared by inheritance and `adjust` rules.
//!
//! A plain key overrides the inherited value. A key with a `+` suffix
//! appends to (or merges into) the inherited value, and a `-` suffix
//! removes from it:
//!
//! | inherited | `key+`   | `key-`             |
//! |-----------|----------|--------------------|
//! | sequence  | append   | drop listed items  |
//! | mapping   | update   | drop listed keys   |
//! | string    | concat   | remove occurrences |
//! | number    | add      | subtract           |

use serde_yaml::{Mapping, Number, Value};
use thiserror::Error;

/// A `+`/`-` merge whose operand types do not combine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("cannot append {child} to {parent} for key {key:?}")]
    Append {
        key: String,
        parent: &'static str,
        child: &'static str,
    },

    #[error("cannot remove {child} from {parent} for key {key:?}")]
    Reduce {
        key: String,
        parent: &'static str,
        child: &'static str,
    },
}

/// How a key combines with the value it inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOp {
    Set,
    Append,
    Reduce,
}

/// Split a raw key into its base name and merge operation.
pub fn split_key(raw: &str) -> (&str, KeyOp) {
    if raw.len() > 1 {
        if let Some(base) = raw.strip_suffix('+') {
            return (base, KeyOp::Append);
        }
        if let Some(base) = raw.strip_suffix('-') {
            return (base, KeyOp::Reduce);
        }
    }
    (raw, KeyOp::Set)
}

/// Apply `source` on top of `target`, honouring key suffixes.
///
/// Entries are applied in the order they appear in `source`.
pub fn apply_data(target: &mut Mapping, source: &Mapping) -> Result<(), MergeError> {
    for (key, value) in source {
        let Some(raw) = key.as_str() else {
            target.insert(key.clone(), value.clone());
            continue;
        };
        let (name, op) = split_key(raw);
        match op {
            KeyOp::Set => {
                target.insert(Value::String(name.to_owned()), value.clone());
            }
            KeyOp::Append => match target.get_mut(name) {
                Some(existing) => append(name, existing, value)?,
                None => {
                    target.insert(Value::String(name.to_owned()), value.clone());
                }
            },
            KeyOp::Reduce => {
                if let Some(existing) = target.get_mut(name) {
                    reduce(name, existing, value)?;
                }
            }
        }
    }
    Ok(())
}

/// Short name of a YAML value's type, for error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn append(key: &str, parent: &mut Value, child: &Value) -> Result<(), MergeError> {
    if child.is_null() {
        return Ok(());
    }
    if parent.is_null() {
        *parent = child.clone();
        return Ok(());
    }
    if let (Value::Number(a), Value::Number(b)) = (&*parent, child) {
        let sum = combine(a, b, i64::checked_add, |x, y| x + y);
        *parent = Value::Number(sum);
        return Ok(());
    }
    match (parent, child) {
        (Value::Sequence(items), Value::Sequence(extra)) => items.extend(extra.iter().cloned()),
        (Value::Mapping(map), Value::Mapping(extra)) => {
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }
        (Value::String(text), Value::String(extra)) => text.push_str(extra),
        (p, c) => {
            return Err(MergeError::Append {
                key: key.to_owned(),
                parent: kind_of(p),
                child: kind_of(c),
            });
        }
    }
    Ok(())
}

fn reduce(key: &str, parent: &mut Value, child: &Value) -> Result<(), MergeError> {
    if child.is_null() || parent.is_null() {
        return Ok(());
    }
    if let (Value::Number(a), Value::Number(b)) = (&*parent, child) {
        let diff = combine(a, b, i64::checked_sub, |x, y| x - y);
        *parent = Value::Number(diff);
        return Ok(());
    }
    match (parent, child) {
        (Value::Sequence(items), Value::Sequence(removed)) => {
            items.retain(|item| !removed.contains(item));
        }
        (Value::Mapping(map), Value::Sequence(removed)) => {
            for k in removed {
                map.remove(k);
            }
        }
        (Value::String(text), Value::String(removed)) => {
            if !removed.is_empty() {
                *text = text.replace(removed.as_str(), "");
            }
        }
        (p, c) => {
            return Err(MergeError::Reduce {
                key: key.to_owned(),
                parent: kind_of(p),
                child: kind_of(c),
            });
        }
    }
    Ok(())
}

/// Integer arithmetic when both sides are integers and it does not
/// overflow, floating point otherwise.
fn combine(
    a: &Number,
    b: &Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Number {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(result) = int_op(x, y) {
            return Number::from(result);
        }
    }
    let x = a.as_f64().unwrap_or_default();
    let y = b.as_f64().unwrap_or_default();
    Number::from(float_op(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(src: &str) -> Mapping {
        serde_yaml::from_str(src).expect("test mapping should parse")
    }

    #[test]
    fn split_key_recognises_suffixes() {
        assert_eq!(split_key("prepare+"), ("prepare", KeyOp::Append));
        assert_eq!(split_key("tag-"), ("tag", KeyOp::Reduce));
        assert_eq!(split_key("summary"), ("summary", KeyOp::Set));
        assert_eq!(split_key("+"), ("+", KeyOp::Set));
    }

    #[test]
    fn plain_key_overrides() {
        let mut target = mapping("summary: parent\ntag: [a]");
        apply_data(&mut target, &mapping("tag: [b]")).unwrap();
        assert_eq!(target, mapping("summary: parent\ntag: [b]"));
    }

    #[test]
    fn plus_appends_sequences_parent_first() {
        let mut target = mapping("prepare: [one, two]");
        apply_data(&mut target, &mapping("prepare+: [three]")).unwrap();
        assert_eq!(target, mapping("prepare: [one, two, three]"));
    }

    #[test]
    fn plus_updates_mappings_shallowly() {
        let mut target = mapping("discover: {how: fmf, filter: 'tag:a'}");
        apply_data(&mut target, &mapping("discover+: {filter: 'tag:b'}")).unwrap();
        assert_eq!(target, mapping("discover: {how: fmf, filter: 'tag:b'}"));
    }

    #[test]
    fn plus_concatenates_strings_and_adds_numbers() {
        let mut target = mapping("summary: Run\nduration: 5");
        apply_data(&mut target, &mapping("summary+: ' fast'\nduration+: 10")).unwrap();
        assert_eq!(target, mapping("summary: Run fast\nduration: 15"));
    }

    #[test]
    fn plus_without_parent_value_sets() {
        let mut target = Mapping::new();
        apply_data(&mut target, &mapping("tag+: [x]")).unwrap();
        assert_eq!(target, mapping("tag: [x]"));
    }

    #[test]
    fn minus_removes_items_and_keys() {
        let mut target = mapping("tag: [a, b, c]\nenvironment: {A: '1', B: '2'}");
        apply_data(&mut target, &mapping("tag-: [b]\nenvironment-: [A]")).unwrap();
        assert_eq!(target, mapping("tag: [a, c]\nenvironment: {B: '2'}"));
    }

    #[test]
    fn minus_on_missing_key_is_noop() {
        let mut target = mapping("summary: x");
        apply_data(&mut target, &mapping("tag-: [a]")).unwrap();
        assert_eq!(target, mapping("summary: x"));
    }

    #[test]
    fn minus_removes_substrings() {
        let mut target = mapping("summary: Run fast tests fast");
        apply_data(&mut target, &mapping("summary-: ' fast'")).unwrap();
        assert_eq!(target, mapping("summary: Run tests"));
    }

    #[test]
    fn minus_subtracts_numbers() {
        let mut target = mapping("duration: 10\nratio: 1.5");
        apply_data(&mut target, &mapping("duration-: 3\nratio-: 0.5")).unwrap();
        assert_eq!(target.get("duration"), Some(&Value::from(7)));
        assert_eq!(target.get("ratio"), Some(&Value::from(1.0)));
    }

    #[test]
    fn mismatched_remove_is_rejected() {
        let mut target = mapping("tag: [word, other]");
        let err = apply_data(&mut target, &mapping("tag-: word")).unwrap_err();
        assert_eq!(
            err,
            MergeError::Reduce {
                key: "tag".into(),
                parent: "sequence",
                child: "string",
            }
        );
    }

    #[test]
    fn mismatched_append_is_rejected() {
        let mut target = mapping("prepare: [one]");
        let err = apply_data(&mut target, &mapping("prepare+: {how: shell}")).unwrap_err();
        assert_eq!(
            err,
            MergeError::Append {
                key: "prepare".into(),
                parent: "sequence",
                child: "mapping",
            }
        );
    }
}

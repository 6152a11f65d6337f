//! Document filtering and sorting
//!
//! Evaluates query filters and sort documents against raw stored documents.
//! Comparisons never coerce across types: `"1"` does not match `1`.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::{CoreError, CoreResult};

/// Looks up a dotted path in a raw document; numeric segments index arrays
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(obj) => obj.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Evaluates filter documents against raw documents
pub struct DocumentFilter;

impl DocumentFilter {
    /// Checks if a document matches every condition of the filter (AND)
    pub fn matches(document: &Value, filter: &Value) -> CoreResult<bool> {
        let conditions = match filter {
            Value::Null => return Ok(true),
            Value::Object(conditions) => conditions,
            other => {
                return Err(CoreError::invalid_params(format!(
                    "Filter must be an object, got {}",
                    other
                )))
            }
        };

        for (key, condition) in conditions {
            let matched = match key.as_str() {
                "$and" => Self::all(document, condition)?,
                "$or" => Self::any(document, condition)?,
                path => Self::matches_condition(lookup(document, path), condition)?,
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn all(document: &Value, branches: &Value) -> CoreResult<bool> {
        for branch in Self::branches(branches)? {
            if !Self::matches(document, branch)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any(document: &Value, branches: &Value) -> CoreResult<bool> {
        for branch in Self::branches(branches)? {
            if Self::matches(document, branch)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn branches(value: &Value) -> CoreResult<&Vec<Value>> {
        value
            .as_array()
            .ok_or_else(|| CoreError::invalid_params("$and/$or expect an array of filters"))
    }

    fn matches_condition(actual: Option<&Value>, condition: &Value) -> CoreResult<bool> {
        match condition {
            Value::Object(ops) if ops.keys().next().map_or(false, |k| k.starts_with('$')) => {
                Self::matches_operators(actual, ops)
            }
            expected => Ok(Self::eq_match(actual, expected)),
        }
    }

    fn matches_operators(actual: Option<&Value>, ops: &Map<String, Value>) -> CoreResult<bool> {
        for (op, operand) in ops {
            let matched = match op.as_str() {
                "$eq" => Self::eq_match(actual, operand),
                "$ne" => !Self::eq_match(actual, operand),
                "$gt" => Self::compare(actual, operand).map_or(false, |o| o == Ordering::Greater),
                "$gte" => Self::compare(actual, operand).map_or(false, |o| o != Ordering::Less),
                "$lt" => Self::compare(actual, operand).map_or(false, |o| o == Ordering::Less),
                "$lte" => Self::compare(actual, operand).map_or(false, |o| o != Ordering::Greater),
                "$in" => Self::operand_list(op, operand)?
                    .iter()
                    .any(|candidate| Self::eq_match(actual, candidate)),
                "$nin" => !Self::operand_list(op, operand)?
                    .iter()
                    .any(|candidate| Self::eq_match(actual, candidate)),
                "$exists" => {
                    let present = actual.map_or(false, |v| !v.is_null());
                    present == operand.as_bool().unwrap_or(true)
                }
                other => {
                    return Err(CoreError::invalid_params(format!(
                        "Unsupported filter operator '{}'",
                        other
                    )))
                }
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn operand_list<'a>(op: &str, operand: &'a Value) -> CoreResult<&'a Vec<Value>> {
        operand
            .as_array()
            .ok_or_else(|| CoreError::invalid_params(format!("{} expects an array", op)))
    }

    /// Exact equality; an array value also matches when it contains the operand
    fn eq_match(actual: Option<&Value>, expected: &Value) -> bool {
        match actual {
            None => expected.is_null(),
            Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
            Some(value) => value == expected,
        }
    }

    /// Ordering between same-typed numbers or strings
    fn compare(actual: Option<&Value>, bound: &Value) -> Option<Ordering> {
        match (actual?, bound) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Sorts raw documents by a `{ path: 1 | -1 }` document
pub struct DocumentSorter {
    /// `(path, descending)` pairs
    keys: Vec<(String, bool)>,
}

impl DocumentSorter {
    /// Parses a sort document; keys apply in the map's iteration order
    pub fn parse(sort: &Value) -> CoreResult<Self> {
        let keys = match sort {
            Value::Null => Vec::new(),
            Value::Object(keys) => keys
                .iter()
                .map(|(path, dir)| match dir.as_i64() {
                    Some(1) => Ok((path.clone(), false)),
                    Some(-1) => Ok((path.clone(), true)),
                    _ => Err(CoreError::invalid_params(format!(
                        "Sort direction for '{}' must be 1 or -1",
                        path
                    ))),
                })
                .collect::<CoreResult<Vec<_>>>()?,
            _ => return Err(CoreError::invalid_params("Sort must be an object")),
        };
        Ok(Self { keys })
    }

    /// Compares two documents key by key
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.keys
            .iter()
            .map(|(path, descending)| {
                let ordering = compare_values(lookup(a, path), lookup(b, path));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Stable multi-key sort
    pub fn sort(documents: &mut [Value], sort: &Value) -> CoreResult<()> {
        let sorter = Self::parse(sort)?;
        documents.sort_by(|a, b| sorter.compare(a, b));
        Ok(())
    }
}

/// Ordering rules: missing < null < bool < number < string < array < object
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let type_order = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let by_type = type_order(a).cmp(&type_order(b));
            if by_type != Ordering::Equal {
                return by_type;
            }
            match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                (Value::Number(x), Value::Number(y)) => {
                    let x = x.as_f64().unwrap_or(0.0);
                    let y = y.as_f64().unwrap_or(0.0);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => Ordering::Equal,
            }
        }
    }
}

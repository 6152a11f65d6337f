//! Update operators
//!
//! Applies an update document (`$set`, `$inc`, `$push`, ...) to a raw JSON
//! document. Paths are dotted; numeric segments address array elements.
//! An update without any `$` operator replaces the listed paths as `$set`.

use chrono::Utc;
use serde_json::{Map, Number, Value};

use super::context::TransactionContext;
use super::error::{CoreError, CoreResult};
use super::filter::compare_values;
use crate::field::{format_date, FieldValue, Format};
use crate::path::{complete, resolve_segments};
use crate::schema::Model;

/// Applies `update` to `document`; `$setOnInsert` only applies when `is_insert`
pub fn apply_update(document: &mut Value, update: &Value, is_insert: bool) -> CoreResult<()> {
    let update = update
        .as_object()
        .ok_or_else(|| CoreError::invalid_operation("Update must be an object"))?;

    if !document.is_object() {
        *document = Value::Object(Map::new());
    }

    if !update.keys().any(|k| k.starts_with('$')) {
        for (path, value) in update {
            *slot(document, path)? = value.clone();
        }
        return Ok(());
    }

    for (op, targets) in update {
        let targets = targets.as_object().ok_or_else(|| {
            CoreError::invalid_operation(format!("Operator '{}' expects an object of paths", op))
        })?;
        for (path, operand) in targets {
            apply_operator(document, op, path, operand, is_insert)?;
        }
    }
    Ok(())
}

/// Serializes the value operands of `update` (`$set`, `$setOnInsert`,
/// `$push`, `$addToSet` and plain replacements) in `Document` format through
/// the fields their paths resolve to. Paths outside the schema keep the raw
/// operand.
pub fn normalize_update(model: &Model, update: &Value, ctx: &TransactionContext) -> Value {
    let ops = match update.as_object() {
        Some(ops) => ops,
        None => return update.clone(),
    };
    if !ops.keys().any(|k| k.starts_with('$')) {
        return Value::Object(normalize_targets(model, ops, false, ctx));
    }

    let mut out = Map::new();
    for (op, targets) in ops {
        let normalized = match (op.as_str(), targets.as_object()) {
            ("$set" | "$setOnInsert", Some(targets)) => Value::Object(normalize_targets(model, targets, false, ctx)),
            ("$push" | "$addToSet", Some(targets)) => Value::Object(normalize_targets(model, targets, true, ctx)),
            _ => targets.clone(),
        };
        out.insert(op.clone(), normalized);
    }
    Value::Object(out)
}

fn normalize_targets(model: &Model, targets: &Map<String, Value>, items: bool, ctx: &TransactionContext) -> Map<String, Value> {
    targets
        .iter()
        .map(|(path, operand)| {
            if !items {
                return (path.clone(), serialize_at(model, path, operand, ctx));
            }
            let item_path = format!("{}.[]", path);
            let value = match operand.get("$each").and_then(Value::as_array) {
                Some(each) => {
                    let mut modifiers = operand.as_object().cloned().unwrap_or_default();
                    let each = each.iter().map(|v| serialize_at(model, &item_path, v, ctx)).collect();
                    modifiers.insert("$each".to_string(), Value::Array(each));
                    Value::Object(modifiers)
                }
                None => serialize_at(model, &item_path, operand, ctx),
            };
            (path.clone(), value)
        })
        .collect()
}

/// `value` as the field at dotted update `path` would persist it
fn serialize_at(model: &Model, path: &str, value: &Value, ctx: &TransactionContext) -> Value {
    let segments: Vec<String> = path
        .split('.')
        .map(|s| {
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                format!("[{}]", s)
            } else {
                s.to_string()
            }
        })
        .collect();
    let field = complete(resolve_segments(model, &segments)).and_then(|items| items.last().map(|i| i.field.clone()));
    match field.map(|f| f.serialize(Some(value), Format::Document, ctx)) {
        None | Some(FieldValue::Undefined) => value.clone(),
        Some(serialized) => serialized.to_json(),
    }
}

fn apply_operator(document: &mut Value, op: &str, path: &str, operand: &Value, is_insert: bool) -> CoreResult<()> {
    match op {
        "$set" => *slot(document, path)? = operand.clone(),
        "$setOnInsert" => {
            if is_insert {
                *slot(document, path)? = operand.clone();
            }
        }
        "$unset" => remove(document, path),
        "$inc" => {
            let target = slot(document, path)?;
            *target = arithmetic(target, operand, path, |a, b| a.checked_add(b), |a, b| a + b)?;
        }
        "$mul" => {
            let target = slot(document, path)?;
            if target.is_null() {
                *target = Value::from(0);
            }
            *target = arithmetic(target, operand, path, |a, b| a.checked_mul(b), |a, b| a * b)?;
        }
        "$min" | "$max" => {
            let target = slot(document, path)?;
            let ordering = compare_values(Some(operand), Some(target));
            let replace = target.is_null()
                || (op == "$min" && ordering.is_lt())
                || (op == "$max" && ordering.is_gt());
            if replace {
                *target = operand.clone();
            }
        }
        "$rename" => {
            let to = operand.as_str().ok_or_else(|| {
                CoreError::invalid_operation(format!("$rename target for '{}' must be a string", path))
            })?;
            if let Some(value) = take(document, path) {
                *slot(document, to)? = value;
            }
        }
        "$currentDate" => {
            let now = Utc::now();
            let value = match operand {
                Value::Bool(true) => Value::String(format_date(&now)),
                Value::Object(options) => match options.get("$type").and_then(Value::as_str) {
                    Some("date") => Value::String(format_date(&now)),
                    Some("timestamp") => Value::from(now.timestamp_millis()),
                    _ => {
                        return Err(CoreError::invalid_operation(
                            "$currentDate $type must be 'date' or 'timestamp'",
                        ))
                    }
                },
                _ => return Err(CoreError::invalid_operation("$currentDate expects true or {$type}")),
            };
            *slot(document, path)? = value;
        }
        "$push" => {
            let items = each(operand);
            array_at(document, path)?.extend(items);
        }
        "$addToSet" => {
            let items = each(operand);
            let array = array_at(document, path)?;
            for item in items {
                if !array.contains(&item) {
                    array.push(item);
                }
            }
        }
        "$pop" => {
            if let Some(Value::Array(array)) = find_mut(document, path) {
                if array.is_empty() {
                    return Ok(());
                }
                match operand.as_i64() {
                    Some(-1) => {
                        array.remove(0);
                    }
                    Some(1) => {
                        array.pop();
                    }
                    _ => return Err(CoreError::invalid_operation("$pop expects 1 or -1")),
                }
            }
        }
        "$pull" => {
            let candidates: Vec<Value> = match operand {
                Value::Object(condition) if condition.contains_key("$in") => condition
                    .get("$in")
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| CoreError::invalid_operation("$pull $in expects an array"))?,
                other => vec![other.clone()],
            };
            if let Some(Value::Array(array)) = find_mut(document, path) {
                array.retain(|item| !candidates.contains(item));
            }
        }
        "$pullAll" => {
            let candidates = operand
                .as_array()
                .ok_or_else(|| CoreError::invalid_operation("$pullAll expects an array"))?;
            if let Some(Value::Array(array)) = find_mut(document, path) {
                array.retain(|item| !candidates.contains(item));
            }
        }
        "$bit" => {
            let masks = operand
                .as_object()
                .ok_or_else(|| CoreError::invalid_operation("$bit expects {and|or|xor: int}"))?;
            let target = slot(document, path)?;
            let mut current = match &*target {
                Value::Null => 0,
                other => other.as_i64().ok_or_else(|| {
                    CoreError::invalid_operation(format!("$bit target '{}' is not an integer", path))
                })?,
            };
            for (bitop, mask) in masks {
                let mask = mask
                    .as_i64()
                    .ok_or_else(|| CoreError::invalid_operation("$bit mask must be an integer"))?;
                current = match bitop.as_str() {
                    "and" => current & mask,
                    "or" => current | mask,
                    "xor" => current ^ mask,
                    other => {
                        return Err(CoreError::invalid_operation(format!(
                            "Unknown $bit operation '{}'",
                            other
                        )))
                    }
                };
            }
            *target = Value::from(current);
        }
        other => {
            return Err(CoreError::invalid_operation(format!(
                "Unknown update operator '{}'",
                other
            )))
        }
    }
    Ok(())
}

/// Items of a `$push`/`$addToSet` operand, unwrapping `$each`
fn each(operand: &Value) -> Vec<Value> {
    match operand.get("$each").and_then(Value::as_array) {
        Some(items) => items.clone(),
        None => vec![operand.clone()],
    }
}

fn arithmetic(
    current: &Value,
    operand: &Value,
    path: &str,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> CoreResult<Value> {
    let not_numeric = || CoreError::invalid_operation(format!("Cannot apply arithmetic to non-numeric '{}'", path));
    let operand = operand.as_number().ok_or_else(not_numeric)?;
    let current = match current {
        Value::Null => return Ok(Value::Number(operand.clone())),
        Value::Number(n) => n,
        _ => return Err(not_numeric()),
    };

    if let (Some(a), Some(b)) = (current.as_i64(), operand.as_i64()) {
        if let Some(result) = int_op(a, b) {
            return Ok(Value::from(result));
        }
    }
    let (a, b) = match (current.as_f64(), operand.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(not_numeric()),
    };
    Number::from_f64(float_op(a, b)).map(Value::Number).ok_or_else(not_numeric)
}

/// Mutable slot at `path`, creating intermediate objects
fn slot<'a>(document: &'a mut Value, path: &str) -> CoreResult<&'a mut Value> {
    let mut current = document;
    for segment in path.split('.') {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(obj) => obj.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = segment.parse::<usize>().map_err(|_| {
                    CoreError::invalid_operation(format!("'{}' is not an array index in '{}'", segment, path))
                })?;
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            _ => {
                return Err(CoreError::invalid_operation(format!(
                    "Cannot traverse into '{}' of '{}'",
                    segment, path
                )))
            }
        };
    }
    Ok(current)
}

/// Array at `path`, created when missing
fn array_at<'a>(document: &'a mut Value, path: &str) -> CoreResult<&'a mut Vec<Value>> {
    let target = slot(document, path)?;
    if target.is_null() {
        *target = Value::Array(Vec::new());
    }
    match target {
        Value::Array(items) => Ok(items),
        _ => Err(CoreError::invalid_operation(format!("'{}' is not an array", path))),
    }
}

/// Existing value at `path`, without creating anything
fn find_mut<'a>(document: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(obj) => obj.get_mut(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

fn take(document: &mut Value, path: &str) -> Option<Value> {
    let (parent, key) = match path.rsplit_once('.') {
        Some((parent, key)) => (find_mut(document, parent)?, key),
        None => (document, path),
    };
    match parent {
        Value::Object(obj) => obj.remove(key),
        Value::Array(items) => {
            let index = key.parse::<usize>().ok()?;
            items.get_mut(index).map(|item| std::mem::replace(item, Value::Null))
        }
        _ => None,
    }
}

fn remove(document: &mut Value, path: &str) {
    take(document, path);
}

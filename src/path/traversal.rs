//! Path traversal
//!
//! Reads and writes values inside a document by walking the field chain
//! produced by the resolver. Non-terminal steps hand values over in
//! `NextField` format (raw values for `Validation` reads); the terminal step
//! serializes in the caller's format on reads and in `Document` format on
//! writes.

use serde_json::{Map, Value};

use super::{complete, parse_segment, resolve_from, resolve_path, FieldPathItem, Segment};
use crate::core::context::TransactionContext;
use crate::core::error::{CoreError, CoreResult};
use crate::field::{Format, FieldValue};
use crate::schema::{FieldType, Model};

/// Reads the value at `path`.
///
/// Unresolvable paths and missing values yield `Undefined`. A `[]` segment
/// broadcasts over the array and yields a `List` with one entry per element.
pub fn get_value(
    model: &Model,
    data: &Value,
    path: &str,
    format: Format,
    ctx: &TransactionContext,
) -> FieldValue {
    let items = match complete(resolve_path(model, path)) {
        Some(items) if !items.is_empty() => items,
        _ => return FieldValue::Undefined,
    };
    let root = data.get(&items[0].key);
    read(&items, root, format, ctx)
}

fn read(
    items: &[FieldPathItem],
    value: Option<&Value>,
    format: Format,
    ctx: &TransactionContext,
) -> FieldValue {
    let (item, rest) = match items.split_first() {
        Some(parts) => parts,
        None => return FieldValue::Undefined,
    };
    let field = &item.field;

    let defaulted;
    let value = match value {
        Some(v) => Some(v),
        None if format.injects_defaults() => {
            defaulted = field.default_value();
            defaulted.as_ref()
        }
        None => None,
    };

    let raw = match value {
        None => return FieldValue::Undefined,
        Some(Value::Null) => return FieldValue::null(),
        Some(v) => v,
    };

    if rest.is_empty() {
        return field.serialize(Some(raw), format, ctx);
    }

    // Validators must see every element as stored, so nothing is reduced on
    // the way down.
    let handoff = match format {
        Format::Validation => Format::Validation,
        _ => Format::NextField,
    };
    let next = &rest[0];
    if field.field_type() == FieldType::Array {
        let elements = match field.serialize(Some(raw), handoff, ctx).to_json() {
            Value::Array(elements) => elements,
            _ => return FieldValue::Undefined,
        };

        return match parse_segment(&next.key) {
            Segment::Index(i) => match elements.get(i) {
                Some(element) => read(rest, Some(element), format, ctx),
                None => FieldValue::Undefined,
            },
            Segment::Wildcard => {
                let tail: Vec<String> = rest[1..].iter().map(|i| i.key.clone()).collect();
                FieldValue::List(
                    elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| match indexed_chain(field, i, &tail) {
                            Some(chain) => read(&chain, Some(element), format, ctx),
                            None => FieldValue::Undefined,
                        })
                        .collect(),
                )
            }
            Segment::Key(_) => FieldValue::Undefined,
        };
    }

    let handed_off = field.serialize(Some(raw), handoff, ctx).to_json();
    read(rest, handed_off.get(&next.key), format, ctx)
}

/// Re-derives the chain for element `index`, so item paths carry `[index]`
fn indexed_chain(array: &crate::field::Field, index: usize, tail: &[String]) -> Option<Vec<FieldPathItem>> {
    let item = array.item_field(Some(index))?;
    let mut chain = vec![FieldPathItem::new(format!("[{}]", index), item.clone())];
    chain.extend(complete(resolve_from(&item, tail))?);
    Some(chain)
}

/// Writes `value` at `path`, materializing intermediate objects and arrays.
///
/// `None` removes the key. Values are stored in `Document` format.
pub fn set_value(
    model: &Model,
    data: &mut Value,
    path: &str,
    value: Option<Value>,
    ctx: &TransactionContext,
) -> CoreResult<()> {
    let items = complete(resolve_path(model, path))
        .filter(|items| !items.is_empty())
        .ok_or_else(|| CoreError::invalid_path(path))?;

    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
    write(&items, data, value.as_ref(), ctx).map_err(|_| CoreError::invalid_path(path))
}

fn write(
    items: &[FieldPathItem],
    container: &mut Value,
    value: Option<&Value>,
    ctx: &TransactionContext,
) -> CoreResult<()> {
    let (item, rest) = match items.split_first() {
        Some(parts) => parts,
        None => return Ok(()),
    };
    let field = &item.field;

    if rest.is_empty() {
        let serialized = field.serialize(value, Format::Document, ctx);
        return assign(container, &item.key, serialized);
    }

    let slot = slot_mut(container, &item.key)?;

    if field.field_type() != FieldType::Array {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        return write(rest, slot, value, ctx);
    }

    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match parse_segment(&rest[0].key) {
        Segment::Index(_) => write(rest, slot, value, ctx),
        Segment::Wildcard => {
            let len = slot.as_array().map_or(0, Vec::len);
            let tail: Vec<String> = rest[1..].iter().map(|i| i.key.clone()).collect();
            for i in 0..len {
                let chain = indexed_chain(field, i, &tail)
                    .ok_or_else(|| CoreError::invalid_path(field.path()))?;
                write(&chain, slot, value, ctx)?;
            }
            Ok(())
        }
        Segment::Key(key) => Err(CoreError::invalid_path(key)),
    }
}

/// Writes may pad an array with at most this many `null`s
const MAX_INDEX_GAP: usize = 1024;

/// Grows `arr` so that index `i` exists
fn reach(arr: &mut Vec<Value>, i: usize, key: &str) -> CoreResult<()> {
    if i < arr.len() {
        return Ok(());
    }
    if i - arr.len() > MAX_INDEX_GAP {
        return Err(CoreError::invalid_path(key));
    }
    arr.resize(i + 1, Value::Null);
    Ok(())
}

fn slot_mut<'v>(container: &'v mut Value, key: &str) -> CoreResult<&'v mut Value> {
    match (parse_segment(key), container) {
        (Segment::Key(k), Value::Object(obj)) => Ok(obj.entry(k.to_string()).or_insert(Value::Null)),
        (Segment::Index(i), Value::Array(arr)) => {
            reach(arr, i, key)?;
            Ok(&mut arr[i])
        }
        _ => Err(CoreError::invalid_path(key)),
    }
}

fn assign(container: &mut Value, key: &str, serialized: FieldValue) -> CoreResult<()> {
    match (parse_segment(key), container) {
        (Segment::Key(k), Value::Object(obj)) => {
            match serialized {
                FieldValue::Undefined => {
                    obj.remove(k);
                }
                other => {
                    obj.insert(k.to_string(), other.to_json());
                }
            }
            Ok(())
        }
        (Segment::Index(i), Value::Array(arr)) => {
            reach(arr, i, key)?;
            arr[i] = serialized.to_json();
            Ok(())
        }
        _ => Err(CoreError::invalid_path(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, ModelDefinition, ModelRegistry};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn model() -> Arc<Model> {
        let mut item = BTreeMap::new();
        item.insert("title".to_string(), FieldDefinition::text());
        let mut registry = ModelRegistry::with_builtins();
        registry
            .register(
                ModelDefinition::new("posts")
                    .field("title", FieldDefinition::text().with_default(json!("untitled")))
                    .field("tags", FieldDefinition::array(FieldDefinition::text()))
                    .field("items", FieldDefinition::array(FieldDefinition::nested(item))),
            )
            .unwrap()
    }

    #[test]
    fn test_get_injects_default_except_in_document() {
        let model = model();
        let ctx = TransactionContext::new();
        let data = json!({});
        assert_eq!(
            get_value(&model, &data, "title", Format::Json, &ctx),
            FieldValue::Json(json!("untitled"))
        );
        assert!(get_value(&model, &data, "title", Format::Document, &ctx).is_undefined());
    }

    #[test]
    fn test_get_index_out_of_bounds_is_undefined() {
        let model = model();
        let ctx = TransactionContext::new();
        let data = json!({"tags": ["a", "b"]});
        assert_eq!(
            get_value(&model, &data, "tags.[1]", Format::Json, &ctx),
            FieldValue::Json(json!("b"))
        );
        assert!(get_value(&model, &data, "tags.[5]", Format::Json, &ctx).is_undefined());
    }

    #[test]
    fn test_set_materializes_and_removes() {
        let model = model();
        let ctx = TransactionContext::new();
        let mut data = json!({});
        set_value(&model, &mut data, "items.[1].title", Some(json!("second")), &ctx).unwrap();
        assert_eq!(data, json!({"items": [null, {"title": "second"}]}));

        set_value(&model, &mut data, "title", Some(json!("x")), &ctx).unwrap();
        set_value(&model, &mut data, "title", None, &ctx).unwrap();
        assert!(data.get("title").is_none());
    }

    #[test]
    fn test_set_broadcast_updates_every_element() {
        let model = model();
        let ctx = TransactionContext::new();
        let mut data = json!({"items": [{"title": "a"}, {"title": "b"}]});
        set_value(&model, &mut data, "items.[].title", Some(json!("z")), &ctx).unwrap();
        assert_eq!(data, json!({"items": [{"title": "z"}, {"title": "z"}]}));
    }

    #[test]
    fn test_set_rejects_index_far_past_end() {
        let model = model();
        let ctx = TransactionContext::new();
        let mut data = json!({"tags": ["a"]});
        for path in ["tags.[999999999999]", "items.[5000].title"] {
            let err = set_value(&model, &mut data, path, Some(json!("x")), &ctx).unwrap_err();
            assert_eq!(err.code(), crate::core::error::ErrorCode::InvalidPath);
        }
        let huge = format!("tags.[{}]", usize::MAX);
        assert!(set_value(&model, &mut data, &huge, Some(json!("x")), &ctx).is_err());
        assert_eq!(data["tags"], json!(["a"]));

        set_value(&model, &mut data, "tags.[3]", Some(json!("d")), &ctx).unwrap();
        assert_eq!(data["tags"], json!(["a", null, null, "d"]));
    }

    #[test]
    fn test_set_unresolvable_path_fails() {
        let model = model();
        let ctx = TransactionContext::new();
        let mut data = json!({});
        let err = set_value(&model, &mut data, "title.sub", Some(json!(1)), &ctx).unwrap_err();
        assert_eq!(err.code(), crate::core::error::ErrorCode::InvalidPath);
    }
}

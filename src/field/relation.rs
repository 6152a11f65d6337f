//! Relation field: reference to a record of another model

use serde_json::Value;

use super::{batch_values, is_object_id, Field, FieldBehavior, FieldValue, Format, RecordRef};
use crate::core::context::TransactionContext;
use crate::record::Record;

#[derive(Debug, Default)]
pub struct RelationField;

/// Reduces a relation value (bare id or populated record) to its identifier
pub(crate) fn relation_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("_id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

impl FieldBehavior for RelationField {
    fn serialize(&self, field: &Field, value: Option<&Value>, format: Format, _ctx: &TransactionContext) -> FieldValue {
        let raw = match value {
            None => return FieldValue::Undefined,
            Some(Value::Null) => return FieldValue::null(),
            Some(v) => v,
        };
        match format {
            Format::Validation => FieldValue::Json(raw.clone()),
            Format::Object => match (relation_id(raw), field.options().ref_model.as_ref()) {
                (Some(id), Some(model)) => FieldValue::Record(RecordRef::new(model.clone(), id)),
                _ => FieldValue::null(),
            },
            Format::Json | Format::Document | Format::NextField => {
                relation_id(raw).map_or(FieldValue::null(), |id| FieldValue::Json(Value::String(id)))
            }
        }
    }

    fn validate(&self, field: &Field, batch: &[Record], ctx: &TransactionContext) -> bool {
        batch_values(field, batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| matches!(v.as_json(), Some(Value::String(s)) if is_object_id(s)))
    }
}

//! Array field: homogeneous list described by an item definition.
//! Arrays of relations behave as a single relation-list construct.

use serde_json::Value;

use super::relation::relation_id;
use super::{batch_values, Field, FieldBehavior, FieldValue, Format, RecordListRef};
use crate::core::context::TransactionContext;
use crate::record::Record;
use crate::schema::FieldType;

#[derive(Debug, Default)]
pub struct ArrayField;

impl ArrayField {
    /// Elements that are not relations become `null` in place, as a single
    /// relation would, so indexes keep pointing at the stored elements.
    fn serialize_relations(field: &Field, items: &[Value], format: Format) -> FieldValue {
        match format {
            Format::Object => {
                let model = field
                    .item_definition()
                    .and_then(|def| def.options.ref_model.clone())
                    .unwrap_or_default();
                let ids = items.iter().filter_map(relation_id).collect();
                FieldValue::RecordList(RecordListRef::new(model, ids))
            }
            _ => FieldValue::Json(Value::Array(
                items
                    .iter()
                    .map(|item| relation_id(item).map_or(Value::Null, Value::String))
                    .collect(),
            )),
        }
    }
}

impl FieldBehavior for ArrayField {
    fn serialize(&self, field: &Field, value: Option<&Value>, format: Format, ctx: &TransactionContext) -> FieldValue {
        let items = match value {
            None => return FieldValue::Undefined,
            Some(Value::Null) => return FieldValue::null(),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        };

        if format == Format::Validation {
            return FieldValue::Json(Value::Array(items));
        }

        let item_type = field.item_definition().map(|def| def.field_type);
        if item_type == Some(FieldType::Relation) {
            return Self::serialize_relations(field, &items, format);
        }

        let serialized: Vec<FieldValue> = items
            .iter()
            .enumerate()
            .map(|(i, item)| match field.item_field(Some(i)) {
                Some(item_field) => item_field.serialize(Some(item), format, ctx),
                None => FieldValue::Json(item.clone()),
            })
            .collect();

        match format {
            Format::Object => FieldValue::List(serialized),
            _ => FieldValue::Json(Value::Array(serialized.iter().map(FieldValue::to_json).collect())),
        }
    }

    fn validate(&self, field: &Field, batch: &[Record], ctx: &TransactionContext) -> bool {
        let shaped = batch_values(field, batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| matches!(v.as_json(), Some(Value::Array(_))));
        if !shaped {
            return false;
        }
        match field.item_field(None) {
            Some(item) => item.validate(batch, ctx),
            None => true,
        }
    }
}

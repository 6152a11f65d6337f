//! Nested field: keyed object with declared sub-fields and an optional
//! default field shared by every undeclared key

use serde_json::{Map, Value};

use super::{batch_values, Field, FieldBehavior, FieldValue, Format, NestedView};
use crate::core::context::TransactionContext;
use crate::record::Record;

#[derive(Debug, Default)]
pub struct NestedField;

impl NestedField {
    /// Eagerly serializes every key of `obj`
    fn serialize_object(field: &Field, obj: &Map<String, Value>, format: Format, ctx: &TransactionContext) -> Value {
        let strict = field.options().strict;
        let mut out = Map::new();

        for (key, value) in obj {
            if strict && !field.is_declared(key) {
                continue;
            }
            match field.nested_field(key) {
                Some(sub) => {
                    let serialized = sub.serialize(Some(value), format, ctx);
                    if !serialized.is_undefined() {
                        out.insert(key.clone(), serialized.to_json());
                    }
                }
                None => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }

        if format.injects_defaults() {
            for sub in field.declared_fields() {
                if out.contains_key(sub.slug()) {
                    continue;
                }
                if let Some(default) = sub.default_value() {
                    let serialized = sub.serialize(Some(&default), format, ctx);
                    if !serialized.is_undefined() {
                        out.insert(sub.slug().to_string(), serialized.to_json());
                    }
                }
            }
        }

        Value::Object(out)
    }
}

impl FieldBehavior for NestedField {
    fn serialize(&self, field: &Field, value: Option<&Value>, format: Format, ctx: &TransactionContext) -> FieldValue {
        let raw = match value {
            None => return FieldValue::Undefined,
            Some(Value::Null) => return FieldValue::null(),
            Some(v) => v,
        };
        match format {
            Format::Validation | Format::NextField => FieldValue::Json(raw.clone()),
            Format::Object => match raw {
                Value::Object(obj) => FieldValue::Nested(NestedView::new(field.clone(), obj.clone(), ctx.clone())),
                _ => FieldValue::null(),
            },
            Format::Json | Format::Document => match raw {
                Value::Object(obj) => FieldValue::Json(Self::serialize_object(field, obj, format, ctx)),
                _ => FieldValue::null(),
            },
        }
    }

    fn validate(&self, field: &Field, batch: &[Record], ctx: &TransactionContext) -> bool {
        batch_values(field, batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| matches!(v.as_json(), Some(Value::Object(_))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldFactory;
    use crate::schema::FieldDefinition;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn nested(strict: bool) -> Field {
        let mut fields = BTreeMap::new();
        fields.insert("count".to_string(), FieldDefinition::number().with_default(json!(0)));
        fields.insert("title".to_string(), FieldDefinition::text());
        let mut def = FieldDefinition::nested(fields).with_default_field(FieldDefinition::boolean());
        def.options.strict = strict;
        Field::new(&def, "meta", &Arc::new(FieldFactory::new()))
    }

    #[test]
    fn test_json_uses_default_field_for_undeclared_keys() {
        let ctx = TransactionContext::default();
        let raw = json!({"title": 5, "flag": "yes"});
        let out = nested(false).serialize(Some(&raw), Format::Json, &ctx);
        assert_eq!(out, FieldValue::Json(json!({"title": "5", "flag": true, "count": 0})));
    }

    #[test]
    fn test_document_format_does_not_inject_defaults() {
        let ctx = TransactionContext::default();
        let raw = json!({"title": "x"});
        let out = nested(false).serialize(Some(&raw), Format::Document, &ctx);
        assert_eq!(out, FieldValue::Json(json!({"title": "x"})));
    }

    #[test]
    fn test_strict_drops_undeclared_keys() {
        let ctx = TransactionContext::default();
        let raw = json!({"title": "x", "flag": true});
        let out = nested(true).serialize(Some(&raw), Format::Document, &ctx);
        assert_eq!(out, FieldValue::Json(json!({"title": "x"})));
    }

    #[test]
    fn test_object_format_returns_view() {
        let ctx = TransactionContext::default();
        let raw = json!({"title": "x"});
        match nested(false).serialize(Some(&raw), Format::Object, &ctx) {
            FieldValue::Nested(view) => {
                assert_eq!(view.get("title"), FieldValue::Json(json!("x")));
                assert_eq!(view.get("count"), FieldValue::Json(json!(0)));
            }
            other => panic!("expected nested view, got {:?}", other),
        }
    }
}

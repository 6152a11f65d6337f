//! Scalar field kinds: id, number, boolean, date, text, identity

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Number, Value};

use super::{batch_values, format_date, is_object_id, Field, FieldBehavior, FieldValue, Format};
use crate::core::context::TransactionContext;
use crate::record::Record;

/// Scalar identifier, coerced to string
#[derive(Debug, Default)]
pub struct IdField;

impl FieldBehavior for IdField {
    fn serialize(&self, _field: &Field, value: Option<&Value>, _format: Format, _ctx: &TransactionContext) -> FieldValue {
        match value {
            None => FieldValue::Undefined,
            Some(Value::Null) => FieldValue::null(),
            Some(Value::String(s)) => FieldValue::Json(Value::String(s.clone())),
            Some(Value::Number(n)) => FieldValue::Json(Value::String(n.to_string())),
            Some(Value::Bool(b)) => FieldValue::Json(Value::String(b.to_string())),
            Some(Value::Object(obj)) => match obj.get("_id") {
                Some(Value::String(id)) => FieldValue::Json(Value::String(id.clone())),
                _ => FieldValue::null(),
            },
            Some(Value::Array(_)) => FieldValue::null(),
        }
    }
}

/// Numeric field
#[derive(Debug, Default)]
pub struct NumberField;

/// Coerces a JSON value (numeric strings included) to a number; `null` when not numeric
pub(crate) fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Value::from(i);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number)
        }
        _ => Value::Null,
    }
}

impl FieldBehavior for NumberField {
    fn serialize(&self, _field: &Field, value: Option<&Value>, _format: Format, _ctx: &TransactionContext) -> FieldValue {
        match value {
            None => FieldValue::Undefined,
            Some(v) => FieldValue::Json(coerce_number(v)),
        }
    }
}

/// Boolean field with truthiness coercion
#[derive(Debug, Default)]
pub struct BooleanField;

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl FieldBehavior for BooleanField {
    fn serialize(&self, _field: &Field, value: Option<&Value>, _format: Format, _ctx: &TransactionContext) -> FieldValue {
        match value {
            None => FieldValue::Undefined,
            Some(v) => FieldValue::Json(Value::Bool(truthy(v))),
        }
    }
}

/// Date field
#[derive(Debug, Default)]
pub struct DateField;

/// Parses RFC 3339 strings, epoch milliseconds and `{ "$date": ... }` wrappers
pub(crate) fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(obj) => obj.get("$date").and_then(parse_date),
        _ => None,
    }
}

impl FieldBehavior for DateField {
    fn serialize(&self, _field: &Field, value: Option<&Value>, format: Format, _ctx: &TransactionContext) -> FieldValue {
        let raw = match value {
            None => return FieldValue::Undefined,
            Some(Value::Null) => return FieldValue::null(),
            Some(v) => v,
        };
        if format == Format::Validation {
            return FieldValue::Json(raw.clone());
        }
        match (parse_date(raw), format) {
            (None, _) => FieldValue::null(),
            (Some(date), Format::Object) => FieldValue::Date(date),
            (Some(date), _) => FieldValue::Json(Value::String(format_date(&date))),
        }
    }
}

/// Text field, optionally restricted to a closed option set
#[derive(Debug, Default)]
pub struct TextField;

impl TextField {
    fn coerce(value: &Value) -> Value {
        match value {
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => other.clone(),
        }
    }

    fn allowed(field: &Field, value: &Value) -> bool {
        let options = match (&field.options().options, field.options().strict) {
            (Some(options), true) => options,
            _ => return true,
        };
        match value {
            Value::String(s) => options.iter().any(|o| o == s),
            _ => false,
        }
    }
}

impl FieldBehavior for TextField {
    fn serialize(&self, field: &Field, value: Option<&Value>, format: Format, _ctx: &TransactionContext) -> FieldValue {
        let raw = match value {
            None => return FieldValue::Undefined,
            Some(Value::Array(items)) => match items.first() {
                Some(first) => first,
                None => return FieldValue::Undefined,
            },
            Some(v) => v,
        };
        if raw.is_null() {
            return FieldValue::null();
        }
        let coerced = Self::coerce(raw);
        if format != Format::Validation && !Self::allowed(field, &coerced) {
            return FieldValue::Undefined;
        }
        FieldValue::Json(coerced)
    }

    fn validate(&self, field: &Field, batch: &[Record], ctx: &TransactionContext) -> bool {
        batch_values(field, batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| match v.as_json() {
                // Structured values (populated records, maps) never belong in a text field.
                Some(Value::Object(_)) | Some(Value::Array(_)) => false,
                Some(json) => Self::allowed(field, json),
                None => false,
            })
    }
}

/// Identity reference of the form `<type>:<objectid>`
#[derive(Debug, Default)]
pub struct IdentityField;

impl IdentityField {
    fn is_identity(field: &Field, value: &str) -> bool {
        let (kind, id) = match value.split_once(':') {
            Some(parts) => parts,
            None => return false,
        };
        let known = field
            .options()
            .types
            .as_ref()
            .map_or(false, |types| types.iter().any(|t| t == kind));
        known && is_object_id(id)
    }
}

impl FieldBehavior for IdentityField {
    fn serialize(&self, _field: &Field, value: Option<&Value>, _format: Format, _ctx: &TransactionContext) -> FieldValue {
        match value {
            None => FieldValue::Undefined,
            Some(v) => FieldValue::Json(v.clone()),
        }
    }

    fn validate(&self, field: &Field, batch: &[Record], ctx: &TransactionContext) -> bool {
        batch_values(field, batch, ctx)
            .iter()
            .filter(|v| !v.is_empty())
            .all(|v| match v.as_json() {
                Some(Value::String(s)) => Self::is_identity(field, s),
                _ => false,
            })
    }
}

//! Field catalogue
//!
//! A `Field` is an immutable value object derived from a `FieldDefinition`
//! and a position (`path`) inside the owning model. Its behaviour
//! (serialization and validation) is supplied by a `FieldBehavior` chosen
//! per type tag by the `FieldFactory`, which an adapter may override.

mod array;
mod handles;
mod nested;
mod relation;
mod scalar;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;

use crate::core::context::TransactionContext;
use crate::record::Record;
use crate::schema::{FieldDefinition, FieldOptions, FieldType};

pub use array::ArrayField;
pub use handles::{NestedView, RecordListRef, RecordRef};
pub use nested::NestedField;
pub use relation::RelationField;
pub use scalar::{BooleanField, DateField, IdField, IdentityField, NumberField, TextField};
pub(crate) use scalar::coerce_number;

/// Serialization formats understood by every field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Read format: lazy handles for relations and nested objects
    Object,
    /// Plain JSON output
    Json,
    /// Raw persisted document; defaults are never materialized
    Document,
    /// Values as seen by validators (raw values pass through)
    Validation,
    /// Intermediate format used while handing off to the next path step
    NextField,
}

impl Format {
    /// Whether reads in this format inject configured defaults
    pub fn injects_defaults(&self) -> bool {
        !matches!(self, Format::Document)
    }
}

/// Result of serializing a value through a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value at this position
    Undefined,
    /// Plain JSON value (including `null`)
    Json(Value),
    /// Date instance
    Date(DateTime<Utc>),
    /// Lazy single-record handle
    Record(RecordRef),
    /// Lazy record-list handle
    RecordList(RecordListRef),
    /// Lazy nested object accessor
    Nested(NestedView),
    /// One result per element of a broadcast (`[]`) segment
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn null() -> Self {
        FieldValue::Json(Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldValue::Undefined)
    }

    /// Undefined, null or the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Undefined => true,
            FieldValue::Json(Value::Null) => true,
            FieldValue::Json(Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns the inner JSON value, if this is a plain value
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Converts into plain JSON. Handles collapse to their identifiers.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Undefined => Value::Null,
            FieldValue::Json(v) => v.clone(),
            FieldValue::Date(d) => Value::String(format_date(d)),
            FieldValue::Record(r) => Value::String(r.id.clone()),
            FieldValue::RecordList(l) => {
                Value::Array(l.ids.iter().cloned().map(Value::String).collect())
            }
            FieldValue::Nested(view) => view.to_json(),
            FieldValue::List(items) => Value::Array(items.iter().map(|i| i.to_json()).collect()),
        }
    }

    /// Flattens broadcast lists into a single sequence of leaf values
    pub fn flatten(self) -> Vec<FieldValue> {
        match self {
            FieldValue::List(items) => items.into_iter().flat_map(|i| i.flatten()).collect(),
            other => vec![other],
        }
    }
}

/// Serialization and validation behaviour of one field type
pub trait FieldBehavior: Send + Sync + fmt::Debug {
    /// Serialize a raw value (`None` = undefined) into the given format
    fn serialize(
        &self,
        field: &Field,
        value: Option<&Value>,
        format: Format,
        ctx: &TransactionContext,
    ) -> FieldValue;

    /// Validate the values found at this field's path across a batch
    fn validate(&self, _field: &Field, _batch: &[Record], _ctx: &TransactionContext) -> bool {
        true
    }
}

/// Per-type behaviour overrides supplied by an adapter
pub type FieldOverrides = HashMap<FieldType, Arc<dyn FieldBehavior>>;

/// Chooses the behaviour for each field type
#[derive(Debug, Default)]
pub struct FieldFactory {
    overrides: FieldOverrides,
}

impl FieldFactory {
    /// Create a factory using only built-in behaviours
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with adapter overrides
    pub fn with_overrides(overrides: FieldOverrides) -> Self {
        Self { overrides }
    }

    /// Returns the behaviour for the given type
    pub fn behavior_for(&self, field_type: FieldType) -> Arc<dyn FieldBehavior> {
        if let Some(custom) = self.overrides.get(&field_type) {
            return Arc::clone(custom);
        }
        match field_type {
            FieldType::Id => Arc::new(IdField),
            FieldType::Number => Arc::new(NumberField),
            FieldType::Boolean => Arc::new(BooleanField),
            FieldType::Date => Arc::new(DateField),
            FieldType::Text => Arc::new(TextField),
            FieldType::Relation => Arc::new(RelationField),
            FieldType::Nested => Arc::new(NestedField),
            FieldType::Identity => Arc::new(IdentityField),
            FieldType::Array => Arc::new(ArrayField),
        }
    }
}

/// A typed unit of a schema, positioned at `path`
#[derive(Debug, Clone)]
pub struct Field {
    field_type: FieldType,
    options: Arc<FieldOptions>,
    path: String,
    behavior: Arc<dyn FieldBehavior>,
    factory: Arc<FieldFactory>,
}

impl Field {
    /// Derive a field from its definition
    pub fn new(def: &FieldDefinition, path: impl Into<String>, factory: &Arc<FieldFactory>) -> Self {
        Self {
            field_type: def.field_type,
            options: Arc::new(def.options.clone().with_type_defaults(def.field_type)),
            path: path.into(),
            behavior: factory.behavior_for(def.field_type),
            factory: Arc::clone(factory),
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    /// Full dotted path within the owning model
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path
    pub fn slug(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn default_value(&self) -> Option<Value> {
        self.options.default.clone()
    }

    /// Serialize a raw value through this field
    pub fn serialize(&self, value: Option<&Value>, format: Format, ctx: &TransactionContext) -> FieldValue {
        self.behavior.serialize(self, value, format, ctx)
    }

    /// Validate this field across a batch
    pub fn validate(&self, batch: &[Record], ctx: &TransactionContext) -> bool {
        self.behavior.validate(self, batch, ctx)
    }

    /// Sub-field of a nested field: declared first, then the default field.
    pub fn nested_field(&self, key: &str) -> Option<Field> {
        if self.field_type != FieldType::Nested {
            return None;
        }
        let def = self
            .options
            .fields
            .get(key)
            .or(self.options.default_field.as_deref())?;
        Some(Field::new(def, join_path(&self.path, key), &self.factory))
    }

    /// Whether `key` is declared on this nested field
    pub fn is_declared(&self, key: &str) -> bool {
        self.options.fields.contains_key(key)
    }

    /// Declared sub-fields of a nested field
    pub fn declared_fields(&self) -> Vec<Field> {
        self.options
            .fields
            .iter()
            .map(|(key, def)| Field::new(def, join_path(&self.path, key), &self.factory))
            .collect()
    }

    /// Item field of an array: `[n]` when an index is given, `[]` otherwise
    pub fn item_field(&self, index: Option<usize>) -> Option<Field> {
        if self.field_type != FieldType::Array {
            return None;
        }
        let def = self.options.items.as_deref()?;
        let segment = match index {
            Some(i) => format!("[{}]", i),
            None => "[]".to_string(),
        };
        Some(Field::new(def, join_path(&self.path, &segment), &self.factory))
    }

    /// Item definition of an array field
    pub fn item_definition(&self) -> Option<&FieldDefinition> {
        self.options.items.as_deref()
    }
}

/// Joins two path fragments with a dot
pub fn join_path(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}.{}", prefix, key),
    }
}

/// Canonical date rendering (RFC 3339, millisecond precision)
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether a value is a 24-character hexadecimal object id
pub fn is_object_id(value: &str) -> bool {
    static OBJECT_ID: OnceLock<Option<Regex>> = OnceLock::new();
    OBJECT_ID
        .get_or_init(|| Regex::new(r"^[a-fA-F0-9]{24}$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(value))
}

/// Values at `field`'s path for every record, flattened through broadcasts
pub(crate) fn batch_values(field: &Field, batch: &[Record], ctx: &TransactionContext) -> Vec<FieldValue> {
    batch
        .iter()
        .flat_map(|record| record.get_with_ctx(field.path(), Format::Validation, ctx).flatten())
        .collect()
}

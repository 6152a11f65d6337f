//! Lazy handles returned by the read (`Object`) format.
//!
//! Relation handles carry only the referenced model and identifiers; they are
//! resolved on demand through `Client::resolve` / `Client::resolve_list`.
//! `NestedView` is an explicit per-key accessor: `get(key)` serializes only
//! the requested key, siblings stay untouched.

use serde_json::{Map, Value};

use super::{Field, FieldValue, Format};
use crate::core::context::TransactionContext;
use crate::core::error::{CoreError, CoreResult};
use crate::core::operation::Query;

/// Lazy single-record handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub model: String,
    pub id: String,
}

impl RecordRef {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
        }
    }

    /// Query fetching the referenced record
    pub fn query(&self) -> Query {
        Query::by_id(self.id.clone())
    }
}

/// Lazy record-list handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordListRef {
    pub model: String,
    pub ids: Vec<String>,
}

impl RecordListRef {
    pub fn new(model: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            model: model.into(),
            ids,
        }
    }

    /// Query fetching the referenced records
    pub fn query(&self) -> Query {
        Query::by_ids(self.ids.clone())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Per-key accessor over a nested object
#[derive(Debug, Clone)]
pub struct NestedView {
    field: Field,
    data: Map<String, Value>,
    ctx: TransactionContext,
}

impl NestedView {
    pub(crate) fn new(field: Field, data: Map<String, Value>, ctx: TransactionContext) -> Self {
        Self { field, data, ctx }
    }

    /// Path of the nested field this view exposes
    pub fn path(&self) -> &str {
        self.field.path()
    }

    /// Keys present in the underlying object
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Read one key in the read format
    pub fn get(&self, key: &str) -> FieldValue {
        self.get_as(key, Format::Object)
    }

    /// Read one key in the given format
    pub fn get_as(&self, key: &str, format: Format) -> FieldValue {
        if self.field.options().strict && !self.field.is_declared(key) {
            return FieldValue::Undefined;
        }
        let sub = match self.field.nested_field(key) {
            Some(sub) => sub,
            None => {
                return self
                    .data
                    .get(key)
                    .map_or(FieldValue::Undefined, |v| FieldValue::Json(v.clone()))
            }
        };
        let mut value = self.data.get(key).cloned();
        if value.is_none() && format.injects_defaults() {
            value = sub.default_value();
        }
        sub.serialize(value.as_ref(), format, &self.ctx)
    }

    /// Write one key; the value is stored in document form
    pub fn set(&mut self, key: &str, value: Option<Value>) -> CoreResult<()> {
        let strict = self.field.options().strict;
        let sub = match self.field.nested_field(key) {
            Some(sub) if !strict || self.field.is_declared(key) => Some(sub),
            Some(_) => None,
            None if strict => None,
            None => {
                match value {
                    Some(v) => self.data.insert(key.to_string(), v),
                    None => self.data.remove(key),
                };
                return Ok(());
            }
        };
        let sub = sub.ok_or_else(|| {
            CoreError::invalid_path(format!("{}.{}", self.field.path(), key))
        })?;
        match sub.serialize(value.as_ref(), Format::Document, &self.ctx) {
            FieldValue::Undefined => {
                self.data.remove(key);
            }
            serialized => {
                self.data.insert(key.to_string(), serialized.to_json());
            }
        }
        Ok(())
    }

    /// Raw underlying object
    pub fn raw(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Eager JSON serialization of the whole object
    pub fn to_json(&self) -> Value {
        self.field
            .serialize(Some(&Value::Object(self.data.clone())), Format::Json, &self.ctx)
            .to_json()
    }
}

impl PartialEq for NestedView {
    fn eq(&self, other: &Self) -> bool {
        self.field.path() == other.field.path() && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;
    use crate::field::FieldFactory;
    use crate::schema::FieldDefinition;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn view(strict: bool, data: Value) -> NestedView {
        let mut fields = BTreeMap::new();
        fields.insert("when".to_string(), FieldDefinition::date());
        let mut def = FieldDefinition::nested(fields);
        def.options.strict = strict;
        let field = Field::new(&def, "meta", &Arc::new(FieldFactory::new()));
        let data = data.as_object().cloned().unwrap_or_default();
        NestedView::new(field, data, TransactionContext::default())
    }

    #[test]
    fn test_get_serializes_only_requested_key() {
        let v = view(false, json!({"when": "2024-01-01T00:00:00Z", "other": 1}));
        assert!(matches!(v.get("when"), FieldValue::Date(_)));
        assert_eq!(v.get("other"), FieldValue::Json(json!(1)));
        assert_eq!(v.get("missing"), FieldValue::Undefined);
    }

    #[test]
    fn test_set_stores_document_form() {
        let mut v = view(false, json!({}));
        v.set("when", Some(json!(0))).unwrap();
        assert_eq!(v.raw()["when"], json!("1970-01-01T00:00:00.000Z"));

        v.set("when", None).unwrap();
        assert!(v.raw().get("when").is_none());
    }

    #[test]
    fn test_strict_view_rejects_undeclared_keys() {
        let mut v = view(true, json!({"extra": 1}));
        assert_eq!(v.get("extra"), FieldValue::Undefined);
        let err = v.set("extra", Some(json!(2))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPath);
    }

    #[test]
    fn test_record_ref_query() {
        let handle = RecordRef::new("accounts", "5f8d0d55b54764421b7156c3");
        assert_eq!(handle.query().ids, Some(vec!["5f8d0d55b54764421b7156c3".to_string()]));
    }
}

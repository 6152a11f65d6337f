//! Records
//!
//! A `Record` is a raw document bound to its `Model`. Every access goes
//! through path resolution, so values are typed by the schema on the way out
//! and stored in document form on the way in.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::context::TransactionContext;
use crate::core::error::CoreResult;
use crate::field::{FieldValue, Format};
use crate::path::{get_value, set_value};
use crate::schema::Model;

/// Hydrated document of a model
#[derive(Debug, Clone)]
pub struct Record {
    model: Arc<Model>,
    data: Value,
}

impl Record {
    /// Binds `data` to `model`; non-object data becomes an empty document
    pub fn new(model: Arc<Model>, data: Value) -> Self {
        let data = if data.is_object() {
            data
        } else {
            Value::Object(Map::new())
        };
        Self { model, data }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Raw underlying document
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// Stored `_id`, if any
    pub fn id(&self) -> Option<&str> {
        self.data.get("_id").and_then(Value::as_str)
    }

    /// Reads the value at `path` in the given format
    pub fn get(&self, path: &str, format: Format) -> FieldValue {
        self.get_with_ctx(path, format, &TransactionContext::new())
    }

    /// Reads the value at `path` within an ongoing transaction
    pub fn get_with_ctx(&self, path: &str, format: Format, ctx: &TransactionContext) -> FieldValue {
        get_value(&self.model, &self.data, path, format, ctx)
    }

    /// Reads the value at `path` as plain JSON
    pub fn get_json(&self, path: &str) -> Value {
        self.get(path, Format::Json).to_json()
    }

    /// Writes `value` at `path` in document form
    pub fn set(&mut self, path: &str, value: Value) -> CoreResult<()> {
        set_value(&self.model, &mut self.data, path, Some(value), &TransactionContext::new())
    }

    /// Removes the value at `path`
    pub fn unset(&mut self, path: &str) -> CoreResult<()> {
        set_value(&self.model, &mut self.data, path, None, &TransactionContext::new())
    }

    /// Every declared root field in `Document` format; defaults are not materialized
    pub fn to_document(&self) -> Value {
        self.serialize_roots(Format::Document)
    }

    /// Every declared root field in `Json` format, defaults included
    pub fn to_json(&self) -> Value {
        self.serialize_roots(Format::Json)
    }

    fn serialize_roots(&self, format: Format) -> Value {
        let ctx = TransactionContext::new();
        let mut out = Map::new();
        for field in self.model.fields() {
            let value = self.get_with_ctx(field.path(), format, &ctx);
            if !value.is_undefined() {
                out.insert(field.path().to_string(), value.to_json());
            }
        }
        Value::Object(out)
    }
}

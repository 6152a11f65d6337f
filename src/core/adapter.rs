//! Adapter action map
//!
//! An `Adapter` performs the actual reads and writes for a model; the engine
//! only decides how values are typed, shaped and checked. It may also supply
//! per-type field and validator behaviours.
//!
//! `MemoryAdapter` is a complete in-process implementation backed by
//! `RwLock<HashMap<slug, Vec<document>>>`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::context::TransactionContext;
use super::error::CoreResult;
use super::filter::{DocumentFilter, DocumentSorter};
use super::operation::Query;
use super::update::apply_update;
use crate::field::{format_date, FieldBehavior, FieldOverrides};
use crate::schema::{FieldType, Model, ValidatorType};
use crate::validator::{ValidatorBehavior, ValidatorOverrides};

/// Boxed future returned by adapter actions
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = CoreResult<T>> + Send + 'a>>;

/// Persistence actions consumed by the pipeline
pub trait Adapter: Send + Sync {
    fn count<'a>(&'a self, model: &'a Model, query: &'a Query, ctx: &'a TransactionContext) -> AdapterFuture<'a, u64>;

    fn get<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Option<Value>>;

    fn get_list<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<Value>>;

    fn create_one<'a>(
        &'a self,
        model: &'a Model,
        document: Value,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Value>;

    fn create_multiple<'a>(
        &'a self,
        model: &'a Model,
        documents: Vec<Value>,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<Value>>;

    fn update_one<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        update: &'a Value,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Option<Value>>;

    fn update_multiple<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        update: &'a Value,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<Value>>;

    fn delete_one<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, bool>;

    fn delete_multiple<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<String>>;

    /// Optional one-time setup for a model
    fn initialize<'a>(&'a self, _model: &'a Model, _ctx: &'a TransactionContext) -> AdapterFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Field behaviours replacing the built-ins, per type
    fn field_overrides(&self) -> FieldOverrides {
        HashMap::new()
    }

    /// Validator rules replacing the built-ins, per type
    fn validator_overrides(&self) -> ValidatorOverrides {
        HashMap::new()
    }
}

/// Generates a 24-hex object id: 4 bytes of seconds, 8 random bytes
pub fn generate_object_id() -> String {
    format!("{:08x}{:016x}", Utc::now().timestamp() as u32, rand::random::<u64>())
}

/// In-memory adapter
#[derive(Default)]
pub struct MemoryAdapter {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    field_overrides: FieldOverrides,
    validator_overrides: ValidatorOverrides,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the behaviour of one field type
    pub fn with_field_override(mut self, field_type: FieldType, behavior: Arc<dyn FieldBehavior>) -> Self {
        self.field_overrides.insert(field_type, behavior);
        self
    }

    /// Replace the rule of one validator type
    pub fn with_validator_override(
        mut self,
        validator_type: ValidatorType,
        behavior: Arc<dyn ValidatorBehavior>,
    ) -> Self {
        self.validator_overrides.insert(validator_type, behavior);
        self
    }

    /// Stores documents as-is, bypassing the pipeline
    pub async fn seed(&self, slug: &str, documents: Vec<Value>) {
        let mut collections = self.collections.write().await;
        collections.entry(slug.to_string()).or_default().extend(documents);
    }

    /// Snapshot of every stored document of a model
    pub async fn documents(&self, slug: &str) -> Vec<Value> {
        let collections = self.collections.read().await;
        collections.get(slug).cloned().unwrap_or_default()
    }

    /// Indexes of matching documents, sorted and windowed
    fn select(documents: &[Value], query: &Query) -> CoreResult<Vec<usize>> {
        let mut matched = Vec::new();
        for (index, doc) in documents.iter().enumerate() {
            if let Some(ids) = &query.ids {
                let id = doc.get("_id").and_then(Value::as_str);
                if !id.map_or(false, |id| ids.iter().any(|wanted| wanted == id)) {
                    continue;
                }
            }
            if let Some(filter) = &query.filter {
                if !DocumentFilter::matches(doc, filter)? {
                    continue;
                }
            }
            matched.push(index);
        }

        if let Some(sort) = &query.sort {
            let sorter = DocumentSorter::parse(sort)?;
            matched.sort_by(|a, b| sorter.compare(&documents[*a], &documents[*b]));
        }

        let (skip, limit) = query.window();
        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn stamp_new(mut document: Value) -> Value {
        if !document.is_object() {
            document = Value::Object(Map::new());
        }
        let now = Value::String(format_date(&Utc::now()));
        if let Some(obj) = document.as_object_mut() {
            let has_id = obj.get("_id").map_or(false, |id| !id.is_null());
            if !has_id {
                obj.insert("_id".to_string(), Value::String(generate_object_id()));
            }
            obj.entry("_createdAt").or_insert_with(|| now.clone());
            obj.insert("_updatedAt".to_string(), now);
        }
        document
    }

    fn stamp_updated(document: &mut Value) {
        if let Some(obj) = document.as_object_mut() {
            obj.insert("_updatedAt".to_string(), Value::String(format_date(&Utc::now())));
        }
    }

    fn first(query: &Query) -> Query {
        let mut single = query.clone();
        single.page = None;
        single.page_size = None;
        single.limit = Some(1);
        single
    }
}

impl Adapter for MemoryAdapter {
    fn count<'a>(&'a self, model: &'a Model, query: &'a Query, _ctx: &'a TransactionContext) -> AdapterFuture<'a, u64> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            let docs = collections.get(model.slug()).map(Vec::as_slice).unwrap_or_default();
            let mut unwindowed = query.clone();
            unwindowed.skip = None;
            unwindowed.limit = None;
            unwindowed.page = None;
            unwindowed.page_size = None;
            Ok(Self::select(docs, &unwindowed)?.len() as u64)
        })
    }

    fn get<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Option<Value>> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            let docs = collections.get(model.slug()).map(Vec::as_slice).unwrap_or_default();
            let selected = Self::select(docs, &Self::first(query))?;
            Ok(selected.first().map(|i| docs[*i].clone()))
        })
    }

    fn get_list<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let collections = self.collections.read().await;
            let docs = collections.get(model.slug()).map(Vec::as_slice).unwrap_or_default();
            let selected = Self::select(docs, query)?;
            Ok(selected.into_iter().map(|i| docs[i].clone()).collect())
        })
    }

    fn create_one<'a>(
        &'a self,
        model: &'a Model,
        document: Value,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Value> {
        Box::pin(async move {
            let document = Self::stamp_new(document);
            let mut collections = self.collections.write().await;
            collections
                .entry(model.slug().to_string())
                .or_default()
                .push(document.clone());
            Ok(document)
        })
    }

    fn create_multiple<'a>(
        &'a self,
        model: &'a Model,
        documents: Vec<Value>,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let documents: Vec<Value> = documents.into_iter().map(Self::stamp_new).collect();
            let mut collections = self.collections.write().await;
            collections
                .entry(model.slug().to_string())
                .or_default()
                .extend(documents.iter().cloned());
            Ok(documents)
        })
    }

    fn update_one<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        update: &'a Value,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Option<Value>> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let docs = match collections.get_mut(model.slug()) {
                Some(docs) => docs,
                None => return Ok(None),
            };
            let index = match Self::select(docs, &Self::first(query))?.first() {
                Some(index) => *index,
                None => return Ok(None),
            };
            let mut updated = docs[index].clone();
            apply_update(&mut updated, update, false)?;
            Self::stamp_updated(&mut updated);
            docs[index] = updated.clone();
            Ok(Some(updated))
        })
    }

    fn update_multiple<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        update: &'a Value,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let docs = match collections.get_mut(model.slug()) {
                Some(docs) => docs,
                None => return Ok(Vec::new()),
            };
            let selected = Self::select(docs, query)?;

            // Apply to copies first so a failing update leaves the store untouched.
            let mut updated = Vec::with_capacity(selected.len());
            for index in &selected {
                let mut doc = docs[*index].clone();
                apply_update(&mut doc, update, false)?;
                Self::stamp_updated(&mut doc);
                updated.push(doc);
            }
            for (index, doc) in selected.iter().zip(&updated) {
                docs[*index] = doc.clone();
            }
            Ok(updated)
        })
    }

    fn delete_one<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, bool> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let docs = match collections.get_mut(model.slug()) {
                Some(docs) => docs,
                None => return Ok(false),
            };
            match Self::select(docs, &Self::first(query))?.first() {
                Some(index) => {
                    docs.remove(*index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete_multiple<'a>(
        &'a self,
        model: &'a Model,
        query: &'a Query,
        _ctx: &'a TransactionContext,
    ) -> AdapterFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut collections = self.collections.write().await;
            let docs = match collections.get_mut(model.slug()) {
                Some(docs) => docs,
                None => return Ok(Vec::new()),
            };
            let mut selected = Self::select(docs, query)?;
            selected.sort_unstable_by(|a, b| b.cmp(a));

            let mut ids = Vec::with_capacity(selected.len());
            for index in selected {
                let removed = docs.remove(index);
                if let Some(id) = removed.get("_id").and_then(Value::as_str) {
                    ids.push(id.to_string());
                }
            }
            ids.reverse();
            Ok(ids)
        })
    }

    fn field_overrides(&self) -> FieldOverrides {
        self.field_overrides.clone()
    }

    fn validator_overrides(&self) -> ValidatorOverrides {
        self.validator_overrides.clone()
    }
}

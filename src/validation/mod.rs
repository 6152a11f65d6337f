//! Validation orchestrator
//!
//! One `validate_model` call walks the model's field tree depth-first over a
//! batch of records:
//!
//! - every field runs its own check; a failing field is reported and not
//!   descended into
//! - nested and array scopes that hold values contribute their scoped
//!   validators to a queue deduplicated by `Validator::get_key`
//! - undeclared keys of a nested field with a default field are grouped by
//!   content hash, and each group is visited with just its documents
//!
//! A validator discovered from several scopes is queued once and runs over
//! the union of their documents. Model-level validators always run on the
//! whole batch. Queued scoped validators only run once the structure is known
//! to be sound.

mod errors;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::context::TransactionContext;
use crate::core::error::{CoreError, CoreResult};
use crate::field::{join_path, Field, Format};
use crate::record::Record;
use crate::schema::{FieldType, Model, ValidatorDefinition};
use crate::validator::{Validator, ValidatorFactory};

pub use errors::{FieldError, ValidationError, ValidatorError};

/// Validates raw documents after hydrating them as records of `model`
pub fn validate_documents(model: &Arc<Model>, documents: &[Value], ctx: &TransactionContext) -> CoreResult<()> {
    let batch: Vec<Record> = documents.iter().map(|doc| model.record(doc.clone())).collect();
    validate_model(model, &batch, ctx)
}

/// Validates a batch of records against their model.
///
/// Returns `ValidationFailed` carrying every field and validator failure.
pub fn validate_model(model: &Model, batch: &[Record], ctx: &TransactionContext) -> CoreResult<()> {
    let mut pass = Pass::new(model.validator_factory(), batch, ctx);
    let everyone: Vec<usize> = (0..batch.len()).collect();

    let field_errors: Vec<FieldError> = model
        .fields()
        .iter()
        .filter_map(|field| pass.visit_field(field, &everyone))
        .collect();

    let mut validator_errors: Vec<ValidatorError> = model
        .validators()
        .iter()
        .filter(|validator| !validator.validate(batch, ctx))
        .map(|validator| ValidatorError::new(validator.definition().clone(), validator.full_path()))
        .collect();

    let model_level_failures = validator_errors.len();
    let queued = pass.queue.len();

    if field_errors.is_empty() && validator_errors.is_empty() {
        for (validator, scope) in &pass.queue {
            if !validator.validate(&pass.records(scope), ctx) {
                validator_errors.push(ValidatorError::new(
                    validator.definition().clone(),
                    validator.full_path(),
                ));
            }
        }
    }

    tracing::debug!(
        model = %model.slug(),
        records = batch.len(),
        field_errors = field_errors.len(),
        model_validator_failures = model_level_failures,
        scoped_validators = queued,
        "validation pass finished"
    );

    if field_errors.is_empty() && validator_errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(ValidationError::new(field_errors, validator_errors)))
    }
}

/// State local to one orchestration pass.
///
/// Scopes are ascending indexes into `batch`, so identical documents stay
/// distinct when scopes are merged.
struct Pass<'a> {
    factory: &'a ValidatorFactory,
    batch: &'a [Record],
    ctx: &'a TransactionContext,
    slots: HashMap<String, usize>,
    queue: Vec<(Validator, Vec<usize>)>,
}

impl<'a> Pass<'a> {
    fn new(factory: &'a ValidatorFactory, batch: &'a [Record], ctx: &'a TransactionContext) -> Self {
        Self {
            factory,
            batch,
            ctx,
            slots: HashMap::new(),
            queue: Vec::new(),
        }
    }

    fn records(&self, scope: &[usize]) -> Vec<Record> {
        scope.iter().filter_map(|&i| self.batch.get(i)).cloned().collect()
    }

    fn visit_field(&mut self, field: &Field, scope: &[usize]) -> Option<FieldError> {
        if !field.validate(&self.records(scope), self.ctx) {
            let mut err = FieldError::new(field.slug(), field.path());
            if let Some(item) = self.failing_item(field, scope) {
                err = err.with_child(ValidationError::new(vec![item], Vec::new()));
            }
            return Some(err);
        }
        self.descend(field, scope)
    }

    /// Children of a field already known to be valid
    fn descend(&mut self, field: &Field, scope: &[usize]) -> Option<FieldError> {
        let children = match field.field_type() {
            FieldType::Nested => self.visit_nested(field, scope),
            FieldType::Array => self.visit_array(field, scope),
            _ => Vec::new(),
        };
        if children.is_empty() {
            None
        } else {
            Some(
                FieldError::new(field.slug(), field.path())
                    .with_child(ValidationError::new(children, Vec::new())),
            )
        }
    }

    /// Item-level failure behind a failing array
    fn failing_item(&self, field: &Field, scope: &[usize]) -> Option<FieldError> {
        if field.field_type() != FieldType::Array {
            return None;
        }
        let item = field.item_field(None)?;
        let scoped = self.with_values(field, scope, |v| matches!(v, Value::Array(items) if !items.is_empty()));
        if item.validate(&self.records(&scoped), self.ctx) {
            None
        } else {
            Some(FieldError::new(item.slug(), item.path()))
        }
    }

    fn visit_nested(&mut self, field: &Field, scope: &[usize]) -> Vec<FieldError> {
        let scoped = self.with_values(field, scope, |v| !v.is_null());
        if scoped.is_empty() {
            return Vec::new();
        }

        self.enqueue(&field.options().validators, field.path(), &scoped);

        let mut errors: Vec<FieldError> = field
            .declared_fields()
            .iter()
            .filter_map(|sub| self.visit_field(sub, &scoped))
            .collect();

        if field.options().default_field.is_some() {
            for ((key, _), members) in self.group_undeclared(field, &scoped) {
                let sub = match field.nested_field(&key) {
                    Some(sub) => sub,
                    None => continue,
                };
                if let Some(err) = self.visit_field(&sub, &members) {
                    errors.push(err);
                }
            }
        }

        errors
    }

    fn visit_array(&mut self, field: &Field, scope: &[usize]) -> Vec<FieldError> {
        let scoped = self.with_values(field, scope, |v| matches!(v, Value::Array(items) if !items.is_empty()));
        if scoped.is_empty() {
            return Vec::new();
        }

        self.enqueue(&field.options().validators, &join_path(field.path(), "[]"), &scoped);

        match field.item_field(None) {
            Some(item) => self.descend(&item, &scoped).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Indexes in `scope` holding at least one value at `field` accepted by `keep`
    fn with_values(&self, field: &Field, scope: &[usize], keep: impl Fn(&Value) -> bool) -> Vec<usize> {
        scope
            .iter()
            .copied()
            .filter(|&i| {
                self.batch.get(i).map_or(false, |record| {
                    record
                        .get_with_ctx(field.path(), Format::Validation, self.ctx)
                        .flatten()
                        .iter()
                        .any(|value| !value.is_undefined() && keep(&value.to_json()))
                })
            })
            .collect()
    }

    /// Groups indexes by (undeclared key, content hash)
    fn group_undeclared(&self, field: &Field, scope: &[usize]) -> BTreeMap<(String, String), Vec<usize>> {
        let mut groups: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
        for &index in scope {
            let record = match self.batch.get(index) {
                Some(record) => record,
                None => continue,
            };
            let values = record
                .get_with_ctx(field.path(), Format::Validation, self.ctx)
                .flatten();
            for value in values {
                let obj = match value.to_json() {
                    Value::Object(obj) => obj,
                    _ => continue,
                };
                for (key, content) in obj {
                    if field.is_declared(&key) {
                        continue;
                    }
                    let members = groups.entry((key, content_hash(&content))).or_default();
                    if !members.contains(&index) {
                        members.push(index);
                    }
                }
            }
        }
        groups
    }

    fn enqueue(&mut self, defs: &[ValidatorDefinition], prefix: &str, scope: &[usize]) {
        for def in defs {
            let validator = Validator::new(def, prefix, self.factory);
            let key = validator.get_key();
            match self.slots.get(&key) {
                Some(&slot) => {
                    let queued = &mut self.queue[slot].1;
                    queued.extend_from_slice(scope);
                    queued.sort_unstable();
                    queued.dedup();
                }
                None => {
                    self.slots.insert(key, self.queue.len());
                    self.queue.push((validator, scope.to_vec()));
                }
            }
        }
    }
}

/// Hash of the serialized value. Object keys are sorted by the serializer;
/// array order is significant.
fn content_hash(value: &Value) -> String {
    let digest = Sha256::digest(value.to_string().as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

//! Validator catalogue
//!
//! A `Validator` is a cross-field invariant bound to a scope prefix. Its
//! dedup key (full path + type) identifies the logical constraint no matter
//! where in a batch it was discovered. The rule itself is a
//! `ValidatorBehavior` chosen per type by the `ValidatorFactory`.

mod rules;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::context::TransactionContext;
use crate::field::{join_path, FieldValue, Format};
use crate::record::Record;
use crate::schema::{ValidatorDefinition, ValidatorOptions, ValidatorType};

pub use rules::{
    BoundariesValidator, KeyFieldValidator, LengthValidator, ModelDefinitionValidator,
    ModelSlugValidator, RegexValidator, RequiredValidator, UniqueValidator, RESERVED_SLUGS,
};

/// Rule evaluated by a validator over a batch
pub trait ValidatorBehavior: Send + Sync + fmt::Debug {
    fn validate(&self, validator: &Validator, batch: &[Record], ctx: &TransactionContext) -> bool;
}

/// Per-type rule overrides supplied by an adapter
pub type ValidatorOverrides = HashMap<ValidatorType, Arc<dyn ValidatorBehavior>>;

/// Chooses the rule for each validator type
#[derive(Debug, Default)]
pub struct ValidatorFactory {
    overrides: ValidatorOverrides,
}

impl ValidatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: ValidatorOverrides) -> Self {
        Self { overrides }
    }

    pub fn behavior_for(&self, validator_type: ValidatorType) -> Arc<dyn ValidatorBehavior> {
        if let Some(custom) = self.overrides.get(&validator_type) {
            return Arc::clone(custom);
        }
        match validator_type {
            ValidatorType::Required => Arc::new(RequiredValidator),
            ValidatorType::Unique => Arc::new(UniqueValidator),
            ValidatorType::Regex => Arc::new(RegexValidator),
            ValidatorType::Length => Arc::new(LengthValidator),
            ValidatorType::Boundaries => Arc::new(BoundariesValidator),
            ValidatorType::KeyField => Arc::new(KeyFieldValidator),
            ValidatorType::ModelSlug => Arc::new(ModelSlugValidator),
            ValidatorType::ModelDefinition => Arc::new(ModelDefinitionValidator),
        }
    }
}

/// A validator definition bound to a scope
#[derive(Debug, Clone)]
pub struct Validator {
    definition: ValidatorDefinition,
    /// Scope prefix; empty for model-level validators
    path: String,
    behavior: Arc<dyn ValidatorBehavior>,
}

impl Validator {
    pub fn new(def: &ValidatorDefinition, prefix: impl Into<String>, factory: &ValidatorFactory) -> Self {
        Self {
            definition: def.clone(),
            path: prefix.into(),
            behavior: factory.behavior_for(def.validator_type),
        }
    }

    pub fn validator_type(&self) -> ValidatorType {
        self.definition.validator_type
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.definition.options
    }

    pub fn definition(&self) -> &ValidatorDefinition {
        &self.definition
    }

    /// Scope prefix
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of the constrained field, prefix included
    pub fn full_path(&self) -> String {
        join_path(&self.path, &self.definition.options.field)
    }

    /// Dedup key: full path and type
    pub fn get_key(&self) -> String {
        format!("{}#{}", self.full_path(), self.definition.validator_type)
    }

    /// Values at the full path across the batch, flattened through broadcasts
    pub fn values(&self, batch: &[Record], ctx: &TransactionContext) -> Vec<FieldValue> {
        let path = self.full_path();
        batch
            .iter()
            .flat_map(|record| record.get_with_ctx(&path, Format::Validation, ctx).flatten())
            .collect()
    }

    pub fn validate(&self, batch: &[Record], ctx: &TransactionContext) -> bool {
        self.behavior.validate(self, batch, ctx)
    }
}

//! Model registry
//!
//! Owns the model definitions known to one client/adapter pair and the
//! bound `Model`s derived from them. Inheritance is resolved once, at
//! registration: the ancestor chain is precomputed and merged with the
//! closest definition winning. The registry lives as long as its owner and
//! is emptied by `clear()` when the client is disposed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::types::{FieldDefinition, ModelDefinition, ValidatorDefinition};
use crate::core::error::{CoreError, CoreResult};
use crate::field::{Field, FieldFactory};
use crate::record::Record;
use crate::validator::{Validator, ValidatorFactory};

/// Fields injected into every model when system fields are enabled
pub fn system_fields() -> BTreeMap<String, FieldDefinition> {
    let mut fields = BTreeMap::new();
    fields.insert("_id".to_string(), FieldDefinition::id());
    fields.insert("_createdAt".to_string(), FieldDefinition::date());
    fields.insert("_updatedAt".to_string(), FieldDefinition::date());
    fields.insert("_createdBy".to_string(), FieldDefinition::identity());
    fields.insert("_updatedBy".to_string(), FieldDefinition::identity());
    fields
}

/// A model bound to a field/validator factory, with inheritance resolved
#[derive(Debug)]
pub struct Model {
    slug: String,
    /// Closest parent first
    ancestors: Vec<String>,
    fields: BTreeMap<String, FieldDefinition>,
    validators: Vec<ValidatorDefinition>,
    field_factory: Arc<FieldFactory>,
    validator_factory: Arc<ValidatorFactory>,
    field_cache: RwLock<HashMap<String, Field>>,
}

impl Model {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Ancestor slugs, closest parent first
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Merged field definitions
    pub fn field_definitions(&self) -> &BTreeMap<String, FieldDefinition> {
        &self.fields
    }

    /// Merged model-level validator definitions
    pub fn validator_definitions(&self) -> &[ValidatorDefinition] {
        &self.validators
    }

    /// Root field by name
    pub fn field(&self, name: &str) -> Option<Field> {
        if let Ok(cache) = self.field_cache.read() {
            if let Some(field) = cache.get(name) {
                return Some(field.clone());
            }
        }
        let def = self.fields.get(name)?;
        let field = Field::new(def, name, &self.field_factory);
        if let Ok(mut cache) = self.field_cache.write() {
            cache.insert(name.to_string(), field.clone());
        }
        Some(field)
    }

    /// All root fields
    pub fn fields(&self) -> Vec<Field> {
        self.fields.keys().filter_map(|name| self.field(name)).collect()
    }

    /// Model-level validators
    pub fn validators(&self) -> Vec<Validator> {
        self.validators
            .iter()
            .map(|def| Validator::new(def, "", &self.validator_factory))
            .collect()
    }

    pub fn field_factory(&self) -> &Arc<FieldFactory> {
        &self.field_factory
    }

    pub fn validator_factory(&self) -> &Arc<ValidatorFactory> {
        &self.validator_factory
    }

    /// Hydrate a record of this model
    pub fn record(self: &Arc<Self>, data: Value) -> Record {
        Record::new(Arc::clone(self), data)
    }
}

/// Registry of model definitions and their bound models
#[derive(Debug)]
pub struct ModelRegistry {
    definitions: HashMap<String, ModelDefinition>,
    models: HashMap<String, Arc<Model>>,
    field_factory: Arc<FieldFactory>,
    validator_factory: Arc<ValidatorFactory>,
    system_fields: bool,
}

impl ModelRegistry {
    /// Creates a registry binding models to the given factories
    pub fn new(field_factory: Arc<FieldFactory>, validator_factory: Arc<ValidatorFactory>) -> Self {
        Self {
            definitions: HashMap::new(),
            models: HashMap::new(),
            field_factory,
            validator_factory,
            system_fields: true,
        }
    }

    /// Registry with built-in behaviours only
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(FieldFactory::new()), Arc::new(ValidatorFactory::new()))
    }

    /// Enable or disable system field injection
    pub fn with_system_fields(mut self, enabled: bool) -> Self {
        self.system_fields = enabled;
        self
    }

    /// Registers a definition and returns the bound model.
    ///
    /// The parent (if any) must already be registered; definitions are
    /// immutable once registered.
    pub fn register(&mut self, definition: ModelDefinition) -> CoreResult<Arc<Model>> {
        check_definition(&definition)?;

        if self.definitions.contains_key(&definition.slug) {
            return Err(CoreError::invalid_model(format!(
                "Model '{}' is already registered",
                definition.slug
            )));
        }

        let chain = self.ancestor_chain(&definition)?;

        let mut fields = if self.system_fields {
            system_fields()
        } else {
            BTreeMap::new()
        };
        let mut validators: Vec<ValidatorDefinition> = Vec::new();

        // Outermost ancestor first so that closer definitions overwrite.
        for def in chain.iter().rev().chain(std::iter::once(&definition)) {
            for (name, field) in &def.fields {
                fields.insert(name.clone(), field.clone());
            }
            for validator in &def.validators {
                if !validators.contains(validator) {
                    validators.push(validator.clone());
                }
            }
        }

        let model = Arc::new(Model {
            slug: definition.slug.clone(),
            ancestors: chain.iter().map(|d| d.slug.clone()).collect(),
            fields,
            validators,
            field_factory: Arc::clone(&self.field_factory),
            validator_factory: Arc::clone(&self.validator_factory),
            field_cache: RwLock::new(HashMap::new()),
        });

        tracing::debug!(
            model = %model.slug,
            ancestors = model.ancestors.len(),
            fields = model.fields.len(),
            "model registered"
        );

        self.models.insert(definition.slug.clone(), Arc::clone(&model));
        self.definitions.insert(definition.slug.clone(), definition);
        Ok(model)
    }

    /// Parent definitions, closest first
    fn ancestor_chain(&self, definition: &ModelDefinition) -> CoreResult<Vec<ModelDefinition>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(definition.slug.clone());

        let mut parent = definition.extends.clone();
        while let Some(slug) = parent {
            if !seen.insert(slug.clone()) {
                return Err(CoreError::invalid_model(format!(
                    "Model '{}' has a cyclic inheritance chain through '{}'",
                    definition.slug, slug
                )));
            }
            let def = self.definitions.get(&slug).ok_or_else(|| {
                CoreError::invalid_model(format!(
                    "Model '{}' extends unknown model '{}'",
                    definition.slug, slug
                ))
            })?;
            parent = def.extends.clone();
            chain.push(def.clone());
        }

        Ok(chain)
    }

    /// Loads every `*.json` model definition in a directory.
    ///
    /// Files may appear in any order; parents are registered before children.
    pub fn load_dir(&mut self, dir: &Path) -> CoreResult<usize> {
        let entries = fs::read_dir(dir).map_err(|e| {
            CoreError::invalid_model(format!("Failed to read model directory '{}': {}", dir.display(), e))
        })?;

        let mut pending = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| CoreError::invalid_model(format!("Failed to read directory entry: {}", e)))?
                .path();

            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| {
                CoreError::invalid_model(format!("Failed to read '{}': {}", path.display(), e))
            })?;
            let definition: ModelDefinition = serde_json::from_str(&content).map_err(|e| {
                CoreError::invalid_model(format!("Malformed model file '{}': {}", path.display(), e))
            })?;
            pending.push(definition);
        }

        let mut loaded = 0;
        while !pending.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|def| {
                def.extends
                    .as_ref()
                    .map_or(true, |parent| self.definitions.contains_key(parent))
            });
            if ready.is_empty() {
                let slugs: Vec<_> = blocked.iter().map(|d| d.slug.as_str()).collect();
                return Err(CoreError::invalid_model(format!(
                    "Unresolvable inheritance for models: {}",
                    slugs.join(", ")
                )));
            }
            for def in ready {
                self.register(def)?;
                loaded += 1;
            }
            pending = blocked;
        }

        tracing::info!(dir = %dir.display(), loaded, "model definitions loaded");
        Ok(loaded)
    }

    /// Gets a bound model by slug
    pub fn get(&self, slug: &str) -> Option<Arc<Model>> {
        self.models.get(slug).cloned()
    }

    /// Gets a bound model, failing with `NotFound`
    pub fn require(&self, slug: &str) -> CoreResult<Arc<Model>> {
        self.get(slug)
            .ok_or_else(|| CoreError::not_found(format!("Model '{}' is not registered", slug)))
    }

    /// Checks if a model is registered
    pub fn contains(&self, slug: &str) -> bool {
        self.models.contains_key(slug)
    }

    /// Registered slugs
    pub fn slugs(&self) -> impl Iterator<Item = &String> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Drops every definition and bound model
    pub fn clear(&mut self) {
        self.definitions.clear();
        self.models.clear();
    }
}

fn check_definition(definition: &ModelDefinition) -> CoreResult<()> {
    if definition.slug.is_empty() {
        return Err(CoreError::invalid_model("Model slug must not be empty"));
    }
    for name in definition.fields.keys() {
        if name.is_empty() || name.contains(['.', '[', ']']) {
            return Err(CoreError::invalid_model(format!(
                "Model '{}' declares invalid field name '{}'",
                definition.slug, name
            )));
        }
    }
    Ok(())
}

//! Schema type definitions
//!
//! Supported field types:
//! - id: scalar identifier, coerced to string
//! - number: 64-bit float (integral values kept as integers)
//! - boolean
//! - date: RFC 3339 timestamp
//! - text: string, optionally restricted to a closed option set
//! - relation: reference to a record of another model
//! - nested: keyed object with declared sub-fields and an optional default field
//! - identity: `<type>:<objectid>` reference to an actor
//! - array: homogeneous list described by an item definition

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Id,
    Number,
    Boolean,
    Date,
    Text,
    Relation,
    Nested,
    Identity,
    Array,
}

impl FieldType {
    /// Returns the type name used in messages and dedup keys
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Id => "id",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Text => "text",
            FieldType::Relation => "relation",
            FieldType::Nested => "nested",
            FieldType::Identity => "identity",
            FieldType::Array => "array",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Identity prefixes accepted when a field does not configure its own set
pub const DEFAULT_IDENTITY_TYPES: &[&str] = &["account", "client"];

/// Type-specific field configuration.
///
/// One flat structure covers every type; members irrelevant to a type are
/// ignored. `with_type_defaults` fills in per-type defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptions {
    /// Value injected on reads when the stored value is undefined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Closed option set (text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Text: reject values outside `options`. Nested: drop undeclared keys.
    #[serde(default)]
    pub strict: bool,

    /// Referenced model slug (relation)
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_model: Option<String>,

    /// Declared sub-fields (nested)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldDefinition>,

    /// Definition shared by every undeclared key (nested)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_field: Option<Box<FieldDefinition>>,

    /// Item definition (array)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDefinition>>,

    /// Validators scoped to this nested/array position
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValidatorDefinition>,

    /// Accepted identity prefixes (identity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
}

impl FieldOptions {
    /// Merges the per-type defaults into these options
    pub fn with_type_defaults(mut self, field_type: FieldType) -> Self {
        match field_type {
            FieldType::Identity => {
                if self.types.is_none() {
                    self.types = Some(
                        DEFAULT_IDENTITY_TYPES
                            .iter()
                            .map(|t| t.to_string())
                            .collect(),
                    );
                }
            }
            FieldType::Array => {
                if self.items.is_none() {
                    self.items = Some(Box::new(FieldDefinition::new(FieldType::Text)));
                }
            }
            _ => {}
        }
        self
    }
}

/// Field definition: plain data from which `Field` instances are derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field data type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Type-specific options
    #[serde(default)]
    pub options: FieldOptions,
}

impl FieldDefinition {
    /// Create a definition with empty options
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            options: FieldOptions::default(),
        }
    }

    pub fn id() -> Self {
        Self::new(FieldType::Id)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn identity() -> Self {
        Self::new(FieldType::Identity)
    }

    /// Create a text field restricted to a closed option set
    pub fn text_options(options: &[&str], strict: bool) -> Self {
        let mut def = Self::text();
        def.options.options = Some(options.iter().map(|o| o.to_string()).collect());
        def.options.strict = strict;
        def
    }

    /// Create a relation to another model
    pub fn relation(ref_model: impl Into<String>) -> Self {
        let mut def = Self::new(FieldType::Relation);
        def.options.ref_model = Some(ref_model.into());
        def
    }

    /// Create a nested object with declared sub-fields
    pub fn nested(fields: BTreeMap<String, FieldDefinition>) -> Self {
        let mut def = Self::new(FieldType::Nested);
        def.options.fields = fields;
        def
    }

    /// Create an array of the given item definition
    pub fn array(items: FieldDefinition) -> Self {
        let mut def = Self::new(FieldType::Array);
        def.options.items = Some(Box::new(items));
        def
    }

    /// Set the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.options.default = Some(value);
        self
    }

    /// Set the shared default field (nested)
    pub fn with_default_field(mut self, def: FieldDefinition) -> Self {
        self.options.default_field = Some(Box::new(def));
        self
    }

    /// Mark the field strict
    pub fn strict(mut self) -> Self {
        self.options.strict = true;
        self
    }

    /// Attach a scoped validator (nested/array)
    pub fn with_validator(mut self, validator: ValidatorDefinition) -> Self {
        self.options.validators.push(validator);
        self
    }
}

/// Supported validator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorType {
    Required,
    Unique,
    Regex,
    Length,
    Boundaries,
    KeyField,
    ModelSlug,
    ModelDefinition,
}

impl ValidatorType {
    /// Returns the type name used in dedup keys
    pub fn type_name(&self) -> &'static str {
        match self {
            ValidatorType::Required => "required",
            ValidatorType::Unique => "unique",
            ValidatorType::Regex => "regex",
            ValidatorType::Length => "length",
            ValidatorType::Boundaries => "boundaries",
            ValidatorType::KeyField => "key_field",
            ValidatorType::ModelSlug => "model_slug",
            ValidatorType::ModelDefinition => "model_definition",
        }
    }
}

impl fmt::Display for ValidatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Validator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorOptions {
    /// Name of the constrained field, relative to the validator's scope
    #[serde(default)]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Regex flags (`i`, `m`, `s`, `x`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
}

/// Validator definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorDefinition {
    #[serde(rename = "type")]
    pub validator_type: ValidatorType,
    #[serde(default)]
    pub options: ValidatorOptions,
}

impl ValidatorDefinition {
    /// Create a validator constraining `field`
    pub fn new(validator_type: ValidatorType, field: impl Into<String>) -> Self {
        Self {
            validator_type,
            options: ValidatorOptions {
                field: field.into(),
                ..Default::default()
            },
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(ValidatorType::Required, field)
    }

    pub fn unique(field: impl Into<String>) -> Self {
        Self::new(ValidatorType::Unique, field)
    }

    pub fn key_field(field: impl Into<String>) -> Self {
        Self::new(ValidatorType::KeyField, field)
    }

    /// Create a regex validator
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>, flags: Option<&str>) -> Self {
        let mut def = Self::new(ValidatorType::Regex, field);
        def.options.pattern = Some(pattern.into());
        def.options.flags = flags.map(|f| f.to_string());
        def
    }

    /// Create a length validator
    pub fn length(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        let mut def = Self::new(ValidatorType::Length, field);
        def.options.min = min;
        def.options.max = max;
        def
    }

    /// Create a boundaries validator
    pub fn boundaries(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        let mut def = Self::new(ValidatorType::Boundaries, field);
        def.options.min = min;
        def.options.max = max;
        def
    }
}

/// Complete model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Unique model identifier
    pub slug: String,
    /// Parent model whose fields, validators and hooks are inherited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Field definitions
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
    /// Model-level validators
    #[serde(default)]
    pub validators: Vec<ValidatorDefinition>,
}

impl ModelDefinition {
    /// Create a new model definition
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            extends: None,
            fields: BTreeMap::new(),
            validators: Vec::new(),
        }
    }

    /// Add a field
    pub fn field(mut self, name: impl Into<String>, def: FieldDefinition) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    /// Add a model-level validator
    pub fn validator(mut self, def: ValidatorDefinition) -> Self {
        self.validators.push(def);
        self
    }

    /// Inherit from another model
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_definition_from_json() {
        let def: FieldDefinition = serde_json::from_value(json!({
            "type": "nested",
            "options": {
                "fields": { "title": { "type": "text" } },
                "defaultField": { "type": "number" },
                "strict": true
            }
        }))
        .unwrap();

        assert_eq!(def.field_type, FieldType::Nested);
        assert!(def.options.strict);
        assert_eq!(def.options.fields["title"].field_type, FieldType::Text);
        assert_eq!(
            def.options.default_field.as_ref().map(|d| d.field_type),
            Some(FieldType::Number)
        );
    }

    #[test]
    fn test_relation_ref_is_renamed() {
        let def = FieldDefinition::relation("accounts");
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["options"]["ref"], "accounts");
    }

    #[test]
    fn test_type_defaults() {
        let identity = FieldOptions::default().with_type_defaults(FieldType::Identity);
        assert_eq!(identity.types.unwrap(), vec!["account", "client"]);

        let array = FieldOptions::default().with_type_defaults(FieldType::Array);
        assert_eq!(array.items.unwrap().field_type, FieldType::Text);
    }

    #[test]
    fn test_validator_definition_from_json() {
        let def: ValidatorDefinition = serde_json::from_value(json!({
            "type": "key_field",
            "options": { "field": "slug" }
        }))
        .unwrap();
        assert_eq!(def.validator_type, ValidatorType::KeyField);
        assert_eq!(def.options.field, "slug");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldType::Nested.type_name(), "nested");
        assert_eq!(ValidatorType::KeyField.type_name(), "key_field");
    }
}

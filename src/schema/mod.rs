//! Schema subsystem
//!
//! Plain-data model definitions (fields, validators, inheritance) and the
//! registry that binds them to a field/validator factory.

mod registry;
mod types;

pub use registry::{system_fields, Model, ModelRegistry};
pub use types::{
    FieldDefinition, FieldOptions, FieldType, ModelDefinition, ValidatorDefinition,
    ValidatorOptions, ValidatorType, DEFAULT_IDENTITY_TYPES,
};

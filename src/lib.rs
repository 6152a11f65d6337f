//! aeromodel - schema-driven document modeling
//!
//! Typed fields and cross-field validators on logical record types, path
//! resolution through nested objects and arrays, per-format serialization,
//! batch validation, and a hook pipeline around every adapter action.

pub mod core;
pub mod field;
pub mod observability;
pub mod path;
pub mod record;
pub mod schema;
pub mod validation;
pub mod validator;

pub use crate::core::{
    Action, Adapter, Client, CoreError, CoreResult, EngineConfig, ErrorCode, HookOutcome, HookPayload,
    MemoryAdapter, ModelHandle, Operation, OperationOutput, Query, TransactionContext,
};
pub use field::{FieldValue, Format};
pub use record::Record;
pub use schema::{FieldDefinition, ModelDefinition, ModelRegistry, ValidatorDefinition};
pub use validation::{validate_model, ValidationError};

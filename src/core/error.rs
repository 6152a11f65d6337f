//! Core Error Types
//!
//! Every error surfaced by the engine carries a code from the closed
//! `ErrorCode` enum. Validation failures are wrapped as a dedicated variant
//! so callers can walk the field/validator failure tree.

use std::fmt;

use thiserror::Error;

use crate::validation::ValidationError;

/// Core module result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Closed set of error codes surfaced on thrown errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Adapter missing, disposed or misconfigured
    InvalidAdapter,
    /// Model definition unknown to the adapter or malformed
    InvalidModel,
    /// Field or validator failures
    ValidationFailed,
    /// Bad arguments supplied to an action
    InvalidParams,
    /// A hook aborted the action
    ExecutionAborted,
    /// Requested resource does not exist
    NotFound,
    /// Operation not supported in this context
    InvalidOperation,
    /// Path cannot be resolved against the schema
    InvalidPath,
    /// Unexpected internal failure
    Internal,
}

impl ErrorCode {
    /// Returns the stable string code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAdapter => "INVALID_ADAPTER",
            ErrorCode::InvalidModel => "INVALID_MODEL",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::ExecutionAborted => "EXECUTION_ABORTED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Core error type
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Generic error carrying a code and a message
    #[error("[{code}] {message}")]
    Generic { code: ErrorCode, message: String },

    /// Aggregated field and validator failures
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Generic {
            code,
            message: message.into(),
        }
    }

    /// Create an invalid adapter error
    pub fn invalid_adapter(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAdapter, msg)
    }

    /// Create an invalid model error
    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidModel, msg)
    }

    /// Create an invalid params error
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, msg)
    }

    /// Create an execution aborted error
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionAborted, reason)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, resource)
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOperation, msg)
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidPath,
            format!("Path '{}' cannot be resolved", path.into()),
        )
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Generic { code, .. } => *code,
            Self::Validation(_) => ErrorCode::ValidationFailed,
        }
    }

    /// Get the human-readable message without the code prefix
    pub fn message(&self) -> String {
        match self {
            Self::Generic { message, .. } => message.clone(),
            Self::Validation(err) => err.message(),
        }
    }

    /// Returns the validation failure tree, if any
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Generic { .. } => None,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::invalid_params(e.to_string())
    }
}

impl From<regex::Error> for CoreError {
    fn from(e: regex::Error) -> Self {
        Self::invalid_params(format!("Invalid pattern: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::ValidationFailed.as_str(), "VALIDATION_FAILED");
        assert_eq!(ErrorCode::ExecutionAborted.as_str(), "EXECUTION_ABORTED");
        assert_eq!(ErrorCode::InvalidAdapter.as_str(), "INVALID_ADAPTER");
    }

    #[test]
    fn test_generic_display_includes_code() {
        let err = CoreError::not_found("Record 42");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "[NOT_FOUND] Record 42");
        assert_eq!(err.message(), "Record 42");
    }

    #[test]
    fn test_json_error_maps_to_invalid_params() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = parse.into();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
    }

    #[test]
    fn test_validation_variant_code() {
        let err: CoreError = ValidationError::default().into();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(err.as_validation().is_some());
    }
}

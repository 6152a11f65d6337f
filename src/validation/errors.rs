//! Validation errors
//!
//! Leaf failure records are never surfaced on their own; one validation
//! pass produces at most one `ValidationError` aggregating all of them.

use serde_json::Value;
use thiserror::Error;

use crate::schema::ValidatorDefinition;

/// A field whose own check failed
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Last path segment of the failing field
    pub slug: String,
    /// Full dotted path of the failing field
    pub field: String,
    /// Failures found while descending into a nested/array field
    pub validation_error: Option<Box<ValidationError>>,
}

impl FieldError {
    pub fn new(slug: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            field: field.into(),
            validation_error: None,
        }
    }

    pub fn with_child(mut self, child: ValidationError) -> Self {
        self.validation_error = Some(Box::new(child));
        self
    }
}

/// A validator instance that failed for the batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorError {
    pub validator: ValidatorDefinition,
    /// Full path the validator was evaluated at
    pub path: String,
    pub value: Option<Value>,
}

impl ValidatorError {
    pub fn new(validator: ValidatorDefinition, path: impl Into<String>) -> Self {
        Self {
            validator,
            path: path.into(),
            value: None,
        }
    }
}

/// Aggregate of field and validator failures
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", self.message())]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
    pub validators: Vec<ValidatorError>,
}

impl ValidationError {
    pub fn new(fields: Vec<FieldError>, validators: Vec<ValidatorError>) -> Self {
        Self { fields, validators }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.validators.is_empty()
    }

    /// Failing dotted paths, recursing into nested errors
    pub fn field_paths(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|err| match &err.validation_error {
                Some(child) if !child.fields.is_empty() => child.field_paths(),
                _ => vec![err.field.clone()],
            })
            .collect()
    }

    /// Human-readable summary
    pub fn message(&self) -> String {
        let paths = self.field_paths();
        let mut parts = Vec::new();
        if !paths.is_empty() {
            parts.push(format!("invalid fields: {}", paths.join(", ")));
        }
        if !self.validators.is_empty() {
            parts.push(format!("{} validator(s) failed", self.validators.len()));
        }
        if parts.is_empty() {
            "Validation failed".to_string()
        } else {
            format!("Validation failed ({})", parts.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_paths_recurse_into_children() {
        let child = ValidationError::new(vec![FieldError::new("title", "items.[0].title")], vec![]);
        let err = ValidationError::new(
            vec![
                FieldError::new("items", "items").with_child(child),
                FieldError::new("score", "score"),
            ],
            vec![],
        );
        assert_eq!(err.field_paths(), vec!["items.[0].title", "score"]);
    }

    #[test]
    fn test_message_mentions_paths_and_validators() {
        let err = ValidationError::new(
            vec![FieldError::new("score", "score")],
            vec![ValidatorError::new(ValidatorDefinition::required("title"), "title")],
        );
        let message = err.to_string();
        assert!(message.contains("score"));
        assert!(message.contains("1 validator(s) failed"));
    }

    #[test]
    fn test_empty_aggregate() {
        let err = ValidationError::default();
        assert!(err.is_empty());
        assert_eq!(err.message(), "Validation failed");
    }
}

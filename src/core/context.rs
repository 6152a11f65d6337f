//! Transaction Context
//!
//! Context threaded through hooks, adapter actions and field
//! serialization/validation for one action invocation.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use super::operation::Action;

/// Context carried through the execution pipeline
#[derive(Debug, Clone)]
pub struct TransactionContext {
    /// Transaction ID for tracing
    pub id: Uuid,

    /// Pending action, set by the pipeline
    pub action: Option<Action>,

    /// Slug of the model the action targets
    pub model: Option<String>,

    /// 1-based attempt number; grows with every retry
    pub attempt: u32,

    /// Free-form data shared between hooks
    pub metadata: HashMap<String, Value>,

    /// Start time for duration tracking
    started_at: Instant,
}

impl TransactionContext {
    /// Create a new context
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            action: None,
            model: None,
            attempt: 1,
            metadata: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Describe the pending action
    pub fn for_action(mut self, model: impl Into<String>, action: Action) -> Self {
        self.model = Some(model.into());
        self.action = Some(action);
        self
    }

    /// Add metadata shared with hooks
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Human-readable description of the pending action
    pub fn describe(&self) -> String {
        match (&self.model, &self.action) {
            (Some(model), Some(action)) => format!("{}.{}", model, action),
            (None, Some(action)) => action.to_string(),
            _ => "<idle>".to_string(),
        }
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let ctx = TransactionContext::new();
        assert_eq!(ctx.attempt, 1);
        assert!(ctx.action.is_none());
        assert_eq!(ctx.describe(), "<idle>");
    }

    #[test]
    fn test_for_action() {
        let ctx = TransactionContext::new()
            .for_action("posts", Action::CreateOne)
            .with_metadata("source", Value::String("import".into()));
        assert_eq!(ctx.describe(), "posts.createOne");
        assert_eq!(ctx.metadata["source"], "import");
    }
}

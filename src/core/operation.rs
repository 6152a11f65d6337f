//! Unified Operation Model
//!
//! Every action routed through the hook pipeline is described by an
//! `Operation`; its result by an `OperationOutput`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named actions of the adapter action map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Count,
    Get,
    GetList,
    CreateOne,
    CreateMultiple,
    UpdateOne,
    UpdateMultiple,
    DeleteOne,
    DeleteMultiple,
    Initialize,
}

impl Action {
    /// Get action name for logging and hook matching
    pub fn name(&self) -> &'static str {
        match self {
            Action::Count => "count",
            Action::Get => "get",
            Action::GetList => "getList",
            Action::CreateOne => "createOne",
            Action::CreateMultiple => "createMultiple",
            Action::UpdateOne => "updateOne",
            Action::UpdateMultiple => "updateMultiple",
            Action::DeleteOne => "deleteOne",
            Action::DeleteMultiple => "deleteMultiple",
            Action::Initialize => "initialize",
        }
    }

    /// Whether this action writes documents that must be validated
    pub fn is_validated_write(&self) -> bool {
        matches!(
            self,
            Action::CreateOne | Action::CreateMultiple | Action::UpdateOne | Action::UpdateMultiple
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Query shape accepted by read, update and delete actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// `{ path: 1 | -1 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    /// Also compute the total count for list reads
    #[serde(default)]
    pub count: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<Value>,
}

impl Query {
    /// Query matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Query matching one identifier
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            ids: Some(vec![id.into()]),
            ..Self::default()
        }
    }

    /// Query matching a list of identifiers
    pub fn by_ids(ids: Vec<String>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    /// Query matching a filter document
    pub fn filter(filter: Value) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Effective `(skip, limit)` after resolving page/pageSize
    pub fn window(&self) -> (usize, Option<usize>) {
        if let Some(page_size) = self.page_size {
            let page = self.page.unwrap_or(1).max(1);
            return ((page - 1) * page_size, Some(page_size));
        }
        (self.skip.unwrap_or(0), self.limit)
    }
}

/// Arguments of one action invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Count(Query),
    Get(Query),
    GetList(Query),
    CreateOne(Value),
    CreateMultiple(Vec<Value>),
    UpdateOne { query: Query, update: Value },
    UpdateMultiple { query: Query, update: Value },
    DeleteOne(Query),
    DeleteMultiple(Query),
    Initialize,
}

impl Operation {
    /// Get the action this operation invokes
    pub fn action(&self) -> Action {
        match self {
            Self::Count(_) => Action::Count,
            Self::Get(_) => Action::Get,
            Self::GetList(_) => Action::GetList,
            Self::CreateOne(_) => Action::CreateOne,
            Self::CreateMultiple(_) => Action::CreateMultiple,
            Self::UpdateOne { .. } => Action::UpdateOne,
            Self::UpdateMultiple { .. } => Action::UpdateMultiple,
            Self::DeleteOne(_) => Action::DeleteOne,
            Self::DeleteMultiple(_) => Action::DeleteMultiple,
            Self::Initialize => Action::Initialize,
        }
    }
}

/// Result of one action invocation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Count(u64),
    Record(Option<Value>),
    List(Vec<Value>),
    Deleted(bool),
    DeletedIds(Vec<String>),
    Unit,
}

impl OperationOutput {
    /// Documents carried by this output
    pub fn documents(&self) -> Vec<&Value> {
        match self {
            Self::Record(Some(doc)) => vec![doc],
            Self::List(docs) => docs.iter().collect(),
            _ => Vec::new(),
        }
    }
}

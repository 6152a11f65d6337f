//! Client
//!
//! Binds one adapter to a model registry, a hook registry and the execution
//! pipeline. The registry belongs to the client: models registered here are
//! bound to the adapter's field/validator overrides, and `dispose()` clears
//! them.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::adapter::Adapter;
use super::config::EngineConfig;
use super::context::TransactionContext;
use super::error::{CoreError, CoreResult};
use super::operation::{Operation, OperationOutput, Query};
use super::pipeline::{HookRegistry, Pipeline};
use crate::field::{FieldFactory, RecordListRef, RecordRef};
use crate::record::Record;
use crate::schema::{Model, ModelDefinition, ModelRegistry};
use crate::validation::validate_model;
use crate::validator::ValidatorFactory;

/// Entry point binding an adapter to its models
pub struct Client {
    registry: RwLock<ModelRegistry>,
    hooks: Arc<HookRegistry>,
    pipeline: Pipeline,
    config: EngineConfig,
    disposed: AtomicBool,
}

impl Client {
    /// Create a client with the default configuration
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self::with_config(Arc::new(adapter), EngineConfig::default())
    }

    /// Create a client with an explicit configuration
    pub fn with_config(adapter: Arc<dyn Adapter>, config: EngineConfig) -> Self {
        let field_factory = Arc::new(FieldFactory::with_overrides(adapter.field_overrides()));
        let validator_factory = Arc::new(ValidatorFactory::with_overrides(adapter.validator_overrides()));
        let registry = ModelRegistry::new(field_factory, validator_factory).with_system_fields(config.system_fields);
        let hooks = Arc::new(HookRegistry::new());

        Self {
            registry: RwLock::new(registry),
            pipeline: Pipeline::new(Arc::clone(&hooks), adapter, config.clone()),
            hooks,
            config,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hook registry shared by every action of this client
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CoreError::invalid_adapter("Client has been disposed"));
        }
        Ok(())
    }

    fn lock_error() -> CoreError {
        CoreError::internal("model registry lock poisoned")
    }

    /// Registers a model definition
    pub fn register(&self, definition: ModelDefinition) -> CoreResult<Arc<Model>> {
        self.ensure_live()?;
        self.registry
            .write()
            .map_err(|_| Self::lock_error())?
            .register(definition)
    }

    /// Registers every model definition found in a directory
    pub fn load_dir(&self, dir: &Path) -> CoreResult<usize> {
        self.ensure_live()?;
        self.registry.write().map_err(|_| Self::lock_error())?.load_dir(dir)
    }

    /// Handle on a registered model
    pub fn model(&self, slug: &str) -> CoreResult<ModelHandle<'_>> {
        self.ensure_live()?;
        let model = self.registry.read().map_err(|_| Self::lock_error())?.require(slug)?;
        Ok(ModelHandle { client: self, model })
    }

    /// Runs an operation on a model through the pipeline
    pub async fn execute(&self, slug: &str, operation: Operation) -> CoreResult<OperationOutput> {
        let handle = self.model(slug)?;
        handle.execute(operation).await
    }

    /// Fetches the record behind a lazy relation handle
    pub async fn resolve(&self, reference: &RecordRef) -> CoreResult<Option<Record>> {
        self.model(&reference.model)?.get(reference.query()).await
    }

    /// Fetches the records behind a lazy relation-list handle
    pub async fn resolve_list(&self, reference: &RecordListRef) -> CoreResult<Vec<Record>> {
        if reference.is_empty() {
            return Ok(Vec::new());
        }
        self.model(&reference.model)?.get_list(reference.query()).await
    }

    /// Drops every registered model and hook; later calls fail with `InvalidAdapter`
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        if let Ok(mut registry) = self.registry.write() {
            registry.clear();
        }
        self.hooks.clear();
        tracing::debug!("client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// CRUD surface of one model
#[derive(Clone)]
pub struct ModelHandle<'c> {
    client: &'c Client,
    model: Arc<Model>,
}

impl<'c> ModelHandle<'c> {
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn slug(&self) -> &str {
        self.model.slug()
    }

    /// Binds raw data to this model without touching the adapter
    pub fn hydrate(&self, data: Value) -> Record {
        self.model.record(data)
    }

    /// Validates raw documents without writing them
    pub fn validate(&self, documents: &[Value]) -> CoreResult<()> {
        let batch: Vec<Record> = documents.iter().map(|doc| self.hydrate(doc.clone())).collect();
        validate_model(&self.model, &batch, &TransactionContext::new())
    }

    pub async fn execute(&self, operation: Operation) -> CoreResult<OperationOutput> {
        self.execute_with(operation, TransactionContext::new()).await
    }

    /// Runs an operation with a caller-supplied context
    pub async fn execute_with(&self, operation: Operation, ctx: TransactionContext) -> CoreResult<OperationOutput> {
        self.client.ensure_live()?;
        self.client.pipeline.execute(&self.model, operation, ctx).await
    }

    fn unexpected(&self, output: OperationOutput) -> CoreError {
        CoreError::internal(format!("Unexpected output for {}: {:?}", self.model.slug(), output))
    }

    fn records(&self, documents: Vec<Value>) -> Vec<Record> {
        documents.into_iter().map(|doc| self.hydrate(doc)).collect()
    }

    pub async fn count(&self, query: Query) -> CoreResult<u64> {
        match self.execute(Operation::Count(query)).await? {
            OperationOutput::Count(n) => Ok(n),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn get(&self, query: Query) -> CoreResult<Option<Record>> {
        match self.execute(Operation::Get(query)).await? {
            OperationOutput::Record(doc) => Ok(doc.map(|doc| self.hydrate(doc))),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn get_list(&self, query: Query) -> CoreResult<Vec<Record>> {
        match self.execute(Operation::GetList(query)).await? {
            OperationOutput::List(docs) => Ok(self.records(docs)),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn create(&self, document: Value) -> CoreResult<Record> {
        match self.execute(Operation::CreateOne(document)).await? {
            OperationOutput::Record(Some(doc)) => Ok(self.hydrate(doc)),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn create_multiple(&self, documents: Vec<Value>) -> CoreResult<Vec<Record>> {
        match self.execute(Operation::CreateMultiple(documents)).await? {
            OperationOutput::List(docs) => Ok(self.records(docs)),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn update(&self, query: Query, update: Value) -> CoreResult<Option<Record>> {
        match self.execute(Operation::UpdateOne { query, update }).await? {
            OperationOutput::Record(doc) => Ok(doc.map(|doc| self.hydrate(doc))),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn update_multiple(&self, query: Query, update: Value) -> CoreResult<Vec<Record>> {
        match self.execute(Operation::UpdateMultiple { query, update }).await? {
            OperationOutput::List(docs) => Ok(self.records(docs)),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn delete(&self, query: Query) -> CoreResult<bool> {
        match self.execute(Operation::DeleteOne(query)).await? {
            OperationOutput::Deleted(deleted) => Ok(deleted),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn delete_multiple(&self, query: Query) -> CoreResult<Vec<String>> {
        match self.execute(Operation::DeleteMultiple(query)).await? {
            OperationOutput::DeletedIds(ids) => Ok(ids),
            other => Err(self.unexpected(other)),
        }
    }

    pub async fn initialize(&self) -> CoreResult<()> {
        self.execute(Operation::Initialize).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapter::MemoryAdapter;
    use crate::core::error::ErrorCode;
    use crate::schema::{FieldDefinition, ValidatorDefinition};
    use serde_json::json;

    fn client() -> Client {
        let client = Client::new(MemoryAdapter::new());
        client
            .register(
                ModelDefinition::new("posts")
                    .field("title", FieldDefinition::text())
                    .field("author", FieldDefinition::relation("accounts"))
                    .validator(ValidatorDefinition::required("title")),
            )
            .unwrap();
        client
            .register(ModelDefinition::new("accounts").field("name", FieldDefinition::text()))
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_create_validates() {
        let client = client();
        let posts = client.model("posts").unwrap();

        let err = posts.create(json!({})).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert_eq!(posts.count(Query::all()).await.unwrap(), 0);

        let created = posts.create(json!({"title": "hello"})).await.unwrap();
        assert!(created.id().is_some());
        assert_eq!(posts.count(Query::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_is_validated_against_result() {
        let client = client();
        let posts = client.model("posts").unwrap();
        let created = posts.create(json!({"title": "hello"})).await.unwrap();
        let query = Query::by_id(created.id().unwrap());

        let err = posts
            .update(query.clone(), json!({"$unset": {"title": ""}}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);

        let updated = posts.update(query, json!({"$set": {"title": "bye"}})).await.unwrap().unwrap();
        assert_eq!(updated.get_json("title"), json!("bye"));
    }

    #[tokio::test]
    async fn test_resolve_relation() {
        let client = client();
        let author = client.model("accounts").unwrap().create(json!({"name": "ana"})).await.unwrap();
        let post = client
            .model("posts")
            .unwrap()
            .create(json!({"title": "t", "author": author.id().unwrap()}))
            .await
            .unwrap();

        let reference = match post.get("author", crate::field::Format::Object) {
            crate::field::FieldValue::Record(reference) => reference,
            other => panic!("expected a record handle, got {:?}", other),
        };
        let resolved = client.resolve(&reference).await.unwrap().unwrap();
        assert_eq!(resolved.get_json("name"), json!("ana"));
    }

    #[tokio::test]
    async fn test_dispose() {
        let client = client();
        client.dispose();
        assert!(client.is_disposed());
        assert_eq!(client.model("posts").err().map(|e| e.code()), Some(ErrorCode::InvalidAdapter));
        assert_eq!(
            client.register(ModelDefinition::new("x")).unwrap_err().code(),
            ErrorCode::InvalidAdapter
        );
    }

    #[test]
    fn test_unknown_model() {
        let client = client();
        assert_eq!(client.model("missing").err().map(|e| e.code()), Some(ErrorCode::NotFound));
    }
}

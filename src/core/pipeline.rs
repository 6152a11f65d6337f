//! Hook-mediated execution pipeline
//!
//! Every action runs as: before-hooks → adapter action → after-hooks.
//! Hooks run sequentially in ascending `order` (ties in registration order)
//! and answer with a `HookOutcome`:
//!
//! - `Continue`: nothing to report
//! - `Fail(err)`: record an error; later hooks still run, the action is skipped
//! - `Retry`: re-run the whole invocation from scratch
//! - `Abort(reason)`: stop immediately with `ExecutionAborted`
//!
//! Errors raised by the adapter are recorded the same way as hook failures.
//! The first recorded error is surfaced once the after-phase is done.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::adapter::Adapter;
use super::config::EngineConfig;
use super::context::TransactionContext;
use super::error::{CoreError, CoreResult};
use super::operation::{Action, Operation, OperationOutput};
use super::update::{apply_update, normalize_update};
use crate::record::Record;
use crate::schema::Model;
use crate::validation::validate_model;

/// Phase a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Before,
    After,
}

/// What a hook asks the pipeline to do next
#[derive(Debug, Clone)]
pub enum HookOutcome {
    Continue,
    Fail(CoreError),
    Retry,
    Abort(String),
}

/// State visible to hooks during one attempt
#[derive(Debug, Clone)]
pub struct HookPayload {
    pub model: Arc<Model>,
    /// Arguments of the action; before-hooks may rewrite them
    pub operation: Operation,
    /// Result of the action, set before the after-phase when it succeeded
    pub output: Option<OperationOutput>,
    /// Errors recorded so far in this attempt
    pub errors: Vec<CoreError>,
    pub phase: HookPhase,
    pub ctx: TransactionContext,
}

impl HookPayload {
    fn new(model: Arc<Model>, operation: Operation, ctx: TransactionContext) -> Self {
        Self {
            model,
            operation,
            output: None,
            errors: Vec::new(),
            phase: HookPhase::Before,
            ctx,
        }
    }

    pub fn action(&self) -> Action {
        self.operation.action()
    }
}

/// Future returned by a hook
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = HookOutcome> + Send + 'a>>;

/// A before/after callback
pub trait Hook: Send + Sync {
    fn call<'a>(&'a self, payload: &'a mut HookPayload) -> HookFuture<'a>;
}

/// Hook backed by a synchronous closure
pub struct FnHook<F>(pub F);

impl<F> Hook for FnHook<F>
where
    F: Fn(&mut HookPayload) -> HookOutcome + Send + Sync,
{
    fn call<'a>(&'a self, payload: &'a mut HookPayload) -> HookFuture<'a> {
        let outcome = (self.0)(payload);
        Box::pin(async move { outcome })
    }
}

struct HookEntry {
    /// `None` matches every model
    model: Option<String>,
    action: Action,
    phase: HookPhase,
    order: i32,
    seq: u64,
    hook: Arc<dyn Hook>,
}

/// Registered hooks, shared by every action of a client
#[derive(Default)]
pub struct HookRegistry {
    entries: RwLock<Vec<HookEntry>>,
    next_seq: AtomicU64,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry").field("hooks", &self.len()).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook. `model = None` attaches it to every model; a hook on
    /// a model also applies to the models extending it.
    pub fn register(
        &self,
        model: Option<&str>,
        action: Action,
        phase: HookPhase,
        order: i32,
        hook: Arc<dyn Hook>,
    ) -> CoreResult<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoreError::internal("hook registry lock poisoned"))?;
        entries.push(HookEntry {
            model: model.map(str::to_string),
            action,
            phase,
            order,
            seq,
            hook,
        });
        Ok(())
    }

    /// Registers a synchronous before-hook
    pub fn before<F>(&self, model: Option<&str>, action: Action, order: i32, f: F) -> CoreResult<()>
    where
        F: Fn(&mut HookPayload) -> HookOutcome + Send + Sync + 'static,
    {
        self.register(model, action, HookPhase::Before, order, Arc::new(FnHook(f)))
    }

    /// Registers a synchronous after-hook
    pub fn after<F>(&self, model: Option<&str>, action: Action, order: i32, f: F) -> CoreResult<()>
    where
        F: Fn(&mut HookPayload) -> HookOutcome + Send + Sync + 'static,
    {
        self.register(model, action, HookPhase::After, order, Arc::new(FnHook(f)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Hooks for one phase, ordered. Taken once per phase, so hooks
    /// registered while the phase runs only take effect from the next phase.
    fn snapshot(&self, model: &Model, action: Action, phase: HookPhase) -> CoreResult<Vec<Arc<dyn Hook>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CoreError::internal("hook registry lock poisoned"))?;
        let mut matching: Vec<&HookEntry> = entries
            .iter()
            .filter(|e| e.action == action && e.phase == phase)
            .filter(|e| match &e.model {
                None => true,
                Some(slug) => slug == model.slug() || model.ancestors().contains(slug),
            })
            .collect();
        matching.sort_by_key(|e| (e.order, e.seq));
        Ok(matching.into_iter().map(|e| Arc::clone(&e.hook)).collect())
    }
}

/// Runs actions through hooks and the adapter
pub struct Pipeline {
    hooks: Arc<HookRegistry>,
    adapter: Arc<dyn Adapter>,
    config: EngineConfig,
}

impl Pipeline {
    pub fn new(hooks: Arc<HookRegistry>, adapter: Arc<dyn Adapter>, config: EngineConfig) -> Self {
        Self {
            hooks,
            adapter,
            config,
        }
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Executes one action invocation, retrying as hooks request
    pub async fn execute(
        &self,
        model: &Arc<Model>,
        operation: Operation,
        ctx: TransactionContext,
    ) -> CoreResult<OperationOutput> {
        let action = operation.action();
        let base = ctx.for_action(model.slug(), action);
        let mut attempt = 1;

        loop {
            let mut attempt_ctx = base.clone();
            attempt_ctx.attempt = attempt;
            let mut payload = HookPayload::new(Arc::clone(model), operation.clone(), attempt_ctx);

            tracing::debug!(tx = %payload.ctx.id, action = %payload.ctx.describe(), attempt, "action started");

            let mut retry = self.run_phase(&mut payload, HookPhase::Before).await?;

            if !retry && payload.errors.is_empty() {
                match self.invoke(model, &payload.operation, &payload.ctx).await {
                    Ok(output) => payload.output = Some(output),
                    Err(err) => payload.errors.push(err),
                }
            }

            if !retry {
                retry = self.run_phase(&mut payload, HookPhase::After).await?;
            }

            if retry {
                if let Some(max) = self.config.max_retries {
                    if attempt > max {
                        tracing::warn!(action = %payload.ctx.describe(), attempt, "retry limit reached");
                        return Err(CoreError::aborted(format!(
                            "{} exceeded the retry limit of {}",
                            payload.ctx.describe(),
                            max
                        )));
                    }
                }
                tracing::debug!(action = %payload.ctx.describe(), attempt, "retrying action");
                attempt += 1;
                continue;
            }

            if let Some(err) = payload.errors.into_iter().next() {
                tracing::debug!(action = %base.describe(), code = %err.code(), "action failed");
                return Err(err);
            }

            return Ok(payload.output.unwrap_or(OperationOutput::Unit));
        }
    }

    /// Runs one phase; returns whether a retry was requested
    async fn run_phase(&self, payload: &mut HookPayload, phase: HookPhase) -> CoreResult<bool> {
        payload.phase = phase;
        let hooks = self.hooks.snapshot(&payload.model, payload.action(), phase)?;
        let mut retry = false;

        for hook in hooks {
            match hook.call(payload).await {
                HookOutcome::Continue => {}
                HookOutcome::Fail(err) => payload.errors.push(err),
                HookOutcome::Retry => retry = true,
                HookOutcome::Abort(reason) => {
                    tracing::warn!(action = %payload.ctx.describe(), ?phase, reason = %reason, "action aborted");
                    return Err(CoreError::aborted(reason));
                }
            }
        }

        Ok(retry)
    }

    async fn invoke(
        &self,
        model: &Arc<Model>,
        operation: &Operation,
        ctx: &TransactionContext,
    ) -> CoreResult<OperationOutput> {
        let adapter = self.adapter.as_ref();
        match operation {
            Operation::Count(query) => Ok(OperationOutput::Count(adapter.count(model, query, ctx).await?)),
            Operation::Get(query) => Ok(OperationOutput::Record(adapter.get(model, query, ctx).await?)),
            Operation::GetList(query) => Ok(OperationOutput::List(adapter.get_list(model, query, ctx).await?)),
            Operation::CreateOne(document) => {
                let mut prepared = self.prepare_create(model, std::slice::from_ref(document), ctx)?;
                let document = prepared
                    .pop()
                    .ok_or_else(|| CoreError::internal("create produced no document"))?;
                Ok(OperationOutput::Record(Some(adapter.create_one(model, document, ctx).await?)))
            }
            Operation::CreateMultiple(documents) => {
                let prepared = self.prepare_create(model, documents, ctx)?;
                Ok(OperationOutput::List(adapter.create_multiple(model, prepared, ctx).await?))
            }
            Operation::UpdateOne { query, update } => {
                let update = normalize_update(model, update, ctx);
                if self.config.validate_writes {
                    let targets: Vec<_> = adapter.get(model, query, ctx).await?.into_iter().collect();
                    self.check_update(model, targets, &update, ctx)?;
                }
                Ok(OperationOutput::Record(adapter.update_one(model, query, &update, ctx).await?))
            }
            Operation::UpdateMultiple { query, update } => {
                let update = normalize_update(model, update, ctx);
                if self.config.validate_writes {
                    let targets = adapter.get_list(model, query, ctx).await?;
                    self.check_update(model, targets, &update, ctx)?;
                }
                Ok(OperationOutput::List(adapter.update_multiple(model, query, &update, ctx).await?))
            }
            Operation::DeleteOne(query) => Ok(OperationOutput::Deleted(adapter.delete_one(model, query, ctx).await?)),
            Operation::DeleteMultiple(query) => {
                Ok(OperationOutput::DeletedIds(adapter.delete_multiple(model, query, ctx).await?))
            }
            Operation::Initialize => {
                adapter.initialize(model, ctx).await?;
                Ok(OperationOutput::Unit)
            }
        }
    }

    /// Validates new documents and converts them to document form
    fn prepare_create(
        &self,
        model: &Arc<Model>,
        documents: &[serde_json::Value],
        ctx: &TransactionContext,
    ) -> CoreResult<Vec<serde_json::Value>> {
        let records: Vec<Record> = documents.iter().map(|doc| model.record(doc.clone())).collect();
        if self.config.validate_writes {
            validate_model(model, &records, ctx)?;
        }
        Ok(records.iter().map(Record::to_document).collect())
    }

    /// Validates the documents an update would produce
    fn check_update(
        &self,
        model: &Arc<Model>,
        targets: Vec<serde_json::Value>,
        update: &serde_json::Value,
        ctx: &TransactionContext,
    ) -> CoreResult<()> {
        let mut records = Vec::with_capacity(targets.len());
        for mut target in targets {
            apply_update(&mut target, update, false)?;
            records.push(model.record(target));
        }
        if records.is_empty() {
            return Ok(());
        }
        validate_model(model, &records, ctx)
    }
}

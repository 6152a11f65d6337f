//! # Core Module
//!
//! Operation model, hook pipeline, adapter contract and client. Every read
//! and write routes through `Pipeline::execute`.
//!
//! ## Design Principles
//!
//! - Single operation model for all actions
//! - Hooks answer with an explicit `HookOutcome`, never with sentinel errors
//! - Writes are validated against the model before reaching the adapter

pub mod adapter;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod operation;
pub mod pipeline;
pub mod update;

pub use adapter::{Adapter, AdapterFuture, MemoryAdapter};
pub use client::{Client, ModelHandle};
pub use config::{EngineConfig, LogConfig};
pub use context::TransactionContext;
pub use error::{CoreError, CoreResult, ErrorCode};
pub use operation::{Action, Operation, OperationOutput, Query};
pub use pipeline::{FnHook, Hook, HookFuture, HookOutcome, HookPayload, HookPhase, HookRegistry, Pipeline};
pub use update::{apply_update, normalize_update};

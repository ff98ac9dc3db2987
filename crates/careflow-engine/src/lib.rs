//! Careflow Workflow Engine
//!
//! This crate provides the execution engine for careflow workflows, the
//! store-backed dispatcher that fans an incoming event out to every matching
//! active workflow, and an `EventRunner` for channel-based triggering.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventRunner                          │
//! │  - owns mpsc channel (sender + receiver)                    │
//! │  - start(cancel) runs the dispatch loop                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                           │
//! │  - loads active workflows from the WorkflowStore            │
//! │  - one task per matching workflow, appends RunOutcomes      │
//! │  - activate / deactivate behind the structural validator    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                         │
//! │  - run(workflow, event, cancel) → RunOutcome                │
//! │  - trigger match, pre-flight validation, graph walk         │
//! │  - config templating via minijinja                          │
//! │  - action nodes dispatched through the ActionRegistry       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use careflow_engine::{EngineConfig, WorkflowEngine};
//! use careflow_registry::{EchoHandler, HandlerRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = Arc::new(HandlerRegistry::new().with_fallback(EchoHandler));
//! let engine = WorkflowEngine::new(registry, EngineConfig::default());
//!
//! let outcome = engine.run(&workflow, &event, CancellationToken::new()).await;
//! ```

mod config;
mod context;
mod dispatcher;
mod engine;
mod error;
mod events;
mod runner;
mod template;

pub use config::EngineConfig;
pub use context::RunContext;
pub use dispatcher::Dispatcher;
pub use engine::WorkflowEngine;
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use runner::EventRunner;

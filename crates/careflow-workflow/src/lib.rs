//! Careflow Workflow
//!
//! This crate provides the graph model for careflow automations: typed nodes,
//! id-referenced edges, the workflow container, the per-kind configuration
//! schema, the events that start a run and the outcome a run produces.
//!
//! The structural validator (`careflow-validator`) and the execution engine
//! (`careflow-engine`) both work on these types.

mod edge;
mod error;
mod graph;
mod node;
mod run;
mod schema;
mod trigger;
mod workflow;

pub use edge::{Branch, Edge};
pub use error::WorkflowError;
pub use graph::Graph;
pub use node::{ActionKind, Node, NodeConfig, NodeKind};
pub use run::{RunError, RunErrorKind, RunOutcome, RunStatus};
pub use schema::Schema;
pub use trigger::{
  DomainEvent, IncomingEvent, ScheduleFrequency, ScheduleTick, TriggerType, trigger_matches,
};
pub use workflow::Workflow;

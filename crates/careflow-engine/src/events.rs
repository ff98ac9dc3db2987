//! Execution events and notifiers for observability.
//!
//! Events are emitted during a run to allow consumers to observe progress,
//! persist state, stream to UIs, etc.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use careflow_workflow::RunStatus;

/// Events emitted during a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// No trigger matched the incoming event.
  WorkflowSkipped { run_id: String, workflow_id: String },

  /// The trigger matched and the walk is about to start.
  WorkflowStarted {
    run_id: String,
    workflow_id: String,
    trigger_id: String,
  },

  NodeStarted { run_id: String, node_id: String },

  /// A node has completed. `output` is the action output, the condition
  /// outcome, or null for nodes that produce nothing.
  NodeCompleted {
    run_id: String,
    node_id: String,
    output: Value,
  },

  NodeFailed {
    run_id: String,
    node_id: String,
    error: String,
  },

  /// The run reached a terminal state other than skipped.
  WorkflowFinished {
    run_id: String,
    workflow_id: String,
    status: RunStatus,
    error: Option<String>,
  },
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

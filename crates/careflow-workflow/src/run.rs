//! Run outcomes: the immutable record of one execution attempt.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Succeeded,
  Failed,
  /// No trigger matched the event. Not an error.
  Skipped,
  Cancelled,
}

impl RunStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunStatus::Succeeded => "succeeded",
      RunStatus::Failed => "failed",
      RunStatus::Skipped => "skipped",
      RunStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RunStatus {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "succeeded" => Ok(RunStatus::Succeeded),
      "failed" => Ok(RunStatus::Failed),
      "skipped" => Ok(RunStatus::Skipped),
      "cancelled" => Ok(RunStatus::Cancelled),
      other => Err(WorkflowError::UnknownRunStatus(other.to_string())),
    }
  }
}

/// Category of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
  /// The pre-flight structural check found errors.
  Structural,
  /// Unregistered node kind, unknown operator, missing branch edge,
  /// inactive workflow or similar configuration caught at run time.
  Configuration,
  /// A handler reported a failure.
  NodeExecution,
  /// Cancelled externally or by the run deadline.
  Cancelled,
}

/// Where and why a run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
  /// The failing node. `None` for failures that concern the whole workflow.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  pub kind: RunErrorKind,
  pub message: String,
}

impl RunError {
  pub fn at_node(node_id: impl Into<String>, kind: RunErrorKind, message: impl Into<String>) -> Self {
    Self {
      node_id: Some(node_id.into()),
      kind,
      message: message.into(),
    }
  }

  pub fn workflow(kind: RunErrorKind, message: impl Into<String>) -> Self {
    Self {
      node_id: None,
      kind,
      message: message.into(),
    }
  }
}

impl fmt::Display for RunError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.node_id {
      Some(node_id) => write!(f, "node '{}': {}", node_id, self.message),
      None => f.write_str(&self.message),
    }
  }
}

/// The record of one execution attempt. Owned by the workflow store and
/// never modified once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
  pub run_id: String,
  pub workflow_id: String,
  pub workflow_version: u32,
  pub status: RunStatus,
  pub success: bool,
  pub started_at: DateTime<Utc>,
  pub duration_ms: u64,
  /// Action outputs and condition outcomes, keyed by node id.
  pub results: BTreeMap<String, Value>,
  /// Node ids in the order they were executed.
  #[serde(default)]
  pub path: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<RunError>,
}

impl RunOutcome {
  pub fn is_skipped(&self) -> bool {
    self.status == RunStatus::Skipped
  }

  pub fn is_cancelled(&self) -> bool {
    self.status == RunStatus::Cancelled
  }

  /// The node the run stopped at, if it stopped at one.
  pub fn failed_node(&self) -> Option<&str> {
    self.error.as_ref().and_then(|e| e.node_id.as_deref())
  }
}

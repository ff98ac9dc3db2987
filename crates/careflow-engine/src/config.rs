use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
  true
}

/// Configuration for the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
  /// Deadline for a whole run. Expiry cancels the run.
  #[serde(default)]
  pub run_timeout_ms: Option<u64>,

  /// Upper bound applied to every delay node.
  #[serde(default)]
  pub max_delay_ms: Option<u64>,

  /// Render `{{ ... }}` templates in action configuration against the run context.
  #[serde(default = "default_true")]
  pub render_templates: bool,

  /// Validate the workflow again before walking it.
  #[serde(default = "default_true")]
  pub preflight_validation: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      run_timeout_ms: None,
      max_delay_ms: None,
      render_templates: true,
      preflight_validation: true,
    }
  }
}

impl EngineConfig {
  /// The effective deadline for a run: the tighter of the engine and
  /// workflow limits.
  pub fn run_timeout(&self, workflow_timeout_ms: Option<u64>) -> Option<Duration> {
    let timeout_ms = match (self.run_timeout_ms, workflow_timeout_ms) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    };
    timeout_ms.map(Duration::from_millis)
  }

  pub fn delay(&self, delay_ms: u64) -> Duration {
    let delay_ms = match self.max_delay_ms {
      Some(max) => delay_ms.min(max),
      None => delay_ms,
    };
    Duration::from_millis(delay_ms)
  }
}

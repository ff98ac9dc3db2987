use thiserror::Error;

use careflow_registry::RegistryError;
use careflow_store::StoreError;
use careflow_validator::Issue;
use careflow_workflow::RunOutcome;

/// Errors from the dispatcher and event runner.
///
/// Failures inside a run never surface here; they are recorded in the run's
/// outcome.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("store error: {0}")]
  Store(#[from] StoreError),

  /// Activation refused because the workflow has structural errors.
  #[error("workflow '{workflow_id}' cannot be activated: {}", describe(.issues))]
  Invalid {
    workflow_id: String,
    issues: Vec<Issue>,
  },

  /// Runs finished but some outcomes could not be written to the store.
  /// `outcomes` holds every run of the dispatch, recorded or not.
  #[error("failed to record run(s): {}", .run_ids.join(", "))]
  Persist {
    run_ids: Vec<String>,
    outcomes: Vec<RunOutcome>,
  },

  #[error("registry error: {0}")]
  Registry(#[from] RegistryError),

  #[error("event runner channel closed")]
  ChannelClosed,
}

fn describe(issues: &[Issue]) -> String {
  issues
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

//! Store-backed dispatch of incoming events to active workflows.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use careflow_store::WorkflowStore;
use careflow_validator::{Issue, validate};
use careflow_workflow::{IncomingEvent, RunOutcome, Workflow};

use crate::engine::WorkflowEngine;
use crate::error::EngineError;
use crate::events::{ExecutionNotifier, NoopNotifier};

/// Connects the engine to the workflow store.
///
/// Each matching workflow runs as its own task; runs share nothing but the
/// registry and the store.
pub struct Dispatcher<N: ExecutionNotifier = NoopNotifier> {
  engine: Arc<WorkflowEngine<N>>,
  store: Arc<dyn WorkflowStore>,
}

impl<N: ExecutionNotifier + 'static> Dispatcher<N> {
  pub fn new(engine: Arc<WorkflowEngine<N>>, store: Arc<dyn WorkflowStore>) -> Self {
    Self { engine, store }
  }

  pub fn engine(&self) -> &Arc<WorkflowEngine<N>> {
    &self.engine
  }

  pub fn store(&self) -> &Arc<dyn WorkflowStore> {
    &self.store
  }

  /// Run every active workflow whose trigger matches `event` and record the
  /// outcomes. Returns the outcomes ordered by workflow id.
  ///
  /// Every run is awaited and every outcome offered to the store, even after
  /// an append fails; the runs that could not be recorded come back in
  /// [`EngineError::Persist`].
  #[instrument(skip(self, event, cancel), fields(event = %event.describe()))]
  pub async fn dispatch(
    &self,
    event: &IncomingEvent,
    cancel: CancellationToken,
  ) -> Result<Vec<RunOutcome>, EngineError> {
    let candidates: Vec<Workflow> = self
      .store
      .list_active_workflows()
      .await?
      .into_iter()
      .filter(|workflow| workflow.matching_trigger(event).is_some())
      .collect();

    info!(candidates = candidates.len(), "dispatching event");

    let handles: Vec<_> = candidates
      .into_iter()
      .map(|workflow| {
        let engine = Arc::clone(&self.engine);
        let event = event.clone();
        let cancel = cancel.clone();
        let workflow_id = workflow.id.clone();
        let handle = tokio::spawn(async move { engine.run(&workflow, &event, cancel).await });
        (workflow_id, handle)
      })
      .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (workflow_id, handle) in handles {
      match handle.await {
        Ok(outcome) => outcomes.push(outcome),
        Err(e) => {
          error!(workflow_id = %workflow_id, error = %e, "run task failed");
        }
      }
    }
    outcomes.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));

    let mut unrecorded = Vec::new();
    for outcome in &outcomes {
      if let Err(e) = self.store.append_run(outcome).await {
        error!(
          workflow_id = %outcome.workflow_id,
          run_id = %outcome.run_id,
          error = %e,
          "failed to record run"
        );
        unrecorded.push(outcome.run_id.clone());
      }
    }

    if !unrecorded.is_empty() {
      return Err(EngineError::Persist {
        run_ids: unrecorded,
        outcomes,
      });
    }
    Ok(outcomes)
  }

  /// Mark a workflow active after proving it can run.
  ///
  /// Refused if the validator reports any error, or if the registry has no
  /// handler for one of the workflow's action kinds.
  #[instrument(skip(self))]
  pub async fn activate(&self, workflow_id: &str) -> Result<Workflow, EngineError> {
    let workflow = self.store.get_workflow(workflow_id).await?;

    let errors: Vec<Issue> = validate(&workflow)
      .into_iter()
      .filter(Issue::is_error)
      .collect();
    if !errors.is_empty() {
      return Err(EngineError::Invalid {
        workflow_id: workflow_id.to_string(),
        issues: errors,
      });
    }

    self
      .engine
      .registry()
      .ensure_covers(std::slice::from_ref(&workflow))?;

    let workflow = self.store.set_active(workflow_id, true).await?;
    info!(workflow_id = %workflow_id, version = workflow.version, "workflow_activated");
    Ok(workflow)
  }

  #[instrument(skip(self))]
  pub async fn deactivate(&self, workflow_id: &str) -> Result<Workflow, EngineError> {
    let workflow = self.store.set_active(workflow_id, false).await?;
    info!(workflow_id = %workflow_id, "workflow_deactivated");
    Ok(workflow)
  }

  /// Check that the registry serves every action kind used by an active
  /// workflow.
  pub async fn verify_registry(&self) -> Result<(), EngineError> {
    let active = self.store.list_active_workflows().await?;
    self.engine.registry().ensure_covers(&active)?;
    Ok(())
  }
}

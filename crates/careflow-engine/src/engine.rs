//! Workflow execution engine.
//!
//! The `WorkflowEngine` matches a trigger, then walks the graph node by node
//! from it, evaluating conditions at branch points and dispatching action
//! nodes through the action registry.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info, instrument, warn};

use careflow_condition::evaluate;
use careflow_registry::{ActionError, ActionRegistry};
use careflow_validator::{Issue, validate};
use careflow_workflow::{
  Branch, IncomingEvent, Node, NodeKind, RunError, RunErrorKind, RunOutcome, RunStatus, Schema,
  Workflow,
};

use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::template::TemplateRenderer;

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `WorkflowEngine::new()` for an engine with no-op notifications, or
/// `WorkflowEngine::with_notifier()` to provide a custom notifier.
pub struct WorkflowEngine<N: ExecutionNotifier = NoopNotifier> {
  registry: Arc<dyn ActionRegistry>,
  config: EngineConfig,
  templates: TemplateRenderer,
  notifier: N,
}

impl WorkflowEngine<NoopNotifier> {
  pub fn new(registry: Arc<dyn ActionRegistry>, config: EngineConfig) -> Self {
    Self::with_notifier(registry, config, NoopNotifier)
  }
}

/// Per-run state that does not change during the walk.
struct Run<'a> {
  run_id: &'a str,
  workflow: &'a Workflow,
  cancel: &'a CancellationToken,
}

/// Per-run state accumulated during the walk.
#[derive(Default)]
struct WalkState {
  context: RunContext,
  results: BTreeMap<String, Value>,
  path: Vec<String>,
  merged: HashSet<String>,
}

/// Where the walk goes after a node.
enum Next {
  Stop,
  Follow(String),
  FanOut(Vec<String>),
}

impl<N: ExecutionNotifier> WorkflowEngine<N> {
  pub fn with_notifier(registry: Arc<dyn ActionRegistry>, config: EngineConfig, notifier: N) -> Self {
    Self {
      registry,
      config,
      templates: TemplateRenderer::new(),
      notifier,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn registry(&self) -> &Arc<dyn ActionRegistry> {
    &self.registry
  }

  /// Run `workflow` against `event`.
  ///
  /// Never returns an error: every terminal state, including skip,
  /// cancellation and failure, is described by the returned outcome.
  #[instrument(
    name = "workflow_run",
    skip(self, workflow, event, cancel),
    fields(workflow_id = %workflow.id, run_id = tracing::field::Empty)
  )]
  pub async fn run(
    &self,
    workflow: &Workflow,
    event: &IncomingEvent,
    cancel: CancellationToken,
  ) -> RunOutcome {
    let run_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("run_id", run_id.as_str());

    let started_at = Utc::now();
    let clock = Instant::now();
    let mut outcome = RunOutcome {
      run_id: run_id.clone(),
      workflow_id: workflow.id.clone(),
      workflow_version: workflow.version,
      status: RunStatus::Skipped,
      success: false,
      started_at,
      duration_ms: 0,
      results: BTreeMap::new(),
      path: Vec::new(),
      error: None,
    };

    let Some(trigger) = workflow.matching_trigger(event) else {
      info!(
        run_id = %run_id,
        workflow_id = %workflow.id,
        event = %event.describe(),
        "workflow_skipped"
      );
      self.notifier.notify(ExecutionEvent::WorkflowSkipped {
        run_id,
        workflow_id: workflow.id.clone(),
      });
      return outcome;
    };

    if let Err(err) = self.check_runnable(workflow) {
      return self.finish(outcome, clock, Err(err));
    }

    info!(
      run_id = %run_id,
      workflow_id = %workflow.id,
      trigger_id = %trigger.id,
      event = %event.describe(),
      "workflow_started"
    );
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      run_id: run_id.clone(),
      workflow_id: workflow.id.clone(),
      trigger_id: trigger.id.clone(),
    });

    let run_cancel = cancel.child_token();
    let timeout = self.config.run_timeout(workflow.timeout_ms);
    let timer = timeout.map(|duration| {
      let token = run_cancel.clone();
      tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        token.cancel();
      })
    });

    let run = Run {
      run_id: &run_id,
      workflow,
      cancel: &run_cancel,
    };
    let mut state = WalkState {
      context: RunContext::from_event(event),
      ..Default::default()
    };

    let mut result = self.walk_from(&run, &mut state, trigger.id.clone()).await;

    if let Some(timer) = timer {
      timer.abort();
    }

    if let Err(err) = &mut result {
      if err.kind == RunErrorKind::Cancelled && !cancel.is_cancelled() {
        if let Some(duration) = timeout {
          err.message = format!("run timed out after {} ms", duration.as_millis());
        }
      }
    }

    outcome.results = state.results;
    outcome.path = state.path;
    self.finish(outcome, clock, result)
  }

  /// Checks that apply before any node runs.
  fn check_runnable(&self, workflow: &Workflow) -> Result<(), RunError> {
    if !workflow.is_active {
      return Err(RunError::workflow(
        RunErrorKind::Configuration,
        "workflow is not active",
      ));
    }

    if self.config.preflight_validation {
      let errors: Vec<Issue> = validate(workflow)
        .into_iter()
        .filter(Issue::is_error)
        .collect();
      if !errors.is_empty() {
        let message = errors
          .iter()
          .map(ToString::to_string)
          .collect::<Vec<_>>()
          .join("; ");
        return Err(RunError::workflow(RunErrorKind::Structural, message));
      }
    }

    Ok(())
  }

  fn finish(
    &self,
    mut outcome: RunOutcome,
    clock: Instant,
    result: Result<(), RunError>,
  ) -> RunOutcome {
    outcome.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
      Ok(()) => {
        outcome.status = RunStatus::Succeeded;
        outcome.success = true;
        info!(
          run_id = %outcome.run_id,
          workflow_id = %outcome.workflow_id,
          nodes_executed = outcome.path.len(),
          duration_ms = outcome.duration_ms,
          "workflow_completed"
        );
      }
      Err(err) if err.kind == RunErrorKind::Cancelled => {
        outcome.status = RunStatus::Cancelled;
        warn!(
          run_id = %outcome.run_id,
          workflow_id = %outcome.workflow_id,
          node_id = err.node_id.as_deref().unwrap_or_default(),
          reason = %err.message,
          "workflow_cancelled"
        );
        outcome.error = Some(err);
      }
      Err(err) => {
        outcome.status = RunStatus::Failed;
        error!(
          run_id = %outcome.run_id,
          workflow_id = %outcome.workflow_id,
          error = %err,
          "workflow_failed"
        );
        outcome.error = Some(err);
      }
    }

    self.notifier.notify(ExecutionEvent::WorkflowFinished {
      run_id: outcome.run_id.clone(),
      workflow_id: outcome.workflow_id.clone(),
      status: outcome.status,
      error: outcome.error.as_ref().map(ToString::to_string),
    });

    outcome
  }

  /// Walk from `start` until the path ends. Split branches are walked one
  /// after another, each to completion.
  fn walk_from<'a>(
    &'a self,
    run: &'a Run<'a>,
    state: &'a mut WalkState,
    start: String,
  ) -> BoxFuture<'a, Result<(), RunError>> {
    async move {
      let mut current = start;
      loop {
        if run.cancel.is_cancelled() {
          return Err(RunError::at_node(
            current,
            RunErrorKind::Cancelled,
            "run cancelled",
          ));
        }

        let node = run.workflow.get_node(&current).ok_or_else(|| {
          RunError::at_node(
            current.clone(),
            RunErrorKind::Configuration,
            "node does not exist",
          )
        })?;

        // First arrival fires a merge; later arrivals end their branch here.
        if matches!(node.kind, NodeKind::Merge) && !state.merged.insert(node.id.clone()) {
          return Ok(());
        }

        match self.execute_node(run, state, node).await? {
          Next::Stop => return Ok(()),
          Next::Follow(next) => current = next,
          Next::FanOut(targets) => {
            for target in targets {
              self.walk_from(run, state, target).await?;
            }
            return Ok(());
          }
        }
      }
    }
    .boxed()
  }

  async fn execute_node(
    &self,
    run: &Run<'_>,
    state: &mut WalkState,
    node: &Node,
  ) -> Result<Next, RunError> {
    state.path.push(node.id.clone());
    info!(run_id = %run.run_id, node_id = %node.id, kind = %node.kind, "node_started");
    self.notifier.notify(ExecutionEvent::NodeStarted {
      run_id: run.run_id.to_string(),
      node_id: node.id.clone(),
    });

    let result = self.dispatch_node(run, state, node).await;

    match &result {
      Ok((output, _)) => {
        info!(run_id = %run.run_id, node_id = %node.id, "node_completed");
        self.notifier.notify(ExecutionEvent::NodeCompleted {
          run_id: run.run_id.to_string(),
          node_id: node.id.clone(),
          output: output.clone(),
        });
      }
      Err(err) => {
        error!(
          run_id = %run.run_id,
          node_id = %node.id,
          error = %err.message,
          "node_failed"
        );
        self.notifier.notify(ExecutionEvent::NodeFailed {
          run_id: run.run_id.to_string(),
          node_id: node.id.clone(),
          error: err.message.clone(),
        });
      }
    }

    result.map(|(_, next)| next)
  }

  async fn dispatch_node(
    &self,
    run: &Run<'_>,
    state: &mut WalkState,
    node: &Node,
  ) -> Result<(Value, Next), RunError> {
    let missing = Schema::missing_required(&node.kind, &node.config);
    if !missing.is_empty() {
      return Err(configuration(
        node,
        format!("missing required config: {}", missing.join(", ")),
      ));
    }

    match &node.kind {
      NodeKind::Trigger | NodeKind::Merge => {
        Ok((Value::Null, single_successor(run.workflow, node)?))
      }
      NodeKind::Split => {
        let targets: Vec<String> = run
          .workflow
          .outgoing(&node.id)
          .map(|edge| edge.target.clone())
          .collect();
        let next = if targets.is_empty() {
          Next::Stop
        } else {
          Next::FanOut(targets)
        };
        Ok((Value::Null, next))
      }
      NodeKind::Condition => {
        let outcome = self.evaluate_condition(state, node)?;
        state.results.insert(node.id.clone(), Value::Bool(outcome));
        Ok((Value::Bool(outcome), branch_successor(run.workflow, node, outcome)?))
      }
      NodeKind::Delay => {
        self.delay(run, node).await?;
        Ok((Value::Null, single_successor(run.workflow, node)?))
      }
      NodeKind::Action(_) => {
        let output = self.invoke_action(run, state, node).await?;
        state.context.merge_output(&node.id, &output);
        state.results.insert(node.id.clone(), output.clone());
        Ok((output, single_successor(run.workflow, node)?))
      }
    }
  }

  fn evaluate_condition(&self, state: &WalkState, node: &Node) -> Result<bool, RunError> {
    let field = node
      .config_str("field")
      .ok_or_else(|| configuration(node, "condition field must be a string"))?;
    let operator = node
      .config_str("operator")
      .ok_or_else(|| configuration(node, "condition operator must be a string"))?;
    let right = node.config_value("value").cloned().unwrap_or(Value::Null);
    let left = state.context.lookup(field).cloned().unwrap_or(Value::Null);

    evaluate(&left, operator, &right).map_err(|err| configuration(node, err.to_string()))
  }

  async fn delay(&self, run: &Run<'_>, node: &Node) -> Result<(), RunError> {
    let delay_ms = node
      .config_value("delayMs")
      .and_then(Value::as_u64)
      .ok_or_else(|| configuration(node, "delayMs must be a non-negative integer"))?;
    let duration = self.config.delay(delay_ms);

    tokio::select! {
      _ = tokio::time::sleep(duration) => Ok(()),
      _ = run.cancel.cancelled() => Err(RunError::at_node(
        node.id.clone(),
        RunErrorKind::Cancelled,
        "run cancelled during delay",
      )),
    }
  }

  async fn invoke_action(
    &self,
    run: &Run<'_>,
    state: &WalkState,
    node: &Node,
  ) -> Result<Value, RunError> {
    let kind = node.kind.dispatch_key();
    let context = state.context.as_map();

    let config = if self.config.render_templates {
      self.templates.render_config(&node.id, &node.config, context)?
    } else {
      node.config.clone()
    };

    let invocation = self.registry.invoke(&kind, &config, context);
    let result = tokio::select! {
      result = invocation => result,
      _ = run.cancel.cancelled() => {
        return Err(RunError::at_node(
          node.id.clone(),
          RunErrorKind::Cancelled,
          "run cancelled during action",
        ));
      }
    };

    result.map_err(|err| match err {
      ActionError::NotRegistered(kind) => configuration(
        node,
        format!("no action handler registered for kind '{}'", kind),
      ),
      ActionError::Failed(message) => {
        RunError::at_node(node.id.clone(), RunErrorKind::NodeExecution, message)
      }
    })
  }
}

fn configuration(node: &Node, message: impl Into<String>) -> RunError {
  RunError::at_node(node.id.clone(), RunErrorKind::Configuration, message)
}

/// Non-branching kinds follow their only outgoing edge, if any.
fn single_successor(workflow: &Workflow, node: &Node) -> Result<Next, RunError> {
  let targets: Vec<&str> = workflow
    .outgoing(&node.id)
    .map(|edge| edge.target.as_str())
    .collect();

  match targets.as_slice() {
    [] => Ok(Next::Stop),
    [target] => Ok(Next::Follow(target.to_string())),
    _ => Err(configuration(
      node,
      format!(
        "{} node has {} outgoing edges; expected at most one",
        node.kind,
        targets.len()
      ),
    )),
  }
}

/// Condition nodes follow the edge tagged with the evaluated outcome.
fn branch_successor(workflow: &Workflow, node: &Node, outcome: bool) -> Result<Next, RunError> {
  let outgoing: Vec<_> = workflow.outgoing(&node.id).collect();
  if outgoing.is_empty() {
    return Ok(Next::Stop);
  }

  let branch = Branch::from_outcome(outcome);
  let matching: Vec<&str> = outgoing
    .iter()
    .filter(|edge| edge.branch == Some(branch))
    .map(|edge| edge.target.as_str())
    .collect();

  match matching.as_slice() {
    [target] => Ok(Next::Follow(target.to_string())),
    [] => Err(configuration(
      node,
      format!("no '{}' branch edge", branch),
    )),
    _ => Err(configuration(
      node,
      format!("more than one '{}' branch edge", branch),
    )),
  }
}

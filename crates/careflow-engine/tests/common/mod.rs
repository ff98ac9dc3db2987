//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use careflow_registry::{ActionError, ActionHandler, HandlerRegistry};
use careflow_workflow::{ActionKind, Branch, Node, NodeKind, Workflow};
use serde_json::{Map, Value, json};

/// One recorded handler invocation.
#[derive(Debug, Clone)]
pub struct Call {
  pub kind: String,
  pub config: Map<String, Value>,
  pub context: Map<String, Value>,
}

/// A handler that records every call and answers with a fixed result.
#[derive(Clone)]
pub struct RecordingHandler {
  calls: Arc<Mutex<Vec<Call>>>,
  result: Result<Value, String>,
  latency: Option<Duration>,
}

impl RecordingHandler {
  pub fn new(calls: Arc<Mutex<Vec<Call>>>, output: Value) -> Self {
    Self {
      calls,
      result: Ok(output),
      latency: None,
    }
  }

  pub fn failing(calls: Arc<Mutex<Vec<Call>>>, message: &str) -> Self {
    Self {
      calls,
      result: Err(message.to_string()),
      latency: None,
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
  async fn handle(
    &self,
    kind: &str,
    config: &Map<String, Value>,
    context: &Map<String, Value>,
  ) -> Result<Value, ActionError> {
    self.calls.lock().unwrap().push(Call {
      kind: kind.to_string(),
      config: config.clone(),
      context: context.clone(),
    });
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
    self.result.clone().map_err(ActionError::Failed)
  }
}

/// Records calls per registry; `kinds()` lists invoked kinds in order.
#[derive(Clone, Default)]
pub struct Recorder {
  pub calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn handler(&self, output: Value) -> RecordingHandler {
    RecordingHandler::new(self.calls.clone(), output)
  }

  pub fn failing(&self, message: &str) -> RecordingHandler {
    RecordingHandler::failing(self.calls.clone(), message)
  }

  pub fn kinds(&self) -> Vec<String> {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .map(|c| c.kind.clone())
      .collect()
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }
}

pub fn event_trigger(id: &str, event_type: &str) -> Node {
  Node::new(id, NodeKind::Trigger).with_config(json!({
    "triggerType": "event",
    "eventType": event_type
  }))
}

pub fn notification(id: &str, message: &str) -> Node {
  Node::new(id, NodeKind::Action(ActionKind::Notification)).with_config(json!({
    "message": message,
    "channel": "sms"
  }))
}

pub fn domain_action(id: &str, domain: &str, action: &str) -> Node {
  Node::new(id, NodeKind::domain(domain, action))
}

/// Trigger(sleep_study.created) → Condition(monitorsAvailable > 0)
/// with true → equipment.dispatch and false → notification("no monitors").
pub fn sleep_study_workflow() -> Workflow {
  Workflow::new("sleep-study", "Sleep study equipment")
    .with_node(event_trigger("start", "sleep_study.created"))
    .with_node(Node::new("has-monitors", NodeKind::Condition).with_config(json!({
      "field": "monitorsAvailable",
      "operator": "greater_than",
      "value": 0
    })))
    .with_node(domain_action("dispatch", "equipment", "dispatch"))
    .with_node(notification("notify", "no monitors"))
    .connect("e1", "start", "has-monitors")
    .connect_branch("e2", "has-monitors", "dispatch", Branch::True)
    .connect_branch("e3", "has-monitors", "notify", Branch::False)
    .active()
}

/// Registry serving the sleep study workflow's two action kinds.
pub fn sleep_study_registry(recorder: &Recorder) -> HandlerRegistry {
  let mut registry = HandlerRegistry::new();
  registry
    .register(
      "equipment.dispatch",
      recorder.handler(json!({ "deviceId": "M-42", "dispatched": true })),
    )
    .unwrap();
  registry
    .register("notification", recorder.handler(json!({ "sent": true })))
    .unwrap();
  registry
}

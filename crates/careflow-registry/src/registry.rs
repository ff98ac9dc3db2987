use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use careflow_workflow::Workflow;
use serde_json::{Map, Value};

use crate::error::{ActionError, RegistryError};
use crate::handler::{ActionHandler, FnHandler};

/// The capability the execution engine dispatches action nodes through.
///
/// Implementations must be safe to invoke from concurrent runs.
#[async_trait]
pub trait ActionRegistry: Send + Sync {
  /// Invoke the handler registered for `kind`.
  async fn invoke(
    &self,
    kind: &str,
    config: &Map<String, Value>,
    context: &Map<String, Value>,
  ) -> Result<Value, ActionError>;

  /// Whether `kind` would be dispatched to a handler.
  fn has_handler(&self, kind: &str) -> bool;

  /// Action kinds used by `workflow` that no handler serves, sorted.
  fn missing_kinds(&self, workflow: &Workflow) -> Vec<String> {
    workflow
      .action_kinds()
      .into_iter()
      .filter(|kind| !self.has_handler(kind))
      .collect()
  }

  /// Check that every action kind used by `workflows` has a handler.
  fn ensure_covers(&self, workflows: &[Workflow]) -> Result<(), RegistryError> {
    let missing: BTreeSet<String> = workflows
      .iter()
      .flat_map(|workflow| self.missing_kinds(workflow))
      .collect();

    if missing.is_empty() {
      Ok(())
    } else {
      Err(RegistryError::MissingHandlers(missing.into_iter().collect()))
    }
  }
}

/// In-process dispatch table from node kind to handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
  handlers: HashMap<String, Arc<dyn ActionHandler>>,
  fallback: Option<Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a handler for one kind. Each kind may be registered once.
  pub fn register(
    &mut self,
    kind: impl Into<String>,
    handler: impl ActionHandler + 'static,
  ) -> Result<&mut Self, RegistryError> {
    let kind = kind.into();
    if self.handlers.contains_key(&kind) {
      return Err(RegistryError::Duplicate(kind));
    }
    self.handlers.insert(kind, Arc::new(handler));
    Ok(self)
  }

  /// Register a synchronous closure as the handler for `kind`.
  pub fn register_fn<F>(&mut self, kind: impl Into<String>, f: F) -> Result<&mut Self, RegistryError>
  where
    F: Fn(&Map<String, Value>, &Map<String, Value>) -> Result<Value, ActionError>
      + Send
      + Sync
      + 'static,
  {
    self.register(kind, FnHandler::new(f))
  }

  /// Serve every kind without a dedicated handler with `handler`.
  pub fn with_fallback(mut self, handler: impl ActionHandler + 'static) -> Self {
    self.fallback = Some(Arc::new(handler));
    self
  }

  /// Registered kinds, sorted.
  pub fn kinds(&self) -> Vec<&str> {
    let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
    kinds.sort_unstable();
    kinds
  }

  fn get(&self, kind: &str) -> Option<&Arc<dyn ActionHandler>> {
    self.handlers.get(kind).or(self.fallback.as_ref())
  }
}

#[async_trait]
impl ActionRegistry for HandlerRegistry {
  async fn invoke(
    &self,
    kind: &str,
    config: &Map<String, Value>,
    context: &Map<String, Value>,
  ) -> Result<Value, ActionError> {
    let handler = self
      .get(kind)
      .ok_or_else(|| ActionError::NotRegistered(kind.to_string()))?;
    handler.handle(kind, config, context).await
  }

  fn has_handler(&self, kind: &str) -> bool {
    self.get(kind).is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::handler::EchoHandler;
  use careflow_workflow::{ActionKind, Node, NodeKind};
  use serde_json::json;

  fn config(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
  }

  #[tokio::test]
  async fn test_invoke_registered_handler() {
    let mut registry = HandlerRegistry::new();
    registry
      .register_fn("notification", |config, context| {
        Ok(json!({
          "sent": config["message"],
          "to": context.get("patientId").cloned().unwrap_or(Value::Null),
        }))
      })
      .unwrap();

    let output = registry
      .invoke(
        "notification",
        &config(json!({ "message": "hello" })),
        &config(json!({ "patientId": "p-1" })),
      )
      .await
      .unwrap();

    assert_eq!(output, json!({ "sent": "hello", "to": "p-1" }));
  }

  #[tokio::test]
  async fn test_unregistered_kind() {
    let registry = HandlerRegistry::new();
    let err = registry
      .invoke("database", &Map::new(), &Map::new())
      .await
      .unwrap_err();
    assert_eq!(err, ActionError::NotRegistered("database".to_string()));
    assert!(!registry.has_handler("database"));
  }

  #[tokio::test]
  async fn test_handler_failure_is_passed_through() {
    let mut registry = HandlerRegistry::new();
    registry
      .register_fn("api-call", |_, _| Err(ActionError::failed("http 502")))
      .unwrap();

    let err = registry
      .invoke("api-call", &Map::new(), &Map::new())
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "http 502");
  }

  #[test]
  fn test_duplicate_registration() {
    let mut registry = HandlerRegistry::new();
    registry.register("notification", EchoHandler).unwrap();
    assert!(matches!(
      registry.register("notification", EchoHandler),
      Err(RegistryError::Duplicate(kind)) if kind == "notification"
    ));
  }

  #[tokio::test]
  async fn test_fallback_serves_unknown_kinds() {
    let registry = HandlerRegistry::new().with_fallback(EchoHandler);
    assert!(registry.has_handler("equipment.assign"));

    let output = registry
      .invoke(
        "equipment.assign",
        &config(json!({ "deviceType": "cpap" })),
        &Map::new(),
      )
      .await
      .unwrap();
    assert_eq!(output, json!({ "deviceType": "cpap" }));
  }

  #[test]
  fn test_ensure_covers() {
    let workflow = Workflow::new("wf", "coverage")
      .with_node(Node::new("start", NodeKind::Trigger))
      .with_node(Node::new("notify", NodeKind::Action(ActionKind::Notification)))
      .with_node(Node::new("assign", NodeKind::domain("equipment", "assign")))
      .with_node(Node::new("lookup", NodeKind::domain("compliance", "lookup")));

    let mut registry = HandlerRegistry::new();
    registry.register("notification", EchoHandler).unwrap();

    assert_eq!(
      registry.ensure_covers(std::slice::from_ref(&workflow)),
      Err(RegistryError::MissingHandlers(vec![
        "compliance.lookup".to_string(),
        "equipment.assign".to_string(),
      ]))
    );

    registry.register("equipment.assign", EchoHandler).unwrap();
    registry.register("compliance.lookup", EchoHandler).unwrap();
    assert_eq!(registry.ensure_covers(&[workflow]), Ok(()));
    assert_eq!(
      registry.kinds(),
      vec!["compliance.lookup", "equipment.assign", "notification"]
    );
  }
}

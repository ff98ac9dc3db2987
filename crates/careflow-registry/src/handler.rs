use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ActionError;

/// A concrete side-effecting step, e.g. sending a notification.
///
/// Handlers own any retry policy for their action; the engine never retries.
#[async_trait]
pub trait ActionHandler: Send + Sync {
  async fn handle(
    &self,
    kind: &str,
    config: &Map<String, Value>,
    context: &Map<String, Value>,
  ) -> Result<Value, ActionError>;
}

/// Adapts a synchronous closure into an [`ActionHandler`].
pub struct FnHandler<F> {
  f: F,
}

impl<F> FnHandler<F>
where
  F: Fn(&Map<String, Value>, &Map<String, Value>) -> Result<Value, ActionError> + Send + Sync,
{
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
  F: Fn(&Map<String, Value>, &Map<String, Value>) -> Result<Value, ActionError> + Send + Sync,
{
  async fn handle(
    &self,
    _kind: &str,
    config: &Map<String, Value>,
    context: &Map<String, Value>,
  ) -> Result<Value, ActionError> {
    (self.f)(config, context)
  }
}

/// Returns the node's configuration as its output. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl ActionHandler for EchoHandler {
  async fn handle(
    &self,
    _kind: &str,
    config: &Map<String, Value>,
    _context: &Map<String, Value>,
  ) -> Result<Value, ActionError> {
    Ok(Value::Object(config.clone()))
  }
}

use thiserror::Error;

/// Errors returned by a single action invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
  /// No handler is registered for the node kind.
  #[error("no action handler registered for kind '{0}'")]
  NotRegistered(String),

  /// The handler ran and reported a failure.
  #[error("{0}")]
  Failed(String),
}

impl ActionError {
  pub fn failed(message: impl Into<String>) -> Self {
    ActionError::Failed(message.into())
  }
}

/// Errors building or checking a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("a handler is already registered for kind '{0}'")]
  Duplicate(String),

  #[error("no handler registered for: {}", .0.join(", "))]
  MissingHandlers(Vec<String>),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("unknown node kind: {0}")]
  UnknownNodeKind(String),

  #[error("invalid domain action kind '{0}': expected '<domain>.<action>'")]
  InvalidDomainKind(String),

  #[error("unknown trigger type: {0}")]
  UnknownTriggerType(String),

  #[error("unknown schedule frequency: {0}")]
  UnknownScheduleFrequency(String),

  #[error("unknown run status: {0}")]
  UnknownRunStatus(String),

  #[error("duplicate node id: {0}")]
  DuplicateNodeId(String),

  #[error("failed to parse workflow: {0}")]
  Parse(#[from] serde_json::Error),
}

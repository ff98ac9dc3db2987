use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowError;

/// Per-node configuration, as authored in the editor.
pub type NodeConfig = Map<String, Value>;

/// A step in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
  #[serde(default)]
  pub label: String,
  #[serde(default)]
  pub config: NodeConfig,
}

impl Node {
  pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      kind,
      label: String::new(),
      config: NodeConfig::new(),
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  /// Replace the configuration. Anything other than a JSON object leaves the
  /// node unconfigured.
  pub fn with_config(mut self, config: Value) -> Self {
    self.config = match config {
      Value::Object(map) => map,
      _ => NodeConfig::new(),
    };
    self
  }

  /// Look up a configuration value, treating `null` as absent.
  pub fn config_value(&self, key: &str) -> Option<&Value> {
    self.config.get(key).filter(|v| !v.is_null())
  }

  pub fn config_str(&self, key: &str) -> Option<&str> {
    self.config.get(key).and_then(Value::as_str)
  }

  pub fn is_trigger(&self) -> bool {
    matches!(self.kind, NodeKind::Trigger)
  }
}

/// The closed set of node kinds.
///
/// Domain actions (`equipment.assign`, `compliance.lookup`, ...) are action
/// subtypes namespaced by business domain; they validate and dispatch like any
/// other action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeKind {
  Trigger,
  Condition,
  Delay,
  Split,
  Merge,
  Action(ActionKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
  /// Plain `action` node.
  Generic,
  AiAgent,
  ApiCall,
  Database,
  Notification,
  Domain { domain: String, action: String },
}

impl NodeKind {
  pub fn action(kind: ActionKind) -> Self {
    NodeKind::Action(kind)
  }

  /// Build a namespaced domain action kind, e.g. `domain("equipment", "assign")`.
  pub fn domain(domain: impl Into<String>, action: impl Into<String>) -> Self {
    NodeKind::Action(ActionKind::Domain {
      domain: domain.into(),
      action: action.into(),
    })
  }

  pub fn is_action(&self) -> bool {
    matches!(self, NodeKind::Action(_))
  }

  pub fn action_kind(&self) -> Option<&ActionKind> {
    match self {
      NodeKind::Action(kind) => Some(kind),
      _ => None,
    }
  }

  /// The key under which an action handler is registered.
  pub fn dispatch_key(&self) -> String {
    self.to_string()
  }

  /// Kinds allowed to have more than one outgoing edge.
  pub fn allows_fan_out(&self) -> bool {
    matches!(self, NodeKind::Condition | NodeKind::Split)
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeKind::Trigger => f.write_str("trigger"),
      NodeKind::Condition => f.write_str("condition"),
      NodeKind::Delay => f.write_str("delay"),
      NodeKind::Split => f.write_str("split"),
      NodeKind::Merge => f.write_str("merge"),
      NodeKind::Action(kind) => kind.fmt(f),
    }
  }
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ActionKind::Generic => f.write_str("action"),
      ActionKind::AiAgent => f.write_str("ai-agent"),
      ActionKind::ApiCall => f.write_str("api-call"),
      ActionKind::Database => f.write_str("database"),
      ActionKind::Notification => f.write_str("notification"),
      ActionKind::Domain { domain, action } => write!(f, "{}.{}", domain, action),
    }
  }
}

impl FromStr for NodeKind {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let kind = match s {
      "trigger" => NodeKind::Trigger,
      "condition" => NodeKind::Condition,
      "delay" => NodeKind::Delay,
      "split" => NodeKind::Split,
      "merge" => NodeKind::Merge,
      "action" => NodeKind::Action(ActionKind::Generic),
      "ai-agent" => NodeKind::Action(ActionKind::AiAgent),
      "api-call" => NodeKind::Action(ActionKind::ApiCall),
      "database" => NodeKind::Action(ActionKind::Database),
      "notification" => NodeKind::Action(ActionKind::Notification),
      other if other.contains('.') => parse_domain_kind(other)?,
      other => return Err(WorkflowError::UnknownNodeKind(other.to_string())),
    };
    Ok(kind)
  }
}

fn parse_domain_kind(s: &str) -> Result<NodeKind, WorkflowError> {
  let (domain, action) = s
    .split_once('.')
    .ok_or_else(|| WorkflowError::InvalidDomainKind(s.to_string()))?;

  let valid_segment = |segment: &str| {
    !segment.is_empty()
      && segment
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
  };

  if !valid_segment(domain) || !valid_segment(action) {
    return Err(WorkflowError::InvalidDomainKind(s.to_string()));
  }

  Ok(NodeKind::domain(domain, action))
}

impl TryFrom<String> for NodeKind {
  type Error = WorkflowError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<NodeKind> for String {
  fn from(kind: NodeKind) -> Self {
    kind.to_string()
  }
}

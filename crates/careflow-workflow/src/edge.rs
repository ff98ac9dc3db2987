use std::fmt;

use serde::{Deserialize, Serialize};

/// The outcome a branch edge leaving a condition node is taken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
  True,
  False,
}

impl Branch {
  pub fn from_outcome(outcome: bool) -> Self {
    if outcome { Branch::True } else { Branch::False }
  }

  pub fn as_bool(self) -> bool {
    matches!(self, Branch::True)
  }
}

impl fmt::Display for Branch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Branch::True => f.write_str("true"),
      Branch::False => f.write_str("false"),
    }
  }
}

/// A directed connection between two nodes, referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  pub id: String,
  pub source: String,
  pub target: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<Branch>,
}

impl Edge {
  pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      source: source.into(),
      target: target.into(),
      branch: None,
    }
  }

  pub fn branch(
    id: impl Into<String>,
    source: impl Into<String>,
    target: impl Into<String>,
    branch: Branch,
  ) -> Self {
    Self {
      branch: Some(branch),
      ..Self::new(id, source, target)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_branch_serializes_as_lowercase_string() {
    let edge = Edge::branch("e1", "check", "dispatch", Branch::True);
    let value = serde_json::to_value(&edge).unwrap();
    assert_eq!(value["branch"], "true");
  }

  #[test]
  fn test_plain_edge_omits_branch() {
    let edge: Edge = serde_json::from_value(json!({
      "id": "e1",
      "source": "a",
      "target": "b"
    }))
    .unwrap();
    assert_eq!(edge.branch, None);
    assert!(serde_json::to_value(&edge).unwrap().get("branch").is_none());
  }

  #[test]
  fn test_branch_from_outcome() {
    assert_eq!(Branch::from_outcome(true), Branch::True);
    assert_eq!(Branch::from_outcome(false), Branch::False);
    assert!(!Branch::False.as_bool());
  }
}

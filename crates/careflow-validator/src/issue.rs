use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
  Info,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Severity::Error => f.write_str("error"),
      Severity::Warning => f.write_str("warning"),
      Severity::Info => f.write_str("info"),
    }
  }
}

/// A single finding of the structural validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
  pub severity: Severity,
  /// Stable machine-readable code, e.g. `missing_field` or `cycle`.
  pub code: String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub edge_id: Option<String>,
}

impl Issue {
  fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
    Self {
      severity,
      code: code.to_string(),
      message: message.into(),
      node_id: None,
      edge_id: None,
    }
  }

  pub fn error(code: &str, message: impl Into<String>) -> Self {
    Self::new(Severity::Error, code, message)
  }

  pub fn warning(code: &str, message: impl Into<String>) -> Self {
    Self::new(Severity::Warning, code, message)
  }

  pub fn info(code: &str, message: impl Into<String>) -> Self {
    Self::new(Severity::Info, code, message)
  }

  pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
    self.node_id = Some(node_id.into());
    self
  }

  pub fn at_edge(mut self, edge_id: impl Into<String>) -> Self {
    self.edge_id = Some(edge_id.into());
    self
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.severity, self.code)?;
    if let Some(node_id) = &self.node_id {
      write!(f, " node '{}'", node_id)?;
    }
    if let Some(edge_id) = &self.edge_id {
      write!(f, " edge '{}'", edge_id)?;
    }
    write!(f, ": {}", self.message)
  }
}

/// Issue counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
  pub error_count: usize,
  pub warning_count: usize,
  pub info_count: usize,
}

impl IssueSummary {
  pub fn from_issues(issues: &[Issue]) -> Self {
    issues.iter().fold(Self::default(), |mut acc, issue| {
      match issue.severity {
        Severity::Error => acc.error_count += 1,
        Severity::Warning => acc.warning_count += 1,
        Severity::Info => acc.info_count += 1,
      }
      acc
    })
  }
}

//! Required-field schema per node kind.
//!
//! This table is consulted by the structural validator at design time and by
//! the execution engine as a runtime check before dispatching a node.

use std::collections::BTreeSet;

use crate::node::{ActionKind, NodeConfig, NodeKind};
use crate::trigger::TriggerType;

pub struct Schema;

impl Schema {
  /// Fields every node of `kind` must configure.
  pub fn required_fields(kind: &NodeKind) -> BTreeSet<&'static str> {
    let fields: &[&'static str] = match kind {
      NodeKind::Trigger => &["triggerType"],
      NodeKind::Condition => &["field", "operator", "value"],
      NodeKind::Delay => &["delayMs"],
      NodeKind::Split | NodeKind::Merge => &[],
      NodeKind::Action(action) => match action {
        ActionKind::ApiCall => &["url"],
        ActionKind::Database => &["operation", "table"],
        ActionKind::Notification => &["message"],
        ActionKind::AiAgent => &["prompt"],
        ActionKind::Generic | ActionKind::Domain { .. } => &[],
      },
    };
    fields.iter().copied().collect()
  }

  /// Fields that become required because of another field's value.
  pub fn conditional_fields(kind: &NodeKind, config: &NodeConfig) -> BTreeSet<&'static str> {
    let mut fields = BTreeSet::new();
    if matches!(kind, NodeKind::Trigger) && trigger_type(config) == Some(TriggerType::Event) {
      fields.insert("eventType");
    }
    fields
  }

  /// Fields whose absence is worth a warning but does not block activation.
  pub fn recommended_fields(kind: &NodeKind, config: &NodeConfig) -> BTreeSet<&'static str> {
    let fields: &[&'static str] = match kind {
      NodeKind::Trigger if trigger_type(config) == Some(TriggerType::Schedule) => {
        &["hour", "schedule"]
      }
      NodeKind::Action(ActionKind::ApiCall) => &["method"],
      NodeKind::Action(ActionKind::Notification) => &["channel"],
      _ => &[],
    };
    fields.iter().copied().collect()
  }

  /// Required and conditionally required fields that are absent or null,
  /// in ascending order.
  pub fn missing_required(kind: &NodeKind, config: &NodeConfig) -> Vec<&'static str> {
    let mut required = Self::required_fields(kind);
    required.extend(Self::conditional_fields(kind, config));
    required
      .into_iter()
      .filter(|field| is_missing(config, field))
      .collect()
  }

  /// Recommended fields that are absent or null, in ascending order.
  pub fn missing_recommended(kind: &NodeKind, config: &NodeConfig) -> Vec<&'static str> {
    Self::recommended_fields(kind, config)
      .into_iter()
      .filter(|field| is_missing(config, field))
      .collect()
  }
}

fn trigger_type(config: &NodeConfig) -> Option<TriggerType> {
  config
    .get("triggerType")
    .and_then(|v| v.as_str())
    .and_then(|s| s.parse().ok())
}

fn is_missing(config: &NodeConfig, field: &str) -> bool {
  config.get(field).is_none_or(|v| v.is_null())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn config(value: serde_json::Value) -> NodeConfig {
    value.as_object().cloned().unwrap_or_default()
  }

  #[test]
  fn test_required_fields_per_kind() {
    assert_eq!(
      Schema::required_fields(&NodeKind::Condition),
      BTreeSet::from(["field", "operator", "value"])
    );
    assert_eq!(
      Schema::required_fields(&NodeKind::Action(ActionKind::ApiCall)),
      BTreeSet::from(["url"])
    );
    assert!(Schema::required_fields(&NodeKind::Split).is_empty());
    assert!(Schema::required_fields(&NodeKind::domain("equipment", "assign")).is_empty());
  }

  #[test]
  fn test_event_trigger_requires_event_type() {
    let cfg = config(json!({ "triggerType": "event" }));
    assert_eq!(
      Schema::missing_required(&NodeKind::Trigger, &cfg),
      vec!["eventType"]
    );

    let cfg = config(json!({ "triggerType": "schedule" }));
    assert!(Schema::missing_required(&NodeKind::Trigger, &cfg).is_empty());
    assert_eq!(
      Schema::missing_recommended(&NodeKind::Trigger, &cfg),
      vec!["hour", "schedule"]
    );
  }

  #[test]
  fn test_null_counts_as_missing() {
    let cfg = config(json!({ "field": "x", "operator": null }));
    assert_eq!(
      Schema::missing_required(&NodeKind::Condition, &cfg),
      vec!["operator", "value"]
    );
  }

  #[test]
  fn test_condition_value_may_be_falsy() {
    let cfg = config(json!({ "field": "x", "operator": "equals", "value": 0 }));
    assert!(Schema::missing_required(&NodeKind::Condition, &cfg).is_empty());
  }
}

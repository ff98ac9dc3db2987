use serde_json::{Map, Value};

use careflow_workflow::IncomingEvent;

/// The mutable key-value map threaded through one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
  values: Map<String, Value>,
}

impl RunContext {
  /// Seed a context from the fields of the triggering event.
  pub fn from_event(event: &IncomingEvent) -> Self {
    Self {
      values: event.context_seed(),
    }
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.values
  }

  /// Look up a field. An exact key wins; otherwise `a.b.c` walks nested
  /// objects (and array indices).
  pub fn lookup(&self, field: &str) -> Option<&Value> {
    if let Some(value) = self.values.get(field) {
      return Some(value);
    }

    let mut segments = field.split('.');
    let first = segments.next()?;
    let mut current = self.values.get(first)?;
    for segment in segments {
      current = match current {
        Value::Object(map) => map.get(segment)?,
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
        _ => return None,
      };
    }
    Some(current)
  }

  /// Record an action's output under its node id and merge object keys into
  /// the top level.
  pub fn merge_output(&mut self, node_id: &str, output: &Value) {
    if let Value::Object(fields) = output {
      for (key, value) in fields {
        self.values.insert(key.clone(), value.clone());
      }
    }
    self.values.insert(node_id.to_string(), output.clone());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_seeded_from_event() {
    let event = IncomingEvent::event(
      "sleep_study.created",
      json!({ "patientId": "p-1", "monitorsAvailable": 3 }),
    );
    let context = RunContext::from_event(&event);
    assert_eq!(context.lookup("eventType"), Some(&json!("sleep_study.created")));
    assert_eq!(context.lookup("monitorsAvailable"), Some(&json!(3)));
  }

  #[test]
  fn test_dotted_lookup() {
    let mut context = RunContext::default();
    context.merge_output(
      "dispatch",
      &json!({ "device": { "serial": "M-42" }, "slots": [7, 9] }),
    );

    assert_eq!(context.lookup("dispatch.device.serial"), Some(&json!("M-42")));
    assert_eq!(context.lookup("device.serial"), Some(&json!("M-42")));
    assert_eq!(context.lookup("slots.1"), Some(&json!(9)));
    assert_eq!(context.lookup("dispatch.missing"), None);
    assert_eq!(context.lookup("slots.x"), None);
  }

  #[test]
  fn test_exact_key_wins_over_path() {
    let mut context = RunContext::default();
    context.merge_output("a", &json!({ "b": 1 }));
    context.merge_output("x", &json!({ "a.b": 2 }));
    assert_eq!(context.lookup("a.b"), Some(&json!(2)));
  }

  #[test]
  fn test_node_id_entry_wins_over_merged_key() {
    let mut context = RunContext::default();
    context.merge_output("status", &json!({ "status": "ok" }));
    assert_eq!(context.lookup("status"), Some(&json!({ "status": "ok" })));
  }

  #[test]
  fn test_scalar_output_is_stored_by_node_id() {
    let mut context = RunContext::default();
    context.merge_output("score", &json!(0.8));
    assert_eq!(context.as_map().len(), 1);
    assert_eq!(context.lookup("score"), Some(&json!(0.8)));
  }
}

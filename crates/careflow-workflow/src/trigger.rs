//! Trigger configuration values and the events that start a run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowError;
use crate::node::{Node, NodeKind};

/// Value of a trigger node's `triggerType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
  /// Fires on an inbound domain event whose `eventType` matches.
  Event,
  /// Fires when the external scheduler decides the schedule is due.
  Schedule,
}

impl FromStr for TriggerType {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "event" => Ok(TriggerType::Event),
      "schedule" => Ok(TriggerType::Schedule),
      other => Err(WorkflowError::UnknownTriggerType(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
  Hourly,
  Daily,
  Weekly,
}

impl FromStr for ScheduleFrequency {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "hourly" => Ok(ScheduleFrequency::Hourly),
      "daily" => Ok(ScheduleFrequency::Daily),
      "weekly" => Ok(ScheduleFrequency::Weekly),
      other => Err(WorkflowError::UnknownScheduleFrequency(other.to_string())),
    }
  }
}

impl fmt::Display for ScheduleFrequency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScheduleFrequency::Hourly => f.write_str("hourly"),
      ScheduleFrequency::Daily => f.write_str("daily"),
      ScheduleFrequency::Weekly => f.write_str("weekly"),
    }
  }
}

/// An inbound domain event, e.g. `{"eventType": "sleep_study.created", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
  pub event_type: String,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

/// A scheduler tick. The scheduler has already decided the schedule is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTick {
  pub hour: u8,
  pub schedule: ScheduleFrequency,
}

/// Anything that can start a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingEvent {
  Event(DomainEvent),
  Schedule(ScheduleTick),
}

impl IncomingEvent {
  /// Build a domain event. Non-object `fields` are ignored.
  pub fn event(event_type: impl Into<String>, fields: Value) -> Self {
    let mut fields = match fields {
      Value::Object(map) => map,
      _ => Map::new(),
    };
    fields.remove("eventType");

    IncomingEvent::Event(DomainEvent {
      event_type: event_type.into(),
      fields,
    })
  }

  pub fn schedule(hour: u8, schedule: ScheduleFrequency) -> Self {
    IncomingEvent::Schedule(ScheduleTick { hour, schedule })
  }

  pub fn event_type(&self) -> Option<&str> {
    match self {
      IncomingEvent::Event(event) => Some(&event.event_type),
      IncomingEvent::Schedule(_) => None,
    }
  }

  /// Short description for logs.
  pub fn describe(&self) -> String {
    match self {
      IncomingEvent::Event(event) => event.event_type.clone(),
      IncomingEvent::Schedule(tick) => format!("schedule:{}@{}", tick.schedule, tick.hour),
    }
  }

  /// The fields a run context starts from.
  pub fn context_seed(&self) -> Map<String, Value> {
    match self {
      IncomingEvent::Event(event) => {
        let mut seed = event.fields.clone();
        seed.insert(
          "eventType".to_string(),
          Value::String(event.event_type.clone()),
        );
        seed
      }
      IncomingEvent::Schedule(tick) => {
        let mut seed = Map::new();
        seed.insert("hour".to_string(), Value::from(tick.hour));
        seed.insert(
          "schedule".to_string(),
          Value::String(tick.schedule.to_string()),
        );
        seed
      }
    }
  }
}

/// Whether a trigger node fires for the given event.
///
/// Event triggers compare `config.eventType` with the event type exactly.
/// Schedule triggers accept every tick; the scheduler only calls in when the
/// schedule is due. Non-trigger nodes and malformed triggers never match.
pub fn trigger_matches(node: &Node, event: &IncomingEvent) -> bool {
  if !matches!(node.kind, NodeKind::Trigger) {
    return false;
  }

  let trigger_type = match node.config_str("triggerType").map(str::parse::<TriggerType>) {
    Some(Ok(trigger_type)) => trigger_type,
    _ => return false,
  };

  match (trigger_type, event) {
    (TriggerType::Event, IncomingEvent::Event(event)) => {
      node.config_str("eventType") == Some(event.event_type.as_str())
    }
    (TriggerType::Schedule, IncomingEvent::Schedule(_)) => true,
    _ => false,
  }
}

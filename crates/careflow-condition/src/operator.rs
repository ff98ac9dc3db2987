use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::{to_number, to_text};
use crate::error::ConditionError;

/// Comparison operators available to condition nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
  Equals,
  NotEquals,
  GreaterThan,
  LessThan,
  Contains,
}

impl Operator {
  pub const ALL: [Operator; 5] = [
    Operator::Equals,
    Operator::NotEquals,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::Contains,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Operator::Equals => "equals",
      Operator::NotEquals => "not_equals",
      Operator::GreaterThan => "greater_than",
      Operator::LessThan => "less_than",
      Operator::Contains => "contains",
    }
  }

  /// Apply the operator. Never fails: failed coercion yields `false`.
  pub fn apply(&self, left: &Value, right: &Value) -> bool {
    match self {
      Operator::Equals => loose_equals(left, right),
      Operator::NotEquals => !loose_equals(left, right),
      Operator::GreaterThan => compare_numeric(left, right, |a, b| a > b),
      Operator::LessThan => compare_numeric(left, right, |a, b| a < b),
      Operator::Contains => to_text(left).contains(&to_text(right)),
    }
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Operator {
  type Err = ConditionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "equals" | "==" => Ok(Operator::Equals),
      "not_equals" | "!=" => Ok(Operator::NotEquals),
      "greater_than" | ">" => Ok(Operator::GreaterThan),
      "less_than" | "<" => Ok(Operator::LessThan),
      "contains" => Ok(Operator::Contains),
      other => Err(ConditionError::UnknownOperator(other.to_string())),
    }
  }
}

/// Evaluate `left <operator> right`.
///
/// Returns `Err` only for an unknown operator.
pub fn evaluate(left: &Value, operator: &str, right: &Value) -> Result<bool, ConditionError> {
  let operator: Operator = operator.parse()?;
  Ok(operator.apply(left, right))
}

fn compare_numeric<F>(left: &Value, right: &Value, compare: F) -> bool
where
  F: Fn(f64, f64) -> bool,
{
  match (to_number(left), to_number(right)) {
    (Some(a), Some(b)) => compare(a, b),
    _ => false,
  }
}

/// JSON equality, widened so that `3`, `3.0` and `"3"` are equal and so are
/// `true` and `"true"`.
fn loose_equals(left: &Value, right: &Value) -> bool {
  if left == right {
    return true;
  }

  if let (Some(a), Some(b)) = (to_number(left), to_number(right)) {
    return a == b;
  }

  match (left, right) {
    (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
    _ => to_text(left) == to_text(right),
  }
}

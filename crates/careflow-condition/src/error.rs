use thiserror::Error;

/// Errors raised while evaluating a condition.
///
/// Coercion failures are not errors; they evaluate to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
  /// The operator is not one of the supported comparison operators.
  #[error("unknown condition operator: '{0}'")]
  UnknownOperator(String),
}

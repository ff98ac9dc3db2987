//! Condition evaluation for careflow.
//!
//! `evaluate(left, operator, right)` compares two JSON values with one of the
//! closed set of operators: `equals`, `not_equals`, `greater_than`,
//! `less_than`, `contains`. Numeric operators fail closed: if either side does
//! not coerce to a number the result is `false`. An unknown operator is a
//! configuration error, never a silent `false`.

mod coerce;
mod error;
mod operator;

pub use coerce::{to_number, to_text};
pub use error::ConditionError;
pub use operator::{Operator, evaluate};

//! Careflow Validator
//!
//! Pure structural analysis of a [`careflow_workflow::Workflow`]. A workflow
//! with no error-severity issue may be activated; the execution engine runs
//! the same analysis again before walking a graph.

mod cycle;
mod issue;
mod validator;

pub use cycle::has_cycle;
pub use issue::{Issue, IssueSummary, Severity};
pub use validator::{is_valid, summary, validate};

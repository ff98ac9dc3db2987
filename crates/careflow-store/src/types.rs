use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;

use careflow_workflow::{RunOutcome, Workflow};

/// A workflow row. The `definition` column holds the full document; the
/// other columns mirror it for querying.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct WorkflowRow {
  pub definition: Json<Workflow>,
  pub is_active: bool,
  pub updated_at: DateTime<Utc>,
}

impl WorkflowRow {
  pub fn into_workflow(self) -> Workflow {
    let mut workflow = self.definition.0;
    workflow.is_active = self.is_active;
    workflow.updated_at = self.updated_at;
    workflow
  }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RunRow {
  pub outcome: Json<RunOutcome>,
}

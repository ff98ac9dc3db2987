use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;

use careflow_workflow::{RunOutcome, Workflow};

use crate::types::{RunRow, WorkflowRow};
use crate::{StoreError, WorkflowStore};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database file at `path` and migrate it.
  pub async fn open(path: &Path) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn fetch_workflows(&self, only_active: bool) -> Result<Vec<Workflow>, StoreError> {
    let rows: Vec<WorkflowRow> = sqlx::query_as(
      r#"
      SELECT definition, is_active, updated_at
      FROM workflows
      WHERE (? = 0 OR is_active = 1)
      ORDER BY id ASC
      "#,
    )
    .bind(only_active)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(WorkflowRow::into_workflow).collect())
  }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
  matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl WorkflowStore for SqliteStore {
  async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      INSERT INTO workflows (id, name, version, is_active, definition, created_at, updated_at)
      VALUES (?, ?, ?, ?, ?, ?, ?)
      ON CONFLICT (id) DO UPDATE SET
        name = excluded.name,
        version = excluded.version,
        is_active = 0,
        definition = excluded.definition,
        updated_at = excluded.updated_at
      "#,
    )
    .bind(&workflow.id)
    .bind(&workflow.name)
    .bind(i64::from(workflow.version))
    .bind(false)
    .bind(Json(workflow))
    .bind(workflow.created_at)
    .bind(workflow.updated_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
    let row: Option<WorkflowRow> = sqlx::query_as(
      r#"
      SELECT definition, is_active, updated_at
      FROM workflows
      WHERE id = ?
      "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(WorkflowRow::into_workflow)
      .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))
  }

  async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
    self.fetch_workflows(false).await
  }

  async fn list_active_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
    self.fetch_workflows(true).await
  }

  async fn set_active(&self, workflow_id: &str, active: bool) -> Result<Workflow, StoreError> {
    let row: Option<WorkflowRow> = sqlx::query_as(
      r#"
      UPDATE workflows
      SET is_active = ?, updated_at = ?
      WHERE id = ?
      RETURNING definition, is_active, updated_at
      "#,
    )
    .bind(active)
    .bind(Utc::now())
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(WorkflowRow::into_workflow)
      .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))
  }

  async fn append_run(&self, outcome: &RunOutcome) -> Result<(), StoreError> {
    let duration_ms = i64::try_from(outcome.duration_ms).unwrap_or(i64::MAX);

    sqlx::query(
      r#"
      INSERT INTO workflow_runs (run_id, workflow_id, workflow_version, status, success, started_at, duration_ms, outcome)
      VALUES (?, ?, ?, ?, ?, ?, ?, ?)
      "#,
    )
    .bind(&outcome.run_id)
    .bind(&outcome.workflow_id)
    .bind(i64::from(outcome.workflow_version))
    .bind(outcome.status.as_str())
    .bind(outcome.success)
    .bind(outcome.started_at)
    .bind(duration_ms)
    .bind(Json(outcome))
    .execute(&self.pool)
    .await
    .map_err(|err| {
      if is_unique_violation(&err) {
        StoreError::Duplicate(format!("run {}", outcome.run_id))
      } else {
        StoreError::Database(err)
      }
    })?;

    Ok(())
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunOutcome>, StoreError> {
    let rows: Vec<RunRow> = sqlx::query_as(
      r#"
      SELECT outcome
      FROM workflow_runs
      WHERE workflow_id = ?
      ORDER BY started_at ASC, rowid ASC
      "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.outcome.0).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  use careflow_workflow::{Node, NodeKind, RunError, RunErrorKind, RunStatus};
  use serde_json::json;

  async fn memory_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    store
  }

  fn workflow(id: &str) -> Workflow {
    Workflow::new(id, format!("Workflow {}", id))
      .with_node(
        Node::new("start", NodeKind::Trigger)
          .with_config(json!({ "triggerType": "event", "eventType": "referral.received" })),
      )
      .with_node(Node::new("assign", NodeKind::domain("equipment", "assign")))
      .connect("e1", "start", "assign")
  }

  fn failed_outcome(run_id: &str, workflow_id: &str) -> RunOutcome {
    RunOutcome {
      run_id: run_id.to_string(),
      workflow_id: workflow_id.to_string(),
      workflow_version: 1,
      status: RunStatus::Failed,
      success: false,
      started_at: Utc::now(),
      duration_ms: 42,
      results: BTreeMap::from([("start".to_string(), json!({ "ok": true }))]),
      path: vec!["start".to_string(), "assign".to_string()],
      error: Some(RunError::at_node(
        "assign",
        RunErrorKind::NodeExecution,
        "no devices",
      )),
    }
  }

  #[tokio::test]
  async fn test_save_and_get_workflow() {
    let store = memory_store().await;
    let original = workflow("wf-1");
    store.save_workflow(&original).await.unwrap();

    let loaded = store.get_workflow("wf-1").await.unwrap();
    assert_eq!(loaded.name, "Workflow wf-1");
    assert_eq!(loaded.nodes.len(), 2);
    assert_eq!(loaded.edges, original.edges);
    assert!(!loaded.is_active);

    assert!(matches!(
      store.get_workflow("wf-2").await,
      Err(StoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_save_replaces_definition() {
    let store = memory_store().await;
    store.save_workflow(&workflow("wf-1")).await.unwrap();

    let mut updated = workflow("wf-1");
    updated.version = 2;
    updated.name = "Renamed".to_string();
    store.save_workflow(&updated).await.unwrap();

    let all = store.list_workflows().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].version, 2);
    assert_eq!(all[0].name, "Renamed");
  }

  #[tokio::test]
  async fn test_active_workflows() {
    let store = memory_store().await;
    store.save_workflow(&workflow("wf-b")).await.unwrap();
    store.save_workflow(&workflow("wf-a")).await.unwrap();
    store.save_workflow(&workflow("wf-c")).await.unwrap();

    assert!(store.list_active_workflows().await.unwrap().is_empty());

    let activated = store.set_active("wf-c", true).await.unwrap();
    assert!(activated.is_active);
    store.set_active("wf-a", true).await.unwrap();

    let ids: Vec<String> = store
      .list_active_workflows()
      .await
      .unwrap()
      .into_iter()
      .map(|w| w.id)
      .collect();
    assert_eq!(ids, vec!["wf-a", "wf-c"]);

    store.set_active("wf-a", false).await.unwrap();
    assert!(!store.get_workflow("wf-a").await.unwrap().is_active);
  }

  #[tokio::test]
  async fn test_save_never_activates() {
    let store = memory_store().await;
    store.save_workflow(&workflow("wf-1").active()).await.unwrap();
    assert!(store.list_active_workflows().await.unwrap().is_empty());

    store.set_active("wf-1", true).await.unwrap();
    let mut edited = workflow("wf-1").active();
    edited.version = 2;
    store.save_workflow(&edited).await.unwrap();

    let stored = store.get_workflow("wf-1").await.unwrap();
    assert_eq!(stored.version, 2);
    assert!(!stored.is_active);
  }

  #[tokio::test]
  async fn test_set_active_keeps_latest_definition() {
    let store = memory_store().await;
    store.save_workflow(&workflow("wf-1")).await.unwrap();

    let mut edited = workflow("wf-1");
    edited.name = "Edited".to_string();
    store.save_workflow(&edited).await.unwrap();

    let activated = store.set_active("wf-1", true).await.unwrap();
    assert_eq!(activated.name, "Edited");
    assert!(activated.is_active);
    assert_eq!(store.get_workflow("wf-1").await.unwrap().name, "Edited");

    assert!(matches!(
      store.set_active("missing", true).await,
      Err(StoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_append_and_list_runs() {
    let store = memory_store().await;
    let first = failed_outcome("run-1", "wf-1");
    store.append_run(&first).await.unwrap();
    store
      .append_run(&failed_outcome("run-2", "wf-2"))
      .await
      .unwrap();

    let runs = store.list_runs("wf-1").await.unwrap();
    assert_eq!(runs, vec![first]);
    assert_eq!(runs[0].failed_node(), Some("assign"));
  }

  #[tokio::test]
  async fn test_duplicate_run_id_is_rejected() {
    let store = memory_store().await;
    store
      .append_run(&failed_outcome("run-1", "wf-1"))
      .await
      .unwrap();

    assert!(matches!(
      store.append_run(&failed_outcome("run-1", "wf-1")).await,
      Err(StoreError::Duplicate(_))
    ));
    assert_eq!(store.list_runs("wf-1").await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_open_creates_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("careflow.db");

    let store = SqliteStore::open(&path).await.unwrap();
    store.save_workflow(&workflow("wf-1")).await.unwrap();
    assert!(path.exists());

    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(reopened.list_workflows().await.unwrap().len(), 1);
  }
}

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use careflow_workflow::{RunOutcome, Workflow};

use crate::{StoreError, WorkflowStore};

#[derive(Default)]
struct Inner {
  workflows: BTreeMap<String, Workflow>,
  runs: Vec<RunOutcome>,
  run_ids: HashSet<String>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
  async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
    let draft = Workflow {
      is_active: false,
      ..workflow.clone()
    };
    let mut inner = self.inner.write().await;
    inner.workflows.insert(draft.id.clone(), draft);
    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
    let inner = self.inner.read().await;
    inner
      .workflows
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))
  }

  async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
    let inner = self.inner.read().await;
    Ok(inner.workflows.values().cloned().collect())
  }

  async fn list_active_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .workflows
        .values()
        .filter(|w| w.is_active)
        .cloned()
        .collect(),
    )
  }

  async fn set_active(&self, workflow_id: &str, active: bool) -> Result<Workflow, StoreError> {
    let mut inner = self.inner.write().await;
    let workflow = inner
      .workflows
      .get_mut(workflow_id)
      .ok_or_else(|| StoreError::NotFound(format!("workflow {}", workflow_id)))?;
    workflow.is_active = active;
    workflow.updated_at = Utc::now();
    Ok(workflow.clone())
  }

  async fn append_run(&self, outcome: &RunOutcome) -> Result<(), StoreError> {
    let mut inner = self.inner.write().await;
    if !inner.run_ids.insert(outcome.run_id.clone()) {
      return Err(StoreError::Duplicate(format!("run {}", outcome.run_id)));
    }
    inner.runs.push(outcome.clone());
    Ok(())
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunOutcome>, StoreError> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .runs
        .iter()
        .filter(|run| run.workflow_id == workflow_id)
        .cloned()
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  use careflow_workflow::RunStatus;

  fn outcome(run_id: &str, workflow_id: &str) -> RunOutcome {
    RunOutcome {
      run_id: run_id.to_string(),
      workflow_id: workflow_id.to_string(),
      workflow_version: 1,
      status: RunStatus::Succeeded,
      success: true,
      started_at: Utc::now(),
      duration_ms: 3,
      results: BTreeMap::new(),
      path: Vec::new(),
      error: None,
    }
  }

  #[tokio::test]
  async fn test_save_and_get() {
    let store = MemoryStore::new();
    store
      .save_workflow(&Workflow::new("wf-b", "B"))
      .await
      .unwrap();
    store
      .save_workflow(&Workflow::new("wf-a", "A"))
      .await
      .unwrap();
    store.set_active("wf-a", true).await.unwrap();

    assert_eq!(store.get_workflow("wf-b").await.unwrap().name, "B");
    assert!(matches!(
      store.get_workflow("missing").await,
      Err(StoreError::NotFound(_))
    ));

    let ids: Vec<String> = store
      .list_workflows()
      .await
      .unwrap()
      .into_iter()
      .map(|w| w.id)
      .collect();
    assert_eq!(ids, vec!["wf-a", "wf-b"]);

    let active = store.list_active_workflows().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "wf-a");
  }

  #[tokio::test]
  async fn test_set_active_bumps_updated_at() {
    let store = MemoryStore::new();
    let workflow = Workflow::new("wf", "W");
    store.save_workflow(&workflow).await.unwrap();

    let updated = store.set_active("wf", true).await.unwrap();
    assert!(updated.is_active);
    assert!(updated.updated_at >= workflow.updated_at);
    assert_eq!(store.list_active_workflows().await.unwrap().len(), 1);

    store.set_active("wf", false).await.unwrap();
    assert!(store.list_active_workflows().await.unwrap().is_empty());
    assert!(matches!(
      store.set_active("nope", true).await,
      Err(StoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_save_stores_a_draft() {
    let store = MemoryStore::new();
    store
      .save_workflow(&Workflow::new("wf", "W").active())
      .await
      .unwrap();
    assert!(!store.get_workflow("wf").await.unwrap().is_active);

    store.set_active("wf", true).await.unwrap();
    store
      .save_workflow(&Workflow::new("wf", "Edited").active())
      .await
      .unwrap();

    let stored = store.get_workflow("wf").await.unwrap();
    assert_eq!(stored.name, "Edited");
    assert!(!stored.is_active);
    assert!(store.list_active_workflows().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_runs_are_append_only() {
    let store = MemoryStore::new();
    store.append_run(&outcome("r1", "wf")).await.unwrap();
    store.append_run(&outcome("r2", "other")).await.unwrap();
    store.append_run(&outcome("r3", "wf")).await.unwrap();

    assert!(matches!(
      store.append_run(&outcome("r1", "wf")).await,
      Err(StoreError::Duplicate(_))
    ));

    let runs: Vec<String> = store
      .list_runs("wf")
      .await
      .unwrap()
      .into_iter()
      .map(|r| r.run_id)
      .collect();
    assert_eq!(runs, vec!["r1", "r3"]);
  }
}

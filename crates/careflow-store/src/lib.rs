//! Careflow Store
//!
//! This crate provides the storage trait and implementations for workflow
//! definitions and run history.
//!
//! The [`WorkflowStore`] trait defines operations for:
//! - Saving and loading workflow definitions
//! - Listing the active workflows an event could start
//! - Appending immutable run outcomes and reading them back

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use careflow_workflow::{RunOutcome, Workflow};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A record with the same key already exists and may not be replaced.
  #[error("already exists: {0}")]
  Duplicate(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying schema migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage for workflow definitions and run outcomes.
///
/// Implementations must be safe for concurrent use; the engine never holds a
/// lock across a run.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
  /// Insert or replace a workflow definition.
  ///
  /// The stored copy is always inactive, whatever `is_active` says; only
  /// [`WorkflowStore::set_active`] turns a workflow on.
  async fn save_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

  /// Get a workflow by ID.
  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError>;

  /// List all workflows, ordered by id.
  async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

  /// List active workflows, ordered by id.
  async fn list_active_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

  /// Set the active flag and bump `updatedAt`. Returns the updated workflow.
  async fn set_active(&self, workflow_id: &str, active: bool) -> Result<Workflow, StoreError>;

  /// Append a run outcome. A run id can only be written once.
  async fn append_run(&self, outcome: &RunOutcome) -> Result<(), StoreError>;

  /// List run outcomes for a workflow, oldest first.
  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunOutcome>, StoreError>;
}

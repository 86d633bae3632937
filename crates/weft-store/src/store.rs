use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::state::{TaskState, TaskStateFilter, WorkflowState, WorkflowStateFilter};
use crate::types::{Execution, ExecutionFilter, ExecutionId, ExecutionStatus, ExecutionUpdate};
use crate::usage::UsageRow;

/// Fail with [`StoreError::Cancelled`] if the caller gave up before a
/// write began.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<(), StoreError> {
  if cancel.is_cancelled() {
    return Err(StoreError::Cancelled);
  }
  Ok(())
}

/// Persistence for raw execution records of every component kind.
///
/// Writes take a cancellation token that is checked before the write
/// begins; a write that started either completes or fails atomically.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
  /// Insert a new execution. Parent IDs must reference existing rows.
  async fn insert_execution(
    &self,
    execution: &Execution,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError>;

  async fn get_execution(&self, exec_id: &ExecutionId) -> Result<Execution, StoreError>;

  /// List executions matching `filter`, oldest first. No match is an
  /// empty list.
  async fn list_executions(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, StoreError>;

  /// Apply a lifecycle update and return the updated execution.
  async fn update_execution(
    &self,
    exec_id: &ExecutionId,
    update: &ExecutionUpdate,
    cancel: &CancellationToken,
  ) -> Result<Execution, StoreError>;
}

/// Workflow and task state projections.
#[async_trait]
pub trait StateStore: Send + Sync {
  /// Create or replace a workflow state keyed by its execution ID. The
  /// embedded task map is ignored.
  async fn upsert_workflow_state(
    &self,
    state: &WorkflowState,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError>;

  /// Load a workflow state with all of its task states in one
  /// transaction.
  async fn get_workflow_state(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<WorkflowState, StoreError>;

  /// Latest workflow state for a workflow ID.
  async fn get_workflow_state_by_id(&self, workflow_id: &str) -> Result<WorkflowState, StoreError>;

  async fn update_workflow_status(
    &self,
    workflow_exec_id: &ExecutionId,
    status: ExecutionStatus,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError>;

  /// Workflow states matching `filter`, each with its task states.
  async fn list_workflow_states(
    &self,
    filter: &WorkflowStateFilter,
  ) -> Result<Vec<WorkflowState>, StoreError>;

  /// Create or replace a task state keyed by its execution ID.
  async fn upsert_task_state(
    &self,
    state: &TaskState,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError>;

  async fn get_task_state(&self, task_exec_id: &ExecutionId) -> Result<TaskState, StoreError>;

  async fn list_task_states(&self, filter: &TaskStateFilter) -> Result<Vec<TaskState>, StoreError>;

  /// Task states of a workflow execution keyed by task ID.
  async fn list_tasks_in_workflow(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<BTreeMap<String, TaskState>, StoreError>;

  /// Direct children of a parallel, composite or collection task state.
  async fn list_child_task_states(
    &self,
    parent_state_id: &ExecutionId,
  ) -> Result<Vec<TaskState>, StoreError>;
}

/// Token usage rows and workflow-level summaries.
#[async_trait]
pub trait UsageLedger: Send + Sync {
  /// Insert a row, or replace every field of the existing row with the
  /// same key (task execution ID, or workflow execution ID for
  /// workflow-scoped rows). Callers accumulating counts must pre-sum or
  /// use [`UsageLedger::accumulate`].
  async fn upsert(&self, row: &UsageRow, cancel: &CancellationToken) -> Result<(), StoreError>;

  /// Insert a row, or add its counts to the existing row in a single
  /// statement. Returns the stored row.
  async fn accumulate(
    &self,
    delta: &UsageRow,
    cancel: &CancellationToken,
  ) -> Result<UsageRow, StoreError>;

  async fn get_by_task_exec_id(&self, task_exec_id: &ExecutionId) -> Result<UsageRow, StoreError>;

  /// The workflow-scoped row of a workflow execution.
  async fn get_by_workflow_exec_id(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<UsageRow, StoreError>;

  /// Aggregate every task-scoped row of a workflow execution.
  async fn summarize_by_workflow_exec_id(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<UsageRow, StoreError>;

  /// Summaries for several workflow executions. IDs without usage are
  /// absent from the result.
  async fn summaries_by_workflow_exec_ids(
    &self,
    workflow_exec_ids: &[ExecutionId],
  ) -> Result<BTreeMap<ExecutionId, UsageRow>, StoreError>;
}

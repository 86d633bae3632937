use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SqliteStore;
use crate::error::{Entity, StoreError};
use crate::state::{TaskState, TaskStateFilter, WorkflowState, WorkflowStateFilter};
use crate::store::{StateStore, ensure_active};
use crate::types::{ExecutionId, ExecutionStatus};

const WORKFLOW_STATE_COLUMNS: &str =
  "workflow_exec_id, workflow_id, status, input, output, error, created_at, updated_at";

const TASK_STATE_COLUMNS: &str = "task_exec_id, task_id, workflow_exec_id, workflow_id, \
  component, status, execution_type, parent_state_id, agent_id, tool_id, action_id, input, \
  output, error, created_at, updated_at";

async fn load_tasks(
  conn: &mut SqliteConnection,
  workflow_exec_id: &ExecutionId,
) -> Result<BTreeMap<String, TaskState>, StoreError> {
  let tasks: Vec<TaskState> = sqlx::query_as(&format!(
    "SELECT {TASK_STATE_COLUMNS} FROM task_states \
     WHERE workflow_exec_id = ? ORDER BY created_at ASC, task_exec_id ASC"
  ))
  .bind(workflow_exec_id)
  .fetch_all(conn)
  .await?;

  // A task ID that ran more than once keeps its latest state.
  Ok(
    tasks
      .into_iter()
      .map(|task| (task.task_id.clone(), task))
      .collect(),
  )
}

#[async_trait]
impl StateStore for SqliteStore {
  async fn upsert_workflow_state(
    &self,
    state: &WorkflowState,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError> {
    ensure_active(cancel)?;

    sqlx::query(&format!(
      "INSERT INTO workflow_states ({WORKFLOW_STATE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
       ON CONFLICT (workflow_exec_id) DO UPDATE SET \
         workflow_id = excluded.workflow_id, \
         status = excluded.status, \
         input = excluded.input, \
         output = excluded.output, \
         error = excluded.error, \
         updated_at = excluded.updated_at"
    ))
    .bind(&state.workflow_exec_id)
    .bind(&state.workflow_id)
    .bind(state.status)
    .bind(&state.input)
    .bind(&state.output)
    .bind(&state.error)
    .bind(state.created_at)
    .bind(state.updated_at)
    .execute(&self.pool)
    .await?;

    info!(
      workflow_exec_id = %state.workflow_exec_id,
      status = ?state.status,
      "upserted workflow state"
    );
    Ok(())
  }

  async fn get_workflow_state(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<WorkflowState, StoreError> {
    let mut tx = self.pool.begin().await?;

    let mut state: WorkflowState = sqlx::query_as(&format!(
      "SELECT {WORKFLOW_STATE_COLUMNS} FROM workflow_states WHERE workflow_exec_id = ?"
    ))
    .bind(workflow_exec_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::WorkflowState, workflow_exec_id))?;

    state.tasks = load_tasks(&mut tx, workflow_exec_id).await?;
    tx.commit().await?;
    Ok(state)
  }

  async fn get_workflow_state_by_id(&self, workflow_id: &str) -> Result<WorkflowState, StoreError> {
    let mut tx = self.pool.begin().await?;

    let mut state: WorkflowState = sqlx::query_as(&format!(
      "SELECT {WORKFLOW_STATE_COLUMNS} FROM workflow_states WHERE workflow_id = ? \
       ORDER BY created_at DESC, workflow_exec_id DESC LIMIT 1"
    ))
    .bind(workflow_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::WorkflowState, workflow_id))?;

    state.tasks = load_tasks(&mut tx, &state.workflow_exec_id).await?;
    tx.commit().await?;
    Ok(state)
  }

  async fn update_workflow_status(
    &self,
    workflow_exec_id: &ExecutionId,
    status: ExecutionStatus,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError> {
    ensure_active(cancel)?;

    let result = sqlx::query(
      "UPDATE workflow_states SET status = ?, updated_at = ? WHERE workflow_exec_id = ?",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(workflow_exec_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::not_found(
        Entity::WorkflowState,
        workflow_exec_id,
      ));
    }
    info!(workflow_exec_id = %workflow_exec_id, status = ?status, "updated workflow status");
    Ok(())
  }

  async fn list_workflow_states(
    &self,
    filter: &WorkflowStateFilter,
  ) -> Result<Vec<WorkflowState>, StoreError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
      "SELECT {WORKFLOW_STATE_COLUMNS} FROM workflow_states WHERE 1 = 1"
    ));
    if let Some(status) = filter.status {
      query.push(" AND status = ").push_bind(status);
    }
    if let Some(workflow_id) = &filter.workflow_id {
      query.push(" AND workflow_id = ").push_bind(workflow_id.clone());
    }
    if let Some(workflow_exec_id) = &filter.workflow_exec_id {
      query
        .push(" AND workflow_exec_id = ")
        .push_bind(workflow_exec_id.clone());
    }
    query.push(" ORDER BY created_at ASC, workflow_exec_id ASC");

    let mut tx = self.pool.begin().await?;
    let mut states: Vec<WorkflowState> = query
      .build_query_as()
      .fetch_all(&mut *tx)
      .await?;
    for state in &mut states {
      state.tasks = load_tasks(&mut tx, &state.workflow_exec_id).await?;
    }
    tx.commit().await?;

    debug!(count = states.len(), "listed workflow states");
    Ok(states)
  }

  async fn upsert_task_state(
    &self,
    state: &TaskState,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError> {
    ensure_active(cancel)?;

    sqlx::query(&format!(
      "INSERT INTO task_states ({TASK_STATE_COLUMNS}) \
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
       ON CONFLICT (task_exec_id) DO UPDATE SET \
         task_id = excluded.task_id, \
         workflow_exec_id = excluded.workflow_exec_id, \
         workflow_id = excluded.workflow_id, \
         component = excluded.component, \
         status = excluded.status, \
         execution_type = excluded.execution_type, \
         parent_state_id = excluded.parent_state_id, \
         agent_id = excluded.agent_id, \
         tool_id = excluded.tool_id, \
         action_id = excluded.action_id, \
         input = excluded.input, \
         output = excluded.output, \
         error = excluded.error, \
         updated_at = excluded.updated_at"
    ))
    .bind(&state.task_exec_id)
    .bind(&state.task_id)
    .bind(&state.workflow_exec_id)
    .bind(&state.workflow_id)
    .bind(state.component)
    .bind(state.status)
    .bind(state.execution_type)
    .bind(&state.parent_state_id)
    .bind(&state.agent_id)
    .bind(&state.tool_id)
    .bind(&state.action_id)
    .bind(&state.input)
    .bind(&state.output)
    .bind(&state.error)
    .bind(state.created_at)
    .bind(state.updated_at)
    .execute(&self.pool)
    .await?;

    info!(
      task_exec_id = %state.task_exec_id,
      task_id = %state.task_id,
      status = ?state.status,
      "upserted task state"
    );
    Ok(())
  }

  async fn get_task_state(&self, task_exec_id: &ExecutionId) -> Result<TaskState, StoreError> {
    sqlx::query_as(&format!(
      "SELECT {TASK_STATE_COLUMNS} FROM task_states WHERE task_exec_id = ?"
    ))
    .bind(task_exec_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::TaskState, task_exec_id))
  }

  async fn list_task_states(&self, filter: &TaskStateFilter) -> Result<Vec<TaskState>, StoreError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
      "SELECT {TASK_STATE_COLUMNS} FROM task_states WHERE 1 = 1"
    ));
    if let Some(status) = filter.status {
      query.push(" AND status = ").push_bind(status);
    }
    if let Some(workflow_id) = &filter.workflow_id {
      query.push(" AND workflow_id = ").push_bind(workflow_id.clone());
    }
    if let Some(workflow_exec_id) = &filter.workflow_exec_id {
      query
        .push(" AND workflow_exec_id = ")
        .push_bind(workflow_exec_id.clone());
    }
    if let Some(task_id) = &filter.task_id {
      query.push(" AND task_id = ").push_bind(task_id.clone());
    }
    if let Some(execution_type) = filter.execution_type {
      query.push(" AND execution_type = ").push_bind(execution_type);
    }
    if let Some(parent_state_id) = &filter.parent_state_id {
      query
        .push(" AND parent_state_id = ")
        .push_bind(parent_state_id.clone());
    }
    if let Some(agent_id) = &filter.agent_id {
      query.push(" AND agent_id = ").push_bind(agent_id.clone());
    }
    if let Some(tool_id) = &filter.tool_id {
      query.push(" AND tool_id = ").push_bind(tool_id.clone());
    }
    query.push(" ORDER BY created_at ASC, task_exec_id ASC");

    Ok(query.build_query_as().fetch_all(&self.pool).await?)
  }

  async fn list_tasks_in_workflow(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<BTreeMap<String, TaskState>, StoreError> {
    let mut conn = self.pool.acquire().await?;
    load_tasks(&mut conn, workflow_exec_id).await
  }

  async fn list_child_task_states(
    &self,
    parent_state_id: &ExecutionId,
  ) -> Result<Vec<TaskState>, StoreError> {
    let filter = TaskStateFilter {
      parent_state_id: Some(parent_state_id.clone()),
      ..TaskStateFilter::default()
    };
    self.list_task_states(&filter).await
  }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SqliteStore;
use crate::error::{Entity, StoreError};
use crate::store::{ExecutionStore, ensure_active};
use crate::types::{Execution, ExecutionFilter, ExecutionId, ExecutionUpdate};

const EXECUTION_COLUMNS: &str = "exec_id, component, component_id, status, workflow_id, \
  workflow_exec_id, task_id, task_exec_id, env, input, output, error, source, created_at, \
  updated_at";

#[async_trait]
impl ExecutionStore for SqliteStore {
  async fn insert_execution(
    &self,
    execution: &Execution,
    cancel: &CancellationToken,
  ) -> Result<(), StoreError> {
    ensure_active(cancel)?;

    sqlx::query(&format!(
      "INSERT INTO executions ({EXECUTION_COLUMNS}) \
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&execution.exec_id)
    .bind(execution.component)
    .bind(&execution.component_id)
    .bind(execution.status)
    .bind(&execution.workflow_id)
    .bind(&execution.workflow_exec_id)
    .bind(&execution.task_id)
    .bind(&execution.task_exec_id)
    .bind(&execution.env)
    .bind(&execution.input)
    .bind(&execution.output)
    .bind(&execution.error)
    .bind(&execution.source)
    .bind(execution.created_at)
    .bind(execution.updated_at)
    .execute(&self.pool)
    .await?;

    info!(
      exec_id = %execution.exec_id,
      component = %execution.component,
      component_id = %execution.component_id,
      workflow_exec_id = %execution.workflow_exec_id,
      "created execution"
    );
    Ok(())
  }

  async fn get_execution(&self, exec_id: &ExecutionId) -> Result<Execution, StoreError> {
    sqlx::query_as(&format!(
      "SELECT {EXECUTION_COLUMNS} FROM executions WHERE exec_id = ?"
    ))
    .bind(exec_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::Execution, exec_id))
  }

  async fn list_executions(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, StoreError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
      "SELECT {EXECUTION_COLUMNS} FROM executions WHERE 1 = 1"
    ));

    if !filter.components.is_empty() {
      query.push(" AND component IN (");
      let mut components = query.separated(", ");
      for component in &filter.components {
        components.push_bind(*component);
      }
      components.push_unseparated(")");
    }
    if let Some(status) = filter.status {
      query.push(" AND status = ").push_bind(status);
    }
    if let Some(component_id) = &filter.component_id {
      query.push(" AND component_id = ").push_bind(component_id.clone());
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
    if let Some(task_exec_id) = &filter.task_exec_id {
      query.push(" AND task_exec_id = ").push_bind(task_exec_id.clone());
    }
    query.push(" ORDER BY created_at ASC, exec_id ASC");

    debug!(sql = query.sql(), "listing executions");
    let executions = query
      .build_query_as::<Execution>()
      .fetch_all(&self.pool)
      .await?;
    Ok(executions)
  }

  async fn update_execution(
    &self,
    exec_id: &ExecutionId,
    update: &ExecutionUpdate,
    cancel: &CancellationToken,
  ) -> Result<Execution, StoreError> {
    ensure_active(cancel)?;

    let execution: Execution = sqlx::query_as(&format!(
      "UPDATE executions \
       SET status = ?, output = COALESCE(?, output), error = COALESCE(?, error), updated_at = ? \
       WHERE exec_id = ? \
       RETURNING {EXECUTION_COLUMNS}"
    ))
    .bind(update.status)
    .bind(update.output.as_ref().map(Json))
    .bind(update.error.as_ref().map(Json))
    .bind(Utc::now())
    .bind(exec_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::Execution, exec_id))?;

    info!(exec_id = %exec_id, status = ?update.status, "updated execution");
    Ok(execution)
  }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SqliteStore;
use crate::error::{Entity, StoreError};
use crate::store::{UsageLedger, ensure_active};
use crate::types::ExecutionId;
use crate::usage::{UsageRow, summarize};

const USAGE_COLUMNS: &str = "component, workflow_exec_id, task_exec_id, agent_id, provider, \
  model, prompt_tokens, completion_tokens, total_tokens, reasoning_tokens, \
  cached_prompt_tokens, input_audio_tokens, output_audio_tokens, created_at, updated_at";

/// Task-scoped rows with their workflow execution resolved through the
/// owning task execution when the row itself does not carry it.
const TASK_USAGE_SELECT: &str = "SELECT u.component, \
  COALESCE(u.workflow_exec_id, e.workflow_exec_id) AS workflow_exec_id, u.task_exec_id, \
  u.agent_id, u.provider, u.model, u.prompt_tokens, u.completion_tokens, u.total_tokens, \
  u.reasoning_tokens, u.cached_prompt_tokens, u.input_audio_tokens, u.output_audio_tokens, \
  u.created_at, u.updated_at \
  FROM execution_usage u JOIN executions e ON e.exec_id = u.task_exec_id \
  WHERE u.task_exec_id IS NOT NULL";

/// Conflict target matching the partial unique index the row falls under.
fn conflict_target(row: &UsageRow) -> &'static str {
  if row.task_exec_id.is_some() {
    "ON CONFLICT (task_exec_id) WHERE task_exec_id IS NOT NULL"
  } else {
    "ON CONFLICT (workflow_exec_id) WHERE task_exec_id IS NULL"
  }
}

fn validated(row: &UsageRow) -> Result<(), StoreError> {
  row.validate().inspect_err(|err| {
    warn!(
      task_exec_id = ?row.task_exec_id,
      workflow_exec_id = ?row.workflow_exec_id,
      error = %err,
      "rejected usage row"
    )
  })
}

#[async_trait]
impl UsageLedger for SqliteStore {
  async fn upsert(&self, row: &UsageRow, cancel: &CancellationToken) -> Result<(), StoreError> {
    validated(row)?;
    ensure_active(cancel)?;

    let sql = format!(
      "INSERT INTO execution_usage ({USAGE_COLUMNS}) \
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
       {} DO UPDATE SET \
         component = excluded.component, \
         workflow_exec_id = excluded.workflow_exec_id, \
         agent_id = excluded.agent_id, \
         provider = excluded.provider, \
         model = excluded.model, \
         prompt_tokens = excluded.prompt_tokens, \
         completion_tokens = excluded.completion_tokens, \
         total_tokens = excluded.total_tokens, \
         reasoning_tokens = excluded.reasoning_tokens, \
         cached_prompt_tokens = excluded.cached_prompt_tokens, \
         input_audio_tokens = excluded.input_audio_tokens, \
         output_audio_tokens = excluded.output_audio_tokens, \
         updated_at = excluded.updated_at",
      conflict_target(row)
    );
    sqlx::query(&sql)
      .bind(row.component)
      .bind(&row.workflow_exec_id)
      .bind(&row.task_exec_id)
      .bind(&row.agent_id)
      .bind(&row.provider)
      .bind(&row.model)
      .bind(row.prompt_tokens)
      .bind(row.completion_tokens)
      .bind(row.total_tokens)
      .bind(row.reasoning_tokens)
      .bind(row.cached_prompt_tokens)
      .bind(row.input_audio_tokens)
      .bind(row.output_audio_tokens)
      .bind(row.created_at)
      .bind(row.updated_at)
      .execute(&self.pool)
      .await?;

    info!(
      task_exec_id = ?row.task_exec_id,
      workflow_exec_id = ?row.workflow_exec_id,
      total_tokens = row.total_tokens,
      "upserted usage"
    );
    Ok(())
  }

  async fn accumulate(
    &self,
    delta: &UsageRow,
    cancel: &CancellationToken,
  ) -> Result<UsageRow, StoreError> {
    validated(delta)?;
    ensure_active(cancel)?;

    let sql = format!(
      "INSERT INTO execution_usage ({USAGE_COLUMNS}) \
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
       {} DO UPDATE SET \
         workflow_exec_id = COALESCE(excluded.workflow_exec_id, execution_usage.workflow_exec_id), \
         agent_id = COALESCE(excluded.agent_id, execution_usage.agent_id), \
         provider = excluded.provider, \
         model = excluded.model, \
         prompt_tokens = execution_usage.prompt_tokens + excluded.prompt_tokens, \
         completion_tokens = execution_usage.completion_tokens + excluded.completion_tokens, \
         total_tokens = execution_usage.total_tokens + excluded.total_tokens, \
         reasoning_tokens = {}, \
         cached_prompt_tokens = {}, \
         input_audio_tokens = {}, \
         output_audio_tokens = {}, \
         updated_at = excluded.updated_at \
       RETURNING {USAGE_COLUMNS}",
      conflict_target(delta),
      add_optional("reasoning_tokens"),
      add_optional("cached_prompt_tokens"),
      add_optional("input_audio_tokens"),
      add_optional("output_audio_tokens"),
    );
    let row: UsageRow = sqlx::query_as(&sql)
      .bind(delta.component)
      .bind(&delta.workflow_exec_id)
      .bind(&delta.task_exec_id)
      .bind(&delta.agent_id)
      .bind(&delta.provider)
      .bind(&delta.model)
      .bind(delta.prompt_tokens)
      .bind(delta.completion_tokens)
      .bind(delta.total_tokens)
      .bind(delta.reasoning_tokens)
      .bind(delta.cached_prompt_tokens)
      .bind(delta.input_audio_tokens)
      .bind(delta.output_audio_tokens)
      .bind(delta.created_at)
      .bind(delta.updated_at)
      .fetch_one(&self.pool)
      .await?;

    info!(
      task_exec_id = ?row.task_exec_id,
      workflow_exec_id = ?row.workflow_exec_id,
      total_tokens = row.total_tokens,
      "accumulated usage"
    );
    Ok(row)
  }

  async fn get_by_task_exec_id(&self, task_exec_id: &ExecutionId) -> Result<UsageRow, StoreError> {
    sqlx::query_as(&format!(
      "SELECT {USAGE_COLUMNS} FROM execution_usage WHERE task_exec_id = ? \
       ORDER BY updated_at DESC LIMIT 1"
    ))
    .bind(task_exec_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::Usage, task_exec_id))
  }

  async fn get_by_workflow_exec_id(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<UsageRow, StoreError> {
    sqlx::query_as(&format!(
      "SELECT {USAGE_COLUMNS} FROM execution_usage \
       WHERE workflow_exec_id = ? AND task_exec_id IS NULL"
    ))
    .bind(workflow_exec_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::not_found(Entity::Usage, workflow_exec_id))
  }

  async fn summarize_by_workflow_exec_id(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<UsageRow, StoreError> {
    let rows: Vec<UsageRow> = sqlx::query_as(&format!(
      "{TASK_USAGE_SELECT} AND COALESCE(u.workflow_exec_id, e.workflow_exec_id) = ? \
       ORDER BY u.created_at ASC"
    ))
    .bind(workflow_exec_id)
    .fetch_all(&self.pool)
    .await?;

    debug!(workflow_exec_id = %workflow_exec_id, rows = rows.len(), "summarizing usage");
    summarize(workflow_exec_id, &rows)
      .ok_or_else(|| StoreError::not_found(Entity::Usage, workflow_exec_id))
  }

  async fn summaries_by_workflow_exec_ids(
    &self,
    workflow_exec_ids: &[ExecutionId],
  ) -> Result<BTreeMap<ExecutionId, UsageRow>, StoreError> {
    if workflow_exec_ids.is_empty() {
      return Ok(BTreeMap::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(TASK_USAGE_SELECT);
    query.push(" AND COALESCE(u.workflow_exec_id, e.workflow_exec_id) IN (");
    let mut ids = query.separated(", ");
    for id in workflow_exec_ids {
      ids.push_bind(id.clone());
    }
    ids.push_unseparated(")");
    query.push(" ORDER BY u.created_at ASC");

    let rows: Vec<UsageRow> = query.build_query_as().fetch_all(&self.pool).await?;

    let mut grouped: BTreeMap<ExecutionId, Vec<UsageRow>> = BTreeMap::new();
    for row in rows {
      if let Some(id) = row.workflow_exec_id.clone() {
        grouped.entry(id).or_default().push(row);
      }
    }

    Ok(
      grouped
        .into_iter()
        .filter_map(|(id, rows)| summarize(&id, &rows).map(|summary| (id, summary)))
        .collect(),
    )
  }
}

/// Add an optional count, leaving it NULL until some report carries it.
fn add_optional(column: &str) -> String {
  format!(
    "CASE WHEN excluded.{column} IS NULL THEN execution_usage.{column} \
     ELSE COALESCE(execution_usage.{column}, 0) + excluded.{column} END"
  )
}

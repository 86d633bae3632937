//! Per-component execution repositories.
//!
//! Each repository creates executions of one component kind and answers
//! that kind's list queries. Creation re-derives the trigger input from the
//! stored workflow execution and the environment by walking up the parent
//! chain, so every row is self-contained.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio_util::sync::CancellationToken;
use weft_config::{EnvMap, Input};
use weft_normalizer::{Normalizer, Scope};

use crate::error::{Entity, ParentLevel, StoreError};
use crate::store::ExecutionStore;
use crate::types::{Component, Execution, ExecutionFilter, ExecutionId, ExecutionStatus};

mod agent;
mod task;
mod tool;
mod workflow;

pub use agent::AgentRepo;
pub use task::TaskRepo;
pub use tool::ToolRepo;
pub use workflow::WorkflowRepo;

/// Load the execution a new row depends on. A missing row, or one of the
/// wrong kind, is reported as a missing parent at `level`.
pub(crate) async fn load_parent(
  store: &dyn ExecutionStore,
  level: ParentLevel,
  exec_id: &ExecutionId,
) -> Result<Execution, StoreError> {
  let expected = match level {
    ParentLevel::Workflow => Component::Workflow,
    ParentLevel::Task => Component::Task,
  };
  match store.get_execution(exec_id).await {
    Ok(execution) if execution.component == expected => Ok(execution),
    Ok(_) => Err(StoreError::ParentNotFound {
      level,
      exec_id: exec_id.clone(),
    }),
    Err(err) if err.is_not_found() => Err(StoreError::ParentNotFound {
      level,
      exec_id: exec_id.clone(),
    }),
    Err(err) => Err(err),
  }
}

/// Fetch an execution, treating a row of another kind as missing.
pub(crate) async fn get_component(
  store: &dyn ExecutionStore,
  component: Component,
  exec_id: &ExecutionId,
) -> Result<Execution, StoreError> {
  let execution = store.get_execution(exec_id).await?;
  if execution.component != component {
    return Err(StoreError::not_found(Entity::Execution, exec_id));
  }
  Ok(execution)
}

pub(crate) async fn list(
  store: &dyn ExecutionStore,
  filter: ExecutionFilter,
) -> Result<Vec<Execution>, StoreError> {
  store.list_executions(&filter).await
}

/// Template scope of a stored workflow execution.
pub(crate) fn scope_of(workflow: &Execution) -> Scope {
  Scope::new(workflow.workflow_id.clone(), workflow.input.0.clone())
}

/// An agent or tool about to be recorded under a task execution.
pub(crate) struct Leaf<'a> {
  pub component: Component,
  pub component_id: &'a str,
  pub exec_id: &'a ExecutionId,
  pub workflow_exec_id: &'a ExecutionId,
  pub task_exec_id: &'a ExecutionId,
  pub env: Option<&'a EnvMap>,
  pub with: Option<&'a Input>,
  pub time: DateTime<Utc>,
  pub source: &'a str,
}

/// Create an agent or tool execution. Its env is the task's env with its
/// own layered on top. Its input is its own rendered `with`, overlaid by
/// the task execution's input.
pub(crate) async fn create_leaf(
  store: &dyn ExecutionStore,
  normalizer: &Normalizer,
  leaf: Leaf<'_>,
  cancel: &CancellationToken,
) -> Result<Execution, StoreError> {
  let workflow = load_parent(store, ParentLevel::Workflow, leaf.workflow_exec_id).await?;
  let task = load_parent(store, ParentLevel::Task, leaf.task_exec_id).await?;
  let scope = scope_of(&workflow);

  let env = normalizer.resolve_env(leaf.component_id, &task.env.0, leaf.env, &scope)?;
  let mut input = match leaf.with {
    Some(with) => normalizer.render_input(leaf.component_id, with, &env, &scope)?,
    None => Input::new(),
  };
  for (key, value) in &task.input.0 {
    input.insert(key.clone(), value.clone());
  }

  let execution = Execution {
    exec_id: leaf.exec_id.clone(),
    component: leaf.component,
    component_id: leaf.component_id.to_string(),
    status: ExecutionStatus::Pending,
    workflow_id: workflow.workflow_id.clone(),
    workflow_exec_id: workflow.exec_id.clone(),
    task_id: task.task_id.clone(),
    task_exec_id: Some(task.exec_id.clone()),
    env: Json(env),
    input: Json(input),
    output: None,
    error: None,
    source: leaf.source.to_string(),
    created_at: leaf.time,
    updated_at: leaf.time,
  };
  store.insert_execution(&execution, cancel).await?;
  Ok(execution)
}

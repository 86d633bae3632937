use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use weft_config::Input;

use crate::types::{Component, ExecutionError, ExecutionId, ExecutionStatus, ExecutionType};

/// Queryable projection of a workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowState {
  pub workflow_exec_id: ExecutionId,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub input: Option<Json<Input>>,
  pub output: Option<Json<Value>>,
  pub error: Option<Json<ExecutionError>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Task states of this workflow execution keyed by task ID. Loaded on
  /// every read, never persisted with the workflow row.
  #[sqlx(skip)]
  #[serde(default)]
  pub tasks: BTreeMap<String, TaskState>,
}

/// Queryable projection of a task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskState {
  pub task_exec_id: ExecutionId,
  pub task_id: String,
  pub workflow_exec_id: ExecutionId,
  pub workflow_id: String,
  pub component: Component,
  pub status: ExecutionStatus,
  pub execution_type: ExecutionType,
  /// Task state of the parallel, composite or collection parent.
  pub parent_state_id: Option<ExecutionId>,
  pub agent_id: Option<String>,
  pub tool_id: Option<String>,
  pub action_id: Option<String>,
  pub input: Option<Json<Input>>,
  pub output: Option<Json<Value>>,
  pub error: Option<Json<ExecutionError>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
  pub fn new(workflow_id: impl Into<String>, workflow_exec_id: ExecutionId) -> Self {
    let now = Utc::now();
    Self {
      workflow_exec_id,
      workflow_id: workflow_id.into(),
      status: ExecutionStatus::Pending,
      input: None,
      output: None,
      error: None,
      created_at: now,
      updated_at: now,
      tasks: BTreeMap::new(),
    }
  }
}

impl TaskState {
  /// A pending basic task state belonging to `workflow`.
  pub fn new(
    workflow: &WorkflowState,
    task_id: impl Into<String>,
    task_exec_id: ExecutionId,
  ) -> Self {
    let now = Utc::now();
    Self {
      task_exec_id,
      task_id: task_id.into(),
      workflow_exec_id: workflow.workflow_exec_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
      component: Component::Task,
      status: ExecutionStatus::Pending,
      execution_type: ExecutionType::Basic,
      parent_state_id: None,
      agent_id: None,
      tool_id: None,
      action_id: None,
      input: None,
      output: None,
      error: None,
      created_at: now,
      updated_at: now,
    }
  }
}

/// Filter for listing workflow states; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowStateFilter {
  pub status: Option<ExecutionStatus>,
  pub workflow_id: Option<String>,
  pub workflow_exec_id: Option<ExecutionId>,
}

/// Filter for listing task states; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStateFilter {
  pub status: Option<ExecutionStatus>,
  pub workflow_id: Option<String>,
  pub workflow_exec_id: Option<ExecutionId>,
  pub task_id: Option<String>,
  pub execution_type: Option<ExecutionType>,
  pub parent_state_id: Option<ExecutionId>,
  pub agent_id: Option<String>,
  pub tool_id: Option<String>,
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;
use weft_config::{EnvMap, Input, TaskType};

/// Opaque execution identifier. New IDs are UUIDv7 strings, so they sort
/// by creation time.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
  pub fn new() -> Self {
    Self(Uuid::now_v7().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for ExecutionId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for ExecutionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for ExecutionId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

impl From<&str> for ExecutionId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

/// Kind of component an execution ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Component {
  Workflow,
  Task,
  Agent,
  Tool,
}

impl Component {
  pub fn as_str(&self) -> &'static str {
    match self {
      Component::Workflow => "workflow",
      Component::Task => "task",
      Component::Agent => "agent",
      Component::Tool => "tool",
    }
  }
}

impl fmt::Display for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Status of an execution or state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Pending,
  Running,
  Success,
  Failed,
}

impl ExecutionStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
  }
}

/// Task kind recorded on a task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionType {
  Basic,
  Parallel,
  Composite,
  Collection,
  Decision,
  Wait,
}

impl From<TaskType> for ExecutionType {
  fn from(task_type: TaskType) -> Self {
    match task_type {
      TaskType::Basic => ExecutionType::Basic,
      TaskType::Parallel => ExecutionType::Parallel,
      TaskType::Composite => ExecutionType::Composite,
      TaskType::Collection => ExecutionType::Collection,
      TaskType::Decision => ExecutionType::Decision,
      TaskType::Wait => ExecutionType::Wait,
    }
  }
}

/// Error recorded on a failed execution or state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<Value>,
}

impl ExecutionError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      code: None,
      details: None,
    }
  }
}

/// One run of a workflow, task, agent or tool, as stored in the database.
///
/// A row carries its full ancestry: a task execution's `task_exec_id` is
/// its own ID, and a workflow execution's `workflow_exec_id` is its own ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Execution {
  pub exec_id: ExecutionId,
  pub component: Component,
  /// Workflow, task, agent or tool ID from the configuration.
  pub component_id: String,
  pub status: ExecutionStatus,
  pub workflow_id: String,
  pub workflow_exec_id: ExecutionId,
  pub task_id: Option<String>,
  pub task_exec_id: Option<ExecutionId>,
  /// Environment after merging every ancestor level.
  pub env: Json<EnvMap>,
  pub input: Json<Input>,
  pub output: Option<Json<Value>>,
  pub error: Option<Json<ExecutionError>>,
  /// Free-text tag supplied by the dispatch layer.
  pub source: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Lifecycle mutation applied to an existing execution. Output and error
/// are only overwritten when present.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
  pub status: ExecutionStatus,
  pub output: Option<Value>,
  pub error: Option<ExecutionError>,
}

impl ExecutionUpdate {
  pub fn status(status: ExecutionStatus) -> Self {
    Self {
      status,
      output: None,
      error: None,
    }
  }

  pub fn succeeded(output: Value) -> Self {
    Self {
      status: ExecutionStatus::Success,
      output: Some(output),
      error: None,
    }
  }

  pub fn failed(error: ExecutionError) -> Self {
    Self {
      status: ExecutionStatus::Failed,
      output: None,
      error: Some(error),
    }
  }
}

/// Filter for listing executions; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionFilter {
  pub components: Vec<Component>,
  pub status: Option<ExecutionStatus>,
  pub component_id: Option<String>,
  pub workflow_id: Option<String>,
  pub workflow_exec_id: Option<ExecutionId>,
  pub task_id: Option<String>,
  pub task_exec_id: Option<ExecutionId>,
}

impl ExecutionFilter {
  pub fn components(components: &[Component]) -> Self {
    Self {
      components: components.to_vec(),
      ..Self::default()
    }
  }

  pub fn with_status(mut self, status: ExecutionStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_component_id(mut self, id: impl Into<String>) -> Self {
    self.component_id = Some(id.into());
    self
  }

  pub fn with_workflow_id(mut self, id: impl Into<String>) -> Self {
    self.workflow_id = Some(id.into());
    self
  }

  pub fn with_workflow_exec_id(mut self, id: &ExecutionId) -> Self {
    self.workflow_exec_id = Some(id.clone());
    self
  }

  pub fn with_task_id(mut self, id: impl Into<String>) -> Self {
    self.task_id = Some(id.into());
    self
  }

  pub fn with_task_exec_id(mut self, id: &ExecutionId) -> Self {
    self.task_exec_id = Some(id.clone());
    self
  }
}

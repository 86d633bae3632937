//! Creation metadata supplied by the dispatch layer.
//!
//! The store does not generate these IDs; the caller allocates them (see
//! [`crate::ExecutionId::new`]) and announces them through its own
//! transport before the record is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ExecutionId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
  pub workflow_id: String,
  pub workflow_exec_id: ExecutionId,
  pub time: DateTime<Utc>,
  pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
  pub workflow_id: String,
  pub workflow_exec_id: ExecutionId,
  pub task_id: String,
  pub task_exec_id: ExecutionId,
  pub time: DateTime<Utc>,
  pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
  pub workflow_id: String,
  pub workflow_exec_id: ExecutionId,
  pub task_id: String,
  pub task_exec_id: ExecutionId,
  pub agent_id: String,
  pub agent_exec_id: ExecutionId,
  pub time: DateTime<Utc>,
  pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
  pub workflow_id: String,
  pub workflow_exec_id: ExecutionId,
  pub task_id: String,
  pub task_exec_id: ExecutionId,
  pub tool_id: String,
  pub tool_exec_id: ExecutionId,
  pub time: DateTime<Utc>,
  pub source: String,
}

impl WorkflowMetadata {
  /// Metadata for a new workflow execution with a fresh ID.
  pub fn new(workflow_id: impl Into<String>, source: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      workflow_exec_id: ExecutionId::new(),
      time: Utc::now(),
      source: source.into(),
    }
  }

  /// Metadata for a task running under this workflow execution.
  pub fn task(&self, task_id: impl Into<String>) -> TaskMetadata {
    TaskMetadata {
      workflow_id: self.workflow_id.clone(),
      workflow_exec_id: self.workflow_exec_id.clone(),
      task_id: task_id.into(),
      task_exec_id: ExecutionId::new(),
      time: Utc::now(),
      source: self.source.clone(),
    }
  }
}

impl TaskMetadata {
  /// Metadata for an agent running under this task execution.
  pub fn agent(&self, agent_id: impl Into<String>) -> AgentMetadata {
    AgentMetadata {
      workflow_id: self.workflow_id.clone(),
      workflow_exec_id: self.workflow_exec_id.clone(),
      task_id: self.task_id.clone(),
      task_exec_id: self.task_exec_id.clone(),
      agent_id: agent_id.into(),
      agent_exec_id: ExecutionId::new(),
      time: Utc::now(),
      source: self.source.clone(),
    }
  }

  /// Metadata for a tool running under this task execution.
  pub fn tool(&self, tool_id: impl Into<String>) -> ToolMetadata {
    ToolMetadata {
      workflow_id: self.workflow_id.clone(),
      workflow_exec_id: self.workflow_exec_id.clone(),
      task_id: self.task_id.clone(),
      task_exec_id: self.task_exec_id.clone(),
      tool_id: tool_id.into(),
      tool_exec_id: ExecutionId::new(),
      time: Utc::now(),
      source: self.source.clone(),
    }
  }
}

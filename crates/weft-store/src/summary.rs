use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Component, Execution, ExecutionId, ExecutionStatus};

/// Uniform view of an execution of any component kind, for transport to
/// callers. Component-specific ID fields are set only for that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
  pub exec_id: ExecutionId,
  pub status: ExecutionStatus,
  pub component: Component,
  pub workflow_id: String,
  pub workflow_exec_id: ExecutionId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task_exec_id: Option<ExecutionId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub agent_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub agent_exec_id: Option<ExecutionId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_exec_id: Option<ExecutionId>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<&Execution> for ExecutionSummary {
  fn from(execution: &Execution) -> Self {
    let own = || Some(execution.exec_id.clone());
    let own_id = || Some(execution.component_id.clone());
    let (agent_id, agent_exec_id, tool_id, tool_exec_id) = match execution.component {
      Component::Agent => (own_id(), own(), None, None),
      Component::Tool => (None, None, own_id(), own()),
      Component::Workflow | Component::Task => (None, None, None, None),
    };

    Self {
      exec_id: execution.exec_id.clone(),
      status: execution.status,
      component: execution.component,
      workflow_id: execution.workflow_id.clone(),
      workflow_exec_id: execution.workflow_exec_id.clone(),
      task_id: execution.task_id.clone(),
      task_exec_id: execution.task_exec_id.clone(),
      agent_id,
      agent_exec_id,
      tool_id,
      tool_exec_id,
      created_at: execution.created_at,
      updated_at: execution.updated_at,
    }
  }
}

/// Project heterogeneous executions into uniform summaries, preserving
/// order. An empty slice yields an empty list.
pub fn summarize_executions(executions: &[Execution]) -> Vec<ExecutionSummary> {
  executions.iter().map(ExecutionSummary::from).collect()
}

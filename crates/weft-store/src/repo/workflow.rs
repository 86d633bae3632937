use std::sync::Arc;

use sqlx::types::Json;
use tokio_util::sync::CancellationToken;
use weft_config::{EnvMap, Input, WorkflowConfig};
use weft_normalizer::{Normalizer, Scope};

use super::{get_component, list};
use crate::error::StoreError;
use crate::metadata::WorkflowMetadata;
use crate::store::ExecutionStore;
use crate::types::{Component, Execution, ExecutionFilter, ExecutionId, ExecutionStatus};

/// Workflow executions.
#[derive(Clone)]
pub struct WorkflowRepo {
  store: Arc<dyn ExecutionStore>,
  normalizer: Normalizer,
}

impl WorkflowRepo {
  pub fn new(store: Arc<dyn ExecutionStore>, normalizer: Normalizer) -> Self {
    Self { store, normalizer }
  }

  /// Record a pending workflow execution. The trigger input is stored as
  /// given; it becomes the `.trigger.input` of every descendant.
  pub async fn create_execution(
    &self,
    metadata: &WorkflowMetadata,
    config: &WorkflowConfig,
    input: &Input,
    cancel: &CancellationToken,
  ) -> Result<Execution, StoreError> {
    let scope = Scope::new(metadata.workflow_id.clone(), input.clone());
    let env = self.normalizer.resolve_env(
      &metadata.workflow_id,
      &EnvMap::new(),
      config.env.as_ref(),
      &scope,
    )?;

    let execution = Execution {
      exec_id: metadata.workflow_exec_id.clone(),
      component: Component::Workflow,
      component_id: metadata.workflow_id.clone(),
      status: ExecutionStatus::Pending,
      workflow_id: metadata.workflow_id.clone(),
      workflow_exec_id: metadata.workflow_exec_id.clone(),
      task_id: None,
      task_exec_id: None,
      env: Json(env),
      input: Json(input.clone()),
      output: None,
      error: None,
      source: metadata.source.clone(),
      created_at: metadata.time,
      updated_at: metadata.time,
    };
    self.store.insert_execution(&execution, cancel).await?;
    Ok(execution)
  }

  pub async fn get_execution(&self, workflow_exec_id: &ExecutionId) -> Result<Execution, StoreError> {
    get_component(self.store.as_ref(), Component::Workflow, workflow_exec_id).await
  }

  pub async fn list_executions(&self) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter()).await
  }

  pub async fn list_executions_by_status(
    &self,
    status: ExecutionStatus,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter().with_status(status)).await
  }

  pub async fn list_executions_by_workflow_id(
    &self,
    workflow_id: &str,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter().with_workflow_id(workflow_id)).await
  }

  /// Every task, agent and tool execution under a workflow execution.
  pub async fn list_children_executions(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<Vec<Execution>, StoreError> {
    let filter = ExecutionFilter::components(&[Component::Task, Component::Agent, Component::Tool])
      .with_workflow_exec_id(workflow_exec_id);
    list(self.store.as_ref(), filter).await
  }

  fn filter() -> ExecutionFilter {
    ExecutionFilter::components(&[Component::Workflow])
  }
}

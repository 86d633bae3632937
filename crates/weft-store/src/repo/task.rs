use std::sync::Arc;

use sqlx::types::Json;
use tokio_util::sync::CancellationToken;
use weft_config::{Input, TaskConfig};
use weft_normalizer::Normalizer;

use super::{get_component, list, load_parent, scope_of};
use crate::error::{ParentLevel, StoreError};
use crate::metadata::TaskMetadata;
use crate::store::ExecutionStore;
use crate::types::{Component, Execution, ExecutionFilter, ExecutionId, ExecutionStatus};

/// Task executions.
#[derive(Clone)]
pub struct TaskRepo {
  store: Arc<dyn ExecutionStore>,
  normalizer: Normalizer,
}

impl TaskRepo {
  pub fn new(store: Arc<dyn ExecutionStore>, normalizer: Normalizer) -> Self {
    Self { store, normalizer }
  }

  /// Record a pending task execution under an existing workflow
  /// execution. The task's env is layered over the workflow's stored env
  /// and its `with` is rendered against the workflow's trigger input.
  pub async fn create_execution(
    &self,
    metadata: &TaskMetadata,
    config: &TaskConfig,
    cancel: &CancellationToken,
  ) -> Result<Execution, StoreError> {
    let workflow = load_parent(
      self.store.as_ref(),
      ParentLevel::Workflow,
      &metadata.workflow_exec_id,
    )
    .await?;
    let scope = scope_of(&workflow);

    let env =
      self
        .normalizer
        .resolve_env(&metadata.task_id, &workflow.env.0, config.env.as_ref(), &scope)?;
    let input = match &config.with {
      Some(with) => self
        .normalizer
        .render_input(&metadata.task_id, with, &env, &scope)?,
      None => Input::new(),
    };

    let execution = Execution {
      exec_id: metadata.task_exec_id.clone(),
      component: Component::Task,
      component_id: metadata.task_id.clone(),
      status: ExecutionStatus::Pending,
      workflow_id: workflow.workflow_id.clone(),
      workflow_exec_id: workflow.exec_id.clone(),
      task_id: Some(metadata.task_id.clone()),
      task_exec_id: Some(metadata.task_exec_id.clone()),
      env: Json(env),
      input: Json(input),
      output: None,
      error: None,
      source: metadata.source.clone(),
      created_at: metadata.time,
      updated_at: metadata.time,
    };
    self.store.insert_execution(&execution, cancel).await?;
    Ok(execution)
  }

  pub async fn get_execution(&self, task_exec_id: &ExecutionId) -> Result<Execution, StoreError> {
    get_component(self.store.as_ref(), Component::Task, task_exec_id).await
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

  pub async fn list_executions_by_workflow_exec_id(
    &self,
    workflow_exec_id: &ExecutionId,
  ) -> Result<Vec<Execution>, StoreError> {
    let filter = Self::filter().with_workflow_exec_id(workflow_exec_id);
    list(self.store.as_ref(), filter).await
  }

  pub async fn list_executions_by_task_id(
    &self,
    task_id: &str,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter().with_task_id(task_id)).await
  }

  /// The task execution recorded under `task_exec_id`, as a list so it
  /// lines up with the agent and tool queries.
  pub async fn list_executions_by_task_exec_id(
    &self,
    task_exec_id: &ExecutionId,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter().with_task_exec_id(task_exec_id)).await
  }

  /// Agent and tool executions under one task execution.
  pub async fn list_children_executions(
    &self,
    task_exec_id: &ExecutionId,
  ) -> Result<Vec<Execution>, StoreError> {
    let filter = Self::children().with_task_exec_id(task_exec_id);
    list(self.store.as_ref(), filter).await
  }

  /// Agent and tool executions under every execution of a task.
  pub async fn list_children_executions_by_task_id(
    &self,
    task_id: &str,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::children().with_task_id(task_id)).await
  }

  fn filter() -> ExecutionFilter {
    ExecutionFilter::components(&[Component::Task])
  }

  fn children() -> ExecutionFilter {
    ExecutionFilter::components(&[Component::Agent, Component::Tool])
  }
}

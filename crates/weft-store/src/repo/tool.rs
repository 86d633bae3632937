use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use weft_config::ToolConfig;
use weft_normalizer::Normalizer;

use super::{Leaf, create_leaf, get_component, list};
use crate::error::StoreError;
use crate::metadata::ToolMetadata;
use crate::store::ExecutionStore;
use crate::types::{Component, Execution, ExecutionFilter, ExecutionId, ExecutionStatus};

/// Tool executions.
#[derive(Clone)]
pub struct ToolRepo {
  store: Arc<dyn ExecutionStore>,
  normalizer: Normalizer,
}

impl ToolRepo {
  pub fn new(store: Arc<dyn ExecutionStore>, normalizer: Normalizer) -> Self {
    Self { store, normalizer }
  }

  /// Record a pending tool execution under an existing task execution.
  pub async fn create_execution(
    &self,
    metadata: &ToolMetadata,
    config: &ToolConfig,
    cancel: &CancellationToken,
  ) -> Result<Execution, StoreError> {
    let leaf = Leaf {
      component: Component::Tool,
      component_id: &metadata.tool_id,
      exec_id: &metadata.tool_exec_id,
      workflow_exec_id: &metadata.workflow_exec_id,
      task_exec_id: &metadata.task_exec_id,
      env: config.env.as_ref(),
      with: config.with.as_ref(),
      time: metadata.time,
      source: &metadata.source,
    };
    create_leaf(self.store.as_ref(), &self.normalizer, leaf, cancel).await
  }

  pub async fn get_execution(&self, tool_exec_id: &ExecutionId) -> Result<Execution, StoreError> {
    get_component(self.store.as_ref(), Component::Tool, tool_exec_id).await
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

  pub async fn list_executions_by_task_exec_id(
    &self,
    task_exec_id: &ExecutionId,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter().with_task_exec_id(task_exec_id)).await
  }

  pub async fn list_executions_by_tool_id(
    &self,
    tool_id: &str,
  ) -> Result<Vec<Execution>, StoreError> {
    list(self.store.as_ref(), Self::filter().with_component_id(tool_id)).await
  }

  fn filter() -> ExecutionFilter {
    ExecutionFilter::components(&[Component::Tool])
  }
}

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::{Map, Value, json};
use weft_config::{EnvMap, Input, TaskConfig, WorkflowConfig};
use weft_template::Context;

use crate::env::env_to_value;

/// Resolved context a parent hands to its children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentContext {
  pub cwd: Option<PathBuf>,
  pub file_path: Option<PathBuf>,
  pub env: EnvMap,
}

impl ParentContext {
  /// Root context of a workflow, with its already resolved environment.
  pub fn from_workflow(workflow: &WorkflowConfig, env: EnvMap) -> Self {
    Self {
      cwd: workflow.cwd.clone(),
      file_path: workflow.file_path.clone(),
      env,
    }
  }

  /// Context of a normalized task, passed on to its children.
  pub fn of(task: &TaskConfig) -> Self {
    Self {
      cwd: task.cwd.clone(),
      file_path: task.file_path.clone(),
      env: task.env.clone().unwrap_or_default(),
    }
  }
}

/// Data shared by every node of one normalization pass.
#[derive(Debug, Clone)]
pub struct Scope {
  workflow_id: String,
  trigger_input: Input,
  tasks: Option<Map<String, Value>>,
  deferred: BTreeSet<String>,
}

impl Scope {
  /// References to prior task outputs (`.tasks.*`) are deferred until
  /// outputs are supplied with [`Scope::with_tasks`].
  pub fn new(workflow_id: impl Into<String>, trigger_input: Input) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      trigger_input,
      tasks: None,
      deferred: BTreeSet::from(["tasks".to_string()]),
    }
  }

  /// Bind prior task outputs, keyed by task ID.
  pub fn with_tasks(mut self, tasks: Map<String, Value>) -> Self {
    self.tasks = Some(tasks);
    self
  }

  pub(crate) fn defer(mut self, root: impl Into<String>) -> Self {
    self.deferred.insert(root.into());
    self
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  pub fn trigger_input(&self) -> &Input {
    &self.trigger_input
  }

  /// Template context for a node whose merged environment is `env`.
  pub fn context(&self, env: &EnvMap) -> Context {
    let mut data = Map::new();
    data.insert("workflow".to_string(), json!({ "id": self.workflow_id }));
    data.insert(
      "trigger".to_string(),
      json!({ "input": Value::Object(self.trigger_input.clone()) }),
    );
    data.insert("env".to_string(), env_to_value(env));
    if let Some(tasks) = &self.tasks {
      data.insert("tasks".to_string(), Value::Object(tasks.clone()));
    }

    self
      .deferred
      .iter()
      .fold(Context::new(data), |ctx, root| ctx.defer(root.clone()))
  }
}

use std::path::PathBuf;

use tracing::{debug, info};
use weft_config::{EnvMap, Input, TaskConfig, TaskKind, WorkflowConfig};
use weft_template::Engine;

use crate::context::{ParentContext, Scope};
use crate::env::merge_env;
use crate::error::NormalizeError;

/// Resolves inherited context and templates across a task tree.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
  pub(crate) engine: Engine,
}

fn is_unset(path: &Option<PathBuf>) -> bool {
  path.as_ref().is_none_or(|p| p.as_os_str().is_empty())
}

impl Normalizer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Use a custom template engine, e.g. one with extra functions.
  pub fn with_engine(engine: Engine) -> Self {
    Self { engine }
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }

  /// Normalize a whole workflow against its trigger input.
  ///
  /// The workflow's own environment is rendered first and becomes the
  /// root context for its tasks. The input workflow is not modified.
  pub fn normalize_workflow(
    &self,
    workflow: &WorkflowConfig,
    trigger_input: &Input,
  ) -> Result<WorkflowConfig, NormalizeError> {
    let scope = Scope::new(&workflow.id, trigger_input.clone());
    let env = self.resolve_env(&workflow.id, &EnvMap::new(), workflow.env.as_ref(), &scope)?;
    let parent = ParentContext::from_workflow(workflow, env.clone());

    let mut normalized = workflow.clone();
    if workflow.env.is_some() {
      normalized.env = Some(env);
    }
    for task in &mut normalized.tasks {
      self.normalize_node(task, &parent, &scope)?;
    }

    info!(
      workflow_id = %workflow.id,
      tasks = normalized.tasks.len(),
      "normalized workflow"
    );
    Ok(normalized)
  }

  /// Normalize a single task and its subtree under `parent`.
  pub fn normalize_task(
    &self,
    task: &TaskConfig,
    parent: &ParentContext,
    scope: &Scope,
  ) -> Result<TaskConfig, NormalizeError> {
    let mut node = task.clone();
    self.normalize_node(&mut node, parent, scope)?;
    Ok(node)
  }

  fn normalize_node(
    &self,
    node: &mut TaskConfig,
    parent: &ParentContext,
    scope: &Scope,
  ) -> Result<(), NormalizeError> {
    self.resolve_own_context(node, parent, scope)?;
    let context = ParentContext::of(node);

    match &mut node.kind {
      // Decision condition and routes are evaluated at execution time.
      TaskKind::Basic { .. } | TaskKind::Decision { .. } => {}
      TaskKind::Parallel { tasks, .. } | TaskKind::Composite { tasks } => {
        for child in tasks.iter_mut() {
          self.normalize_node(child, &context, scope)?;
        }
      }
      TaskKind::Collection {
        task,
        item_var,
        index_var,
        ..
      } => {
        let template_scope = scope.clone().defer(item_var.clone()).defer(index_var.clone());
        self.normalize_node(task, &context, &template_scope)?;
      }
      TaskKind::Wait { processor, .. } => {
        if let Some(processor) = processor {
          self.normalize_node(processor, &context, scope)?;
        }
      }
    }

    debug!(task_id = %node.id, task_type = %node.task_type(), "normalized task");
    Ok(())
  }

  /// Fill unset paths from the parent, merge and render the environment,
  /// then render `with`.
  fn resolve_own_context(
    &self,
    node: &mut TaskConfig,
    parent: &ParentContext,
    scope: &Scope,
  ) -> Result<(), NormalizeError> {
    if is_unset(&node.cwd) {
      node.cwd = parent.cwd.clone();
    }
    if is_unset(&node.file_path) {
      node.file_path = parent.file_path.clone();
    }
    if is_unset(&node.cwd) {
      return Err(NormalizeError::MissingContext {
        task_id: node.id.clone(),
        field: "working directory",
      });
    }
    if is_unset(&node.file_path) {
      return Err(NormalizeError::MissingContext {
        task_id: node.id.clone(),
        field: "file path",
      });
    }

    let env = self.resolve_env(&node.id, &parent.env, node.env.as_ref(), scope)?;
    if let Some(with) = &node.with {
      node.with = Some(self.render_input(&node.id, with, &env, scope)?);
    }
    node.env = Some(env);
    Ok(())
  }

  /// Render `own` and layer it over the already resolved `parent`.
  ///
  /// Only the node's own values are rendered; inherited values pass
  /// through untouched. Templates see `.env` as `own` merged over
  /// `parent`.
  pub fn resolve_env(
    &self,
    node_id: &str,
    parent: &EnvMap,
    own: Option<&EnvMap>,
    scope: &Scope,
  ) -> Result<EnvMap, NormalizeError> {
    let Some(own) = own else {
      return Ok(parent.clone());
    };
    let ctx = scope.context(&merge_env([parent, own]));

    let mut resolved = parent.clone();
    for (key, value) in own {
      let rendered = self
        .engine
        .render_string(value, &ctx)
        .map_err(|source| NormalizeError::template(node_id, format!("env.{key}"), source))?;
      resolved.insert(key.clone(), rendered);
    }
    Ok(resolved)
  }

  /// Render a `with` mapping for `node_id` against an already resolved
  /// environment.
  pub fn render_input(
    &self,
    node_id: &str,
    with: &Input,
    env: &EnvMap,
    scope: &Scope,
  ) -> Result<Input, NormalizeError> {
    self
      .engine
      .render_map(with, &scope.context(env))
      .map_err(|source| NormalizeError::template(node_id, "with", source))
  }
}

//! Execution-time instantiation of a normalized collection task.

use serde_json::Value;
use tracing::{debug, info};
use weft_config::{Input, TaskConfig, TaskKind};
use weft_template::{Context, TemplateError, has_template, is_truthy, references_any};

use crate::context::Scope;
use crate::env::env_to_value;
use crate::error::NormalizeError;
use crate::normalizer::Normalizer;

impl Normalizer {
  /// Instantiate a collection's task template once per item.
  ///
  /// `collection` is expected to be normalized already. Each instance gets
  /// the item and its index bound under the collection's `item-var` and
  /// `index-var`: IDs, environment values and `with` inputs referencing
  /// either are rendered with them, and both are injected into the
  /// instance's `with`. Values normalization already rendered are left
  /// alone. Items rejected by `filter` are skipped; instances keep the
  /// index of their item in the original sequence.
  pub fn expand_collection(
    &self,
    collection: &TaskConfig,
    scope: &Scope,
  ) -> Result<Vec<TaskConfig>, NormalizeError> {
    let TaskKind::Collection {
      items,
      item_var,
      index_var,
      filter,
      task: template,
      ..
    } = &collection.kind
    else {
      return Err(NormalizeError::InvalidCollection {
        task_id: collection.id.clone(),
        message: format!("expected a collection task, got {}", collection.task_type()),
      });
    };

    let ctx = scope.context(&collection.env.clone().unwrap_or_default());
    let items = self.resolve_items(&collection.id, items, &ctx)?;

    let roots = [item_var.as_str(), index_var.as_str()];
    let mut instances = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
      let mut item_ctx = ctx.clone();
      item_ctx.insert(item_var.clone(), item.clone());
      item_ctx.insert(index_var.clone(), Value::from(index));

      if let Some(filter) = filter {
        if !self.passes_filter(&collection.id, filter, &item_ctx)? {
          debug!(collection_id = %collection.id, index, "item rejected by filter");
          continue;
        }
      }

      let mut instance = template.as_ref().clone();
      self.bind_item(&mut instance, &item_ctx, &roots)?;
      let with = instance.with.get_or_insert_with(Input::new);
      with.insert(item_var.clone(), item);
      with.insert(index_var.clone(), Value::from(index));
      instances.push(instance);
    }

    info!(
      collection_id = %collection.id,
      instances = instances.len(),
      "expanded collection"
    );
    Ok(instances)
  }

  fn resolve_items(
    &self,
    task_id: &str,
    items: &Value,
    ctx: &Context,
  ) -> Result<Vec<Value>, NormalizeError> {
    let resolved = self
      .engine
      .render_value(items, ctx)
      .map_err(|source| NormalizeError::template(task_id, "items", source))?;

    match resolved {
      Value::Array(items) => Ok(items),
      Value::Null => Ok(Vec::new()),
      other => Err(NormalizeError::InvalidCollection {
        task_id: task_id.to_string(),
        message: format!("items must evaluate to a sequence, got {other}"),
      }),
    }
  }

  /// A filter is either a bare expression (`gt .item.score 10`) or a
  /// template rendering to a boolean-like string.
  fn passes_filter(
    &self,
    task_id: &str,
    filter: &str,
    ctx: &Context,
  ) -> Result<bool, NormalizeError> {
    let value = if has_template(filter) {
      self.engine.render_str(filter, ctx)
    } else {
      self.engine.evaluate(filter, ctx)
    }
    .map_err(|source| NormalizeError::template(task_id, "filter", source))?;

    Ok(match value {
      Value::String(s) => !matches!(s.trim(), "" | "false" | "0"),
      other => is_truthy(&other),
    })
  }

  /// Render the IDs, environment values and inputs of an instance subtree
  /// that reference the bound item. Nested collection templates keep their
  /// own item bindings for their own expansion.
  fn bind_item(
    &self,
    node: &mut TaskConfig,
    item_ctx: &Context,
    roots: &[&str],
  ) -> Result<(), NormalizeError> {
    let mut ctx = item_ctx.clone();
    if let Some(env) = &node.env {
      ctx.insert("env", env_to_value(env));
    }

    let id = if references_any(&node.id, roots) {
      self
        .engine
        .render_string(&node.id, &ctx)
        .map_err(|source| NormalizeError::template(&node.id, "id", source))?
    } else {
      node.id.clone()
    };

    if let Some(env) = node.env.as_mut() {
      for (key, value) in env.iter_mut() {
        if references_any(value, roots) {
          *value = self
            .engine
            .render_string(value, &ctx)
            .map_err(|source| NormalizeError::template(&id, format!("env.{key}"), source))?;
        }
      }
    }
    if let Some(with) = node.with.as_mut() {
      for value in with.values_mut() {
        *value = self
          .bind_value(value, &ctx, roots)
          .map_err(|source| NormalizeError::template(&id, "with", source))?;
      }
    }
    node.id = id;

    if let TaskKind::Collection { items, .. } = &mut node.kind {
      *items = self
        .bind_value(items, &ctx, roots)
        .map_err(|source| NormalizeError::template(&node.id, "items", source))?;
      return Ok(());
    }
    for child in node.children_mut() {
      self.bind_item(child, item_ctx, roots)?;
    }
    Ok(())
  }

  fn bind_value(
    &self,
    value: &Value,
    ctx: &Context,
    roots: &[&str],
  ) -> Result<Value, TemplateError> {
    match value {
      Value::String(s) if references_any(s, roots) => self.engine.render_str(s, ctx),
      Value::Array(items) => items
        .iter()
        .map(|item| self.bind_value(item, ctx, roots))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      Value::Object(map) => map
        .iter()
        .map(|(key, item)| Ok::<_, TemplateError>((key.clone(), self.bind_value(item, ctx, roots)?)))
        .collect::<Result<_, _>>()
        .map(Value::Object),
      other => Ok(other.clone()),
    }
  }
}

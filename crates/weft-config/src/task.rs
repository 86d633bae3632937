use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentConfig, ToolConfig};
use crate::enums::{CollectionMode, ParallelStrategy, TaskType};
use crate::input::{EnvMap, Input};

/// A node in a task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
  pub id: String,
  #[serde(flatten)]
  pub kind: TaskKind,
  /// Working directory; inherited from the parent when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
  /// File the task was loaded from; inherited from the parent when unset.
  #[serde(
    default,
    rename = "file-path",
    skip_serializing_if = "Option::is_none"
  )]
  pub file_path: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<EnvMap>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub with: Option<Input>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
  Basic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent: Option<AgentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<ToolConfig>,
    /// Agent action to run, e.g. "summarize"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
  },
  Parallel {
    tasks: Vec<TaskConfig>,
    #[serde(default)]
    strategy: ParallelStrategy,
    #[serde(
      default,
      rename = "max-workers",
      skip_serializing_if = "Option::is_none"
    )]
    max_workers: Option<u32>,
  },
  Composite {
    tasks: Vec<TaskConfig>,
  },
  Collection {
    /// A literal sequence or a template string evaluating to one.
    items: serde_json::Value,
    #[serde(rename = "item-var", default = "default_item_var")]
    item_var: String,
    #[serde(rename = "index-var", default = "default_index_var")]
    index_var: String,
    #[serde(default)]
    mode: CollectionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch: Option<u32>,
    /// Expression evaluated per item; falsy items are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    task: Box<TaskConfig>,
  },
  Decision {
    condition: String,
    #[serde(default)]
    routes: BTreeMap<String, serde_json::Value>,
  },
  Wait {
    #[serde(rename = "wait-for")]
    wait_for: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    /// Duration string such as "30s" or "5m"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processor: Option<Box<TaskConfig>>,
  },
}

fn default_item_var() -> String {
  "item".to_string()
}

fn default_index_var() -> String {
  "index".to_string()
}

impl TaskConfig {
  /// Create a task with the given kind and an empty base shape.
  pub fn new(id: impl Into<String>, kind: TaskKind) -> Self {
    Self {
      id: id.into(),
      kind,
      cwd: None,
      file_path: None,
      env: None,
      with: None,
    }
  }

  /// Create a basic task with no agent, tool or action.
  pub fn basic(id: impl Into<String>) -> Self {
    Self::new(
      id,
      TaskKind::Basic {
        agent: None,
        tool: None,
        action: None,
      },
    )
  }

  pub fn task_type(&self) -> TaskType {
    match &self.kind {
      TaskKind::Basic { .. } => TaskType::Basic,
      TaskKind::Parallel { .. } => TaskType::Parallel,
      TaskKind::Composite { .. } => TaskType::Composite,
      TaskKind::Collection { .. } => TaskType::Collection,
      TaskKind::Decision { .. } => TaskType::Decision,
      TaskKind::Wait { .. } => TaskType::Wait,
    }
  }

  /// Direct children of this task: `tasks` entries, the collection
  /// template or the wait processor.
  pub fn children(&self) -> Vec<&TaskConfig> {
    match &self.kind {
      TaskKind::Parallel { tasks, .. } | TaskKind::Composite { tasks } => tasks.iter().collect(),
      TaskKind::Collection { task, .. } => vec![task.as_ref()],
      TaskKind::Wait {
        processor: Some(processor),
        ..
      } => vec![processor.as_ref()],
      TaskKind::Basic { .. } | TaskKind::Decision { .. } | TaskKind::Wait { .. } => Vec::new(),
    }
  }

  /// Mutable counterpart of [`TaskConfig::children`].
  pub fn children_mut(&mut self) -> Vec<&mut TaskConfig> {
    match &mut self.kind {
      TaskKind::Parallel { tasks, .. } | TaskKind::Composite { tasks } => {
        tasks.iter_mut().collect()
      }
      TaskKind::Collection { task, .. } => vec![task.as_mut()],
      TaskKind::Wait {
        processor: Some(processor),
        ..
      } => vec![processor.as_mut()],
      TaskKind::Basic { .. } | TaskKind::Decision { .. } | TaskKind::Wait { .. } => Vec::new(),
    }
  }

  /// Depth-first search for a task by ID, including this task.
  pub fn find(&self, id: &str) -> Option<&TaskConfig> {
    if self.id == id {
      return Some(self);
    }
    self.children().into_iter().find_map(|child| child.find(id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_basic_task() {
    let task: TaskConfig = serde_json::from_value(json!({
      "id": "fetch",
      "type": "basic",
      "cwd": "/work",
      "env": { "TOKEN": "abc" },
      "with": { "endpoint": "{{ .env.API_BASE }}/users" },
      "agent": { "id": "assistant", "provider": "openai", "model": "gpt-4o" },
      "action": "summarize"
    }))
    .unwrap();

    assert_eq!(task.id, "fetch");
    assert_eq!(task.task_type(), TaskType::Basic);
    assert_eq!(task.cwd, Some(PathBuf::from("/work")));
    assert_eq!(task.file_path, None);
    assert_eq!(task.env.unwrap().get("TOKEN").unwrap(), "abc");
    match task.kind {
      TaskKind::Basic { agent, tool, action } => {
        assert_eq!(agent.unwrap().model.as_deref(), Some("gpt-4o"));
        assert!(tool.is_none());
        assert_eq!(action.as_deref(), Some("summarize"));
      }
      other => panic!("expected basic task, got {other:?}"),
    }
  }

  #[test]
  fn test_deserialize_collection_defaults() {
    let task: TaskConfig = serde_json::from_value(json!({
      "id": "per-user",
      "type": "collection",
      "items": "{{ .trigger.input.users }}",
      "task": { "id": "notify-{{ .index }}", "type": "basic" }
    }))
    .unwrap();

    match &task.kind {
      TaskKind::Collection {
        items,
        item_var,
        index_var,
        mode,
        task: template,
        ..
      } => {
        assert_eq!(items, &json!("{{ .trigger.input.users }}"));
        assert_eq!(item_var, "item");
        assert_eq!(index_var, "index");
        assert_eq!(*mode, CollectionMode::Parallel);
        assert_eq!(template.id, "notify-{{ .index }}");
      }
      other => panic!("expected collection task, got {other:?}"),
    }
  }

  #[test]
  fn test_deserialize_wait_with_kebab_fields() {
    let task: TaskConfig = serde_json::from_value(json!({
      "id": "approval",
      "type": "wait",
      "wait-for": "approved",
      "timeout": "5m",
      "file-path": "/work/workflow.yaml",
      "processor": { "id": "record", "type": "basic" }
    }))
    .unwrap();

    assert_eq!(task.file_path, Some(PathBuf::from("/work/workflow.yaml")));
    assert_eq!(task.children().len(), 1);
    assert_eq!(task.children()[0].id, "record");
  }

  #[test]
  fn test_serialize_omits_unset_fields() {
    let task = TaskConfig::basic("leaf");
    let value = serde_json::to_value(&task).unwrap();
    assert_eq!(value, json!({ "id": "leaf", "type": "basic" }));
  }

  #[test]
  fn test_find_nested_task() {
    let mut processor = TaskConfig::basic("inner");
    processor.cwd = Some(PathBuf::from("/inner"));
    let tree = TaskConfig::new(
      "root",
      TaskKind::Composite {
        tasks: vec![
          TaskConfig::basic("a"),
          TaskConfig::new(
            "wait",
            TaskKind::Wait {
              wait_for: "signal".to_string(),
              condition: None,
              timeout: None,
              processor: Some(Box::new(processor)),
            },
          ),
        ],
      },
    );

    let found = tree.find("inner").unwrap();
    assert_eq!(found.cwd, Some(PathBuf::from("/inner")));
    assert!(tree.find("missing").is_none());
  }
}

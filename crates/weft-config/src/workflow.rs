use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::input::EnvMap;
use crate::task::TaskConfig;

/// Serializable workflow definition: the root of a task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
  #[serde(
    default,
    rename = "file-path",
    skip_serializing_if = "Option::is_none"
  )]
  pub file_path: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<EnvMap>,
  #[serde(default)]
  pub tasks: Vec<TaskConfig>,
}

impl WorkflowConfig {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      version: None,
      description: None,
      cwd: None,
      file_path: None,
      env: None,
      tasks: Vec::new(),
    }
  }

  /// Find a task anywhere in the tree.
  pub fn find_task(&self, id: &str) -> Option<&TaskConfig> {
    self.tasks.iter().find_map(|task| task.find(id))
  }
}

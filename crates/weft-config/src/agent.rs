use serde::{Deserialize, Serialize};

use crate::input::{EnvMap, Input};

/// An agent a basic task delegates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
  pub id: String,
  /// Model provider, e.g. "openai"
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provider: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub instructions: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<EnvMap>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub with: Option<Input>,
}

/// A tool a basic task delegates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<EnvMap>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub with: Option<Input>,
}

impl AgentConfig {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      provider: None,
      model: None,
      instructions: None,
      env: None,
      with: None,
    }
  }
}

impl ToolConfig {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      description: None,
      env: None,
      with: None,
    }
  }
}

use thiserror::Error;
use weft_template::TemplateError;

/// Errors that abort a normalization pass.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
  /// A template in the node's configuration could not be resolved.
  #[error("failed to resolve {field} of '{node_id}': {source}")]
  Template {
    node_id: String,
    field: String,
    source: TemplateError,
  },

  /// Neither the task nor any ancestor supplies a required path.
  #[error("task '{task_id}' has no {field} after inheritance")]
  MissingContext {
    task_id: String,
    field: &'static str,
  },

  #[error("invalid collection '{task_id}': {message}")]
  InvalidCollection { task_id: String, message: String },
}

impl NormalizeError {
  pub(crate) fn template(node_id: &str, field: impl Into<String>, source: TemplateError) -> Self {
    NormalizeError::Template {
      node_id: node_id.to_string(),
      field: field.into(),
      source,
    }
  }

  /// ID of the workflow or task the error originated from.
  pub fn node_id(&self) -> &str {
    match self {
      NormalizeError::Template { node_id, .. } => node_id,
      NormalizeError::MissingContext { task_id, .. } => task_id,
      NormalizeError::InvalidCollection { task_id, .. } => task_id,
    }
  }
}

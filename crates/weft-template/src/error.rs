use thiserror::Error;

/// Errors raised while parsing or evaluating a template.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TemplateError {
  /// A path did not resolve against the context.
  #[error("template references undefined path '{path}'")]
  MissingPath { path: String },

  /// The template could not be parsed.
  #[error("malformed template '{template}': {message}")]
  Syntax { template: String, message: String },

  #[error("unknown template function '{name}'")]
  UnknownFunction { name: String },

  /// A function rejected its arguments.
  #[error("template function '{name}' failed: {message}")]
  Function { name: String, message: String },
}

impl TemplateError {
  pub(crate) fn syntax(template: &str, message: impl Into<String>) -> Self {
    TemplateError::Syntax {
      template: template.to_string(),
      message: message.into(),
    }
  }
}

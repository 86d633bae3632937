use std::fmt;

use thiserror::Error;
use weft_normalizer::NormalizeError;

use crate::types::ExecutionId;

/// Parent level a new execution depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLevel {
  Workflow,
  Task,
}

impl fmt::Display for ParentLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParentLevel::Workflow => f.write_str("workflow"),
      ParentLevel::Task => f.write_str("task"),
    }
  }
}

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Execution,
  WorkflowState,
  TaskState,
  Usage,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Entity::Execution => "execution",
      Entity::WorkflowState => "workflow state",
      Entity::TaskState => "task state",
      Entity::Usage => "usage",
    })
  }
}

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The workflow or task execution a new execution belongs to is missing.
  #[error("failed to load {level} execution: {exec_id}")]
  ParentNotFound {
    level: ParentLevel,
    exec_id: ExecutionId,
  },

  /// The requested record was not found.
  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: String },

  /// A row referenced a parent execution or state that does not exist.
  #[error("foreign key violation: {message}")]
  ForeignKeyViolation { message: String },

  #[error("invalid usage row: {message}")]
  InvalidUsage { message: String },

  /// The execution's env or input could not be resolved.
  #[error("failed to resolve execution config: {0}")]
  Normalize(#[from] NormalizeError),

  /// The caller cancelled before the write began.
  #[error("operation cancelled before write")]
  Cancelled,

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(sqlx::Error),

  #[error("migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
  pub(crate) fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
    StoreError::NotFound {
      entity,
      id: id.to_string(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, StoreError::NotFound { .. })
  }
}

impl From<sqlx::Error> for StoreError {
  fn from(err: sqlx::Error) -> Self {
    if let sqlx::Error::Database(db) = &err {
      if db.is_foreign_key_violation() {
        return StoreError::ForeignKeyViolation {
          message: db.message().to_string(),
        };
      }
    }
    StoreError::Database(err)
  }
}

use serde::{Deserialize, Serialize};

/// How a collection runs its instantiated tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
  #[default]
  Parallel,
  Sequential,
}

/// Completion strategy for a parallel task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelStrategy {
  /// Wait for every child to succeed.
  #[default]
  WaitAll,
  /// Fail as soon as one child fails.
  FailFast,
  /// Run every child and succeed regardless of individual failures.
  BestEffort,
  /// Finish with the first child to complete.
  Race,
}

/// The kind discriminator of a task, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  Basic,
  Parallel,
  Composite,
  Collection,
  Decision,
  Wait,
}

impl TaskType {
  pub fn as_str(&self) -> &'static str {
    match self {
      TaskType::Basic => "basic",
      TaskType::Parallel => "parallel",
      TaskType::Composite => "composite",
      TaskType::Collection => "collection",
      TaskType::Decision => "decision",
      TaskType::Wait => "wait",
    }
  }
}

impl std::fmt::Display for TaskType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

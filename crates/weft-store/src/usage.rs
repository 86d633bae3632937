//! Token usage rows and their workflow-level aggregation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::StoreError;
use crate::types::{Component, ExecutionId};

/// Marker used in a summary when rows disagree on provider or model.
pub const MIXED: &str = "mixed";

/// Token accounting for one task execution, or for a workflow execution
/// when not tied to a single task.
///
/// Optional counts are `None` when the provider did not report them, which
/// is distinct from reporting zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UsageRow {
  pub component: Component,
  pub workflow_exec_id: Option<ExecutionId>,
  pub task_exec_id: Option<ExecutionId>,
  pub agent_id: Option<String>,
  pub provider: String,
  pub model: String,
  pub prompt_tokens: i64,
  pub completion_tokens: i64,
  pub total_tokens: i64,
  pub reasoning_tokens: Option<i64>,
  pub cached_prompt_tokens: Option<i64>,
  pub input_audio_tokens: Option<i64>,
  pub output_audio_tokens: Option<i64>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl UsageRow {
  fn empty(component: Component, provider: impl Into<String>, model: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      component,
      workflow_exec_id: None,
      task_exec_id: None,
      agent_id: None,
      provider: provider.into(),
      model: model.into(),
      prompt_tokens: 0,
      completion_tokens: 0,
      total_tokens: 0,
      reasoning_tokens: None,
      cached_prompt_tokens: None,
      input_audio_tokens: None,
      output_audio_tokens: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// A row keyed by a task execution.
  pub fn for_task(
    task_exec_id: &ExecutionId,
    provider: impl Into<String>,
    model: impl Into<String>,
  ) -> Self {
    Self {
      task_exec_id: Some(task_exec_id.clone()),
      ..Self::empty(Component::Task, provider, model)
    }
  }

  /// A row keyed by a workflow execution.
  pub fn for_workflow(
    workflow_exec_id: &ExecutionId,
    provider: impl Into<String>,
    model: impl Into<String>,
  ) -> Self {
    Self {
      workflow_exec_id: Some(workflow_exec_id.clone()),
      ..Self::empty(Component::Workflow, provider, model)
    }
  }

  pub fn with_tokens(mut self, prompt: i64, completion: i64, total: i64) -> Self {
    self.prompt_tokens = prompt;
    self.completion_tokens = completion;
    self.total_tokens = total;
    self
  }

  pub(crate) fn validate(&self) -> Result<(), StoreError> {
    let invalid = |message: &str| {
      Err(StoreError::InvalidUsage {
        message: message.to_string(),
      })
    };
    if self.provider.trim().is_empty() {
      return invalid("provider is required");
    }
    if self.model.trim().is_empty() {
      return invalid("model is required");
    }
    if self.workflow_exec_id.is_none() && self.task_exec_id.is_none() {
      return invalid("a workflow or task execution id is required");
    }
    let counts = [
      Some(self.prompt_tokens),
      Some(self.completion_tokens),
      Some(self.total_tokens),
      self.reasoning_tokens,
      self.cached_prompt_tokens,
      self.input_audio_tokens,
      self.output_audio_tokens,
    ];
    if counts.into_iter().flatten().any(|count| count < 0) {
      return invalid("token counts must not be negative");
    }
    Ok(())
  }
}

fn add_optional(sum: &mut Option<i64>, value: Option<i64>) {
  if let Some(value) = value {
    *sum = Some(sum.unwrap_or(0) + value);
  }
}

/// The shared provider and model of `rows`, or [`MIXED`] for both when
/// more than one pair occurs.
fn agreed_pair(rows: &[UsageRow]) -> (String, String) {
  let pairs: BTreeSet<(&str, &str)> = rows
    .iter()
    .map(|row| (row.provider.as_str(), row.model.as_str()))
    .collect();
  match pairs.into_iter().collect::<Vec<_>>().as_slice() {
    [(provider, model)] => (provider.to_string(), model.to_string()),
    _ => (MIXED.to_string(), MIXED.to_string()),
  }
}

/// Aggregate the task-scoped rows of one workflow execution into a
/// synthetic workflow row. Returns `None` when there are no rows.
///
/// Prompt, completion and total counts are summed. When the summed total
/// is zero it falls back to prompt plus completion. Optional counts are
/// summed over the rows that report them and stay `None` when no row does.
/// Provider and model are kept when every row has the same pair; otherwise
/// both become [`MIXED`].
pub fn summarize(workflow_exec_id: &ExecutionId, rows: &[UsageRow]) -> Option<UsageRow> {
  let first = rows.first()?;
  let (provider, model) = agreed_pair(rows);
  let mut summary = UsageRow {
    workflow_exec_id: Some(workflow_exec_id.clone()),
    provider,
    model,
    created_at: first.created_at,
    updated_at: first.updated_at,
    ..UsageRow::empty(Component::Workflow, "", "")
  };

  for row in rows {
    summary.prompt_tokens += row.prompt_tokens;
    summary.completion_tokens += row.completion_tokens;
    summary.total_tokens += row.total_tokens;
    add_optional(&mut summary.reasoning_tokens, row.reasoning_tokens);
    add_optional(&mut summary.cached_prompt_tokens, row.cached_prompt_tokens);
    add_optional(&mut summary.input_audio_tokens, row.input_audio_tokens);
    add_optional(&mut summary.output_audio_tokens, row.output_audio_tokens);
    summary.created_at = summary.created_at.min(row.created_at);
    summary.updated_at = summary.updated_at.max(row.updated_at);
  }
  if summary.total_tokens == 0 {
    summary.total_tokens = summary.prompt_tokens + summary.completion_tokens;
  }

  Some(summary)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn task_row(provider: &str, model: &str, prompt: i64, completion: i64, total: i64) -> UsageRow {
    UsageRow::for_task(&ExecutionId::new(), provider, model).with_tokens(prompt, completion, total)
  }

  #[test]
  fn test_summarize_sums_counts() {
    let workflow = ExecutionId::new();
    let rows = vec![
      task_row("openai", "gpt-4o", 12, 6, 18),
      task_row("openai", "gpt-4o", 20, 9, 29),
    ];

    let summary = summarize(&workflow, &rows).unwrap();

    assert_eq!(summary.component, Component::Workflow);
    assert_eq!(summary.workflow_exec_id, Some(workflow));
    assert_eq!(summary.task_exec_id, None);
    assert_eq!(summary.prompt_tokens, 32);
    assert_eq!(summary.completion_tokens, 15);
    assert_eq!(summary.total_tokens, 47);
    assert_eq!(summary.provider, "openai");
    assert_eq!(summary.model, "gpt-4o");
  }

  #[test]
  fn test_summarize_marks_mixed_providers() {
    let rows = vec![
      task_row("openai", "gpt-4o", 12, 6, 18),
      task_row("anthropic", "gpt-4o", 20, 9, 29),
    ];
    let summary = summarize(&ExecutionId::new(), &rows).unwrap();
    assert_eq!(summary.provider, MIXED);
    assert_eq!(summary.model, MIXED);

    let rows = vec![
      task_row("openai", "gpt-4o", 1, 1, 2),
      task_row("openai", "gpt-4o-mini", 1, 1, 2),
    ];
    let summary = summarize(&ExecutionId::new(), &rows).unwrap();
    assert_eq!(summary.provider, MIXED);
    assert_eq!(summary.model, MIXED);
  }

  #[test]
  fn test_summarize_optional_fields_only_when_reported() {
    let mut with_reasoning = task_row("openai", "o1", 10, 5, 15);
    with_reasoning.reasoning_tokens = Some(7);
    let mut with_zero_reasoning = task_row("openai", "o1", 1, 1, 2);
    with_zero_reasoning.reasoning_tokens = Some(0);
    let plain = task_row("openai", "o1", 1, 1, 2);

    let summary = summarize(
      &ExecutionId::new(),
      &[with_reasoning, with_zero_reasoning, plain],
    )
    .unwrap();

    assert_eq!(summary.reasoning_tokens, Some(7));
    assert_eq!(summary.cached_prompt_tokens, None);
    assert_eq!(summary.input_audio_tokens, None);
    assert_eq!(summary.output_audio_tokens, None);
  }

  #[test]
  fn test_summarize_total_is_sum_of_reported_totals() {
    let rows = vec![task_row("openai", "gpt-4o", 10, 5, 0), task_row("openai", "gpt-4o", 1, 1, 3)];
    let summary = summarize(&ExecutionId::new(), &rows).unwrap();
    assert_eq!(summary.total_tokens, 3);
  }

  #[test]
  fn test_summarize_total_falls_back_when_no_totals_reported() {
    let rows = vec![task_row("openai", "gpt-4o", 10, 5, 0), task_row("openai", "gpt-4o", 1, 1, 0)];
    let summary = summarize(&ExecutionId::new(), &rows).unwrap();
    assert_eq!(summary.total_tokens, 17);
  }

  #[test]
  fn test_summarize_time_bounds() {
    let mut early = task_row("openai", "gpt-4o", 1, 1, 2);
    early.created_at -= Duration::hours(1);
    let mut late = task_row("openai", "gpt-4o", 1, 1, 2);
    late.updated_at += Duration::hours(1);

    let summary = summarize(&ExecutionId::new(), &[late.clone(), early.clone()]).unwrap();
    assert_eq!(summary.created_at, early.created_at);
    assert_eq!(summary.updated_at, late.updated_at);
  }

  #[test]
  fn test_summarize_empty() {
    assert!(summarize(&ExecutionId::new(), &[]).is_none());
  }

  #[test]
  fn test_validate() {
    assert!(task_row("openai", "gpt-4o", 1, 1, 2).validate().is_ok());
    assert!(matches!(
      task_row("", "gpt-4o", 1, 1, 2).validate(),
      Err(StoreError::InvalidUsage { .. })
    ));
    assert!(task_row("openai", "gpt-4o", -1, 1, 2).validate().is_err());

    let mut orphan = task_row("openai", "gpt-4o", 1, 1, 2);
    orphan.task_exec_id = None;
    assert!(orphan.validate().is_err());
  }
}

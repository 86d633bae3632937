//! Weft Store
//!
//! Persistence for everything a workflow run leaves behind:
//!
//! - execution records for workflows, tasks, agents and tools, created
//!   through the per-component repositories in [`WorkflowRepo`],
//!   [`TaskRepo`], [`AgentRepo`] and [`ToolRepo`]
//! - workflow and task state projections ([`StateStore`])
//! - token usage rows and their workflow summaries ([`UsageLedger`])
//!
//! [`SqliteStore`] implements all three storage traits over one shared
//! connection pool.

mod config;
mod error;
mod metadata;
mod repo;
mod sqlite;
mod state;
mod store;
mod summary;
mod types;
mod usage;

pub use config::StoreConfig;
pub use error::{Entity, ParentLevel, StoreError};
pub use metadata::{AgentMetadata, TaskMetadata, ToolMetadata, WorkflowMetadata};
pub use repo::{AgentRepo, TaskRepo, ToolRepo, WorkflowRepo};
pub use sqlite::SqliteStore;
pub use state::{TaskState, TaskStateFilter, WorkflowState, WorkflowStateFilter};
pub use store::{ExecutionStore, StateStore, UsageLedger};
pub use summary::{ExecutionSummary, summarize_executions};
pub use types::{
  Component, Execution, ExecutionError, ExecutionFilter, ExecutionId, ExecutionStatus,
  ExecutionType, ExecutionUpdate,
};
pub use usage::{MIXED, UsageRow, summarize as summarize_usage};

pub use tokio_util::sync::CancellationToken;

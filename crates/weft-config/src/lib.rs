//! Weft Config
//!
//! This crate contains the serializable configuration types for weft
//! workflows. A workflow owns a tree of tasks; every task shares a common
//! base shape (identifier, working directory, file path, environment and
//! `with` input) and carries a kind-specific payload:
//!
//! - `basic` - a leaf that may delegate to an agent, a tool or an action
//! - `parallel` / `composite` - a list of child tasks
//! - `collection` - a single task template instantiated once per item
//! - `decision` - a condition plus routes, evaluated at execution time
//! - `wait` - waits for a signal, optionally running a processor task
//!
//! These types are produced by an external loader and consumed by the
//! normalizer, which resolves inherited context and templates.

mod agent;
mod enums;
mod input;
mod task;
mod workflow;

pub use agent::{AgentConfig, ToolConfig};
pub use enums::{CollectionMode, ParallelStrategy, TaskType};
pub use input::{EnvMap, Input};
pub use task::{TaskConfig, TaskKind};
pub use workflow::WorkflowConfig;

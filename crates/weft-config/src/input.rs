//! Environment and input mappings shared by every configuration level.
//!
//! Both mappings may contain template strings such as
//! `"{{ .env.API_BASE }}/users/{{ .trigger.input.user.id }}"`, which are
//! resolved during normalization.

use std::collections::BTreeMap;

/// Environment variables declared at a workflow, task, agent or tool level.
pub type EnvMap = BTreeMap<String, String>;

/// Structured input (`with`) passed to a task, agent or tool.
pub type Input = serde_json::Map<String, serde_json::Value>;

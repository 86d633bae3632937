//! Weft Normalizer
//!
//! Walks a workflow's task tree and produces a fully resolved copy:
//!
//! - working directory and file path are inherited from the parent when a
//!   task leaves them unset
//! - environment mappings are merged outer-to-inner, inner keys winning
//! - `with` inputs and environment values are rendered against the
//!   trigger input and the merged environment
//!
//! Context is threaded explicitly through every recursive call as a
//! [`ParentContext`]; there is no ambient normalization state. The first
//! failure aborts the whole pass and names the originating node.

mod collection;
mod context;
mod env;
mod error;
mod normalizer;

pub use context::{ParentContext, Scope};
pub use env::{env_to_value, merge_env};
pub use error::NormalizeError;
pub use normalizer::Normalizer;

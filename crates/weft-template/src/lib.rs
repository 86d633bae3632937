//! Weft Template
//!
//! Evaluates strings and nested JSON structures containing `{{ }}`
//! expressions against a context such as:
//!
//! ```json
//! {
//!   "trigger": { "input": { "user": { "id": "user123" } } },
//!   "env": { "API_BASE": "https://api.example.com" }
//! }
//! ```
//!
//! The expression language is a small closed grammar:
//! - paths: `.trigger.input.user.id`, `.` for the whole context
//! - literals: `"text"`, `42`, `1.5`, `true`, `false`, `null`
//! - function calls: `upper .name`, `add .count 5`, `(len .items)`
//! - pipes: `.name | upper`, `.missing | default "fallback"`
//!
//! Functions come from a fixed, explicitly registered [`FunctionTable`].
//! A string that is exactly one bare path reference keeps the referenced
//! value and its type; other single placeholders keep mappings and
//! sequences; anything else renders to a string.

mod context;
mod engine;
mod error;
mod functions;
mod lexer;
mod parser;

pub use context::Context;
pub use engine::{Engine, has_template, references_any, stringify};
pub use error::TemplateError;
pub use functions::{FunctionTable, TemplateFn, is_truthy};

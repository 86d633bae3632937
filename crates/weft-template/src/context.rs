use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Data a template is evaluated against, plus the roots whose references
/// are left unevaluated while their data is not yet available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
  data: Map<String, Value>,
  deferred: BTreeSet<String>,
}

impl Context {
  pub fn new(data: Map<String, Value>) -> Self {
    Self {
      data,
      deferred: BTreeSet::new(),
    }
  }

  /// Defer references rooted at `root` (e.g. `tasks`) while the root is
  /// absent from the data.
  pub fn defer(mut self, root: impl Into<String>) -> Self {
    self.deferred.insert(root.into());
    self
  }

  /// Bind a top-level key, replacing any previous value.
  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    self.data.insert(key.into(), value);
  }

  pub fn data(&self) -> &Map<String, Value> {
    &self.data
  }

  pub(crate) fn is_deferred(&self, path: &[String]) -> bool {
    path
      .first()
      .is_some_and(|root| self.deferred.contains(root) && !self.data.contains_key(root))
  }

  pub(crate) fn lookup(&self, path: &[String]) -> Option<Value> {
    let Some((root, rest)) = path.split_first() else {
      return Some(Value::Object(self.data.clone()));
    };
    let mut current = self.data.get(root)?;
    for segment in rest {
      current = match current {
        Value::Object(map) => map.get(segment)?,
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
        _ => return None,
      };
    }
    Some(current.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn context() -> Context {
    let Value::Object(data) = json!({
      "trigger": { "input": { "users": [{ "id": "u1" }, { "id": "u2" }] } },
      "env": { "REGION": "eu" }
    }) else {
      unreachable!()
    };
    Context::new(data)
  }

  fn path(raw: &str) -> Vec<String> {
    raw.split('.').map(str::to_string).collect()
  }

  #[test]
  fn test_lookup_nested_and_indexed() {
    let ctx = context();
    assert_eq!(ctx.lookup(&path("env.REGION")), Some(json!("eu")));
    assert_eq!(
      ctx.lookup(&path("trigger.input.users.1.id")),
      Some(json!("u2"))
    );
    assert_eq!(ctx.lookup(&path("trigger.input.users.7")), None);
    assert_eq!(ctx.lookup(&path("env.REGION.code")), None);
  }

  #[test]
  fn test_deferred_only_while_root_absent() {
    let mut ctx = context().defer("tasks");
    assert!(ctx.is_deferred(&path("tasks.fetch.output")));
    assert!(!ctx.is_deferred(&path("env.REGION")));

    ctx.insert("tasks", json!({ "fetch": { "output": 1 } }));
    assert!(!ctx.is_deferred(&path("tasks.fetch.output")));
  }
}

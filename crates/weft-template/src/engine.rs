use serde_json::{Map, Value};
use tracing::debug;

use crate::context::Context;
use crate::error::TemplateError;
use crate::functions::FunctionTable;
use crate::parser::{Expr, Segment, parse_expression, parse_template};

/// Whether a string contains a `{{ }}` placeholder.
pub fn has_template(s: &str) -> bool {
  s.contains("{{")
}

/// Whether a template references any path rooted at one of `roots`.
/// Strings that are not templates, or do not parse, reference nothing.
pub fn references_any(template: &str, roots: &[&str]) -> bool {
  if !has_template(template) {
    return false;
  }
  parse_template(template).is_ok_and(|parsed| {
    parsed
      .paths()
      .iter()
      .any(|path| path.first().is_some_and(|root| roots.contains(&root.as_str())))
  })
}

/// Render a value the way it appears inside text: strings verbatim,
/// numbers in decimal form, booleans as `true`/`false`, `null` as the
/// empty string and structures as JSON.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

/// Result of evaluating an expression; undefined paths are carried as a
/// value so that tolerant functions such as `default` can observe them.
enum Resolved {
  Value(Value),
  Missing(String),
}

fn display_path(path: &[String]) -> String {
  if path.is_empty() {
    return ".".to_string();
  }
  path.iter().map(|segment| format!(".{segment}")).collect()
}

/// Template evaluator over a fixed function table.
#[derive(Debug, Clone, Default)]
pub struct Engine {
  functions: FunctionTable,
}

impl Engine {
  /// Create an engine with the built-in functions.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_functions(functions: FunctionTable) -> Self {
    Self { functions }
  }

  pub fn functions_mut(&mut self) -> &mut FunctionTable {
    &mut self.functions
  }

  /// Render a single string.
  ///
  /// A string that is exactly one bare path reference (`{{ .user.age }}`)
  /// yields the referenced value with its own type. A single placeholder
  /// holding any other expression yields mappings, sequences and `null`
  /// as they are and stringifies scalars. Mixed text is always a string.
  /// Strings referencing a deferred root that is not yet bound are
  /// returned verbatim.
  pub fn render_str(&self, template: &str, ctx: &Context) -> Result<Value, TemplateError> {
    if !has_template(template) {
      return Ok(Value::String(template.to_string()));
    }

    let parsed = parse_template(template)?;
    if parsed.paths().iter().any(|path| ctx.is_deferred(path)) {
      debug!(template, "deferring template with unbound references");
      return Ok(Value::String(template.to_string()));
    }

    if let Some(expr) = parsed.single_action() {
      let value = self.eval_required(expr, ctx)?;
      return Ok(match value {
        value if matches!(expr, Expr::Path(_)) => value,
        Value::Object(_) | Value::Array(_) | Value::Null => value,
        scalar => Value::String(stringify(&scalar)),
      });
    }

    let mut out = String::with_capacity(template.len());
    for segment in &parsed.segments {
      match segment {
        Segment::Text(text) => out.push_str(text),
        Segment::Action(expr) => out.push_str(&stringify(&self.eval_required(expr, ctx)?)),
      }
    }
    Ok(Value::String(out))
  }

  /// Render a string and always return text.
  pub fn render_string(&self, template: &str, ctx: &Context) -> Result<String, TemplateError> {
    self
      .render_str(template, ctx)
      .map(|value| stringify(&value))
  }

  /// Recursively render every string inside a value.
  pub fn render_value(&self, value: &Value, ctx: &Context) -> Result<Value, TemplateError> {
    match value {
      Value::String(s) => self.render_str(s, ctx),
      Value::Array(items) => items
        .iter()
        .map(|item| self.render_value(item, ctx))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      Value::Object(map) => self.render_map(map, ctx).map(Value::Object),
      scalar => Ok(scalar.clone()),
    }
  }

  pub fn render_map(
    &self,
    map: &Map<String, Value>,
    ctx: &Context,
  ) -> Result<Map<String, Value>, TemplateError> {
    let mut rendered = Map::with_capacity(map.len());
    for (key, value) in map {
      rendered.insert(key.clone(), self.render_value(value, ctx)?);
    }
    Ok(rendered)
  }

  /// Evaluate a bare expression without surrounding braces, e.g.
  /// `gt .item.score 10`.
  pub fn evaluate(&self, expression: &str, ctx: &Context) -> Result<Value, TemplateError> {
    let expr =
      parse_expression(expression).map_err(|message| TemplateError::syntax(expression, message))?;
    self.eval_required(&expr, ctx)
  }

  fn eval_required(&self, expr: &Expr, ctx: &Context) -> Result<Value, TemplateError> {
    match self.eval(expr, ctx)? {
      Resolved::Value(value) => Ok(value),
      Resolved::Missing(path) => Err(TemplateError::MissingPath { path }),
    }
  }

  fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Resolved, TemplateError> {
    match expr {
      Expr::Path(path) => Ok(match ctx.lookup(path) {
        Some(value) => Resolved::Value(value),
        None => Resolved::Missing(display_path(path)),
      }),
      Expr::Literal(value) => Ok(Resolved::Value(value.clone())),
      Expr::Call { name, args } => {
        let function = self
          .functions
          .get(name)
          .ok_or_else(|| TemplateError::UnknownFunction { name: name.clone() })?;

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
          match self.eval(arg, ctx)? {
            Resolved::Value(value) => values.push(value),
            Resolved::Missing(_) if function.tolerates_missing => values.push(Value::Null),
            Resolved::Missing(path) => return Err(TemplateError::MissingPath { path }),
          }
        }

        (function.call)(&values)
          .map(Resolved::Value)
          .map_err(|message| TemplateError::Function {
            name: name.clone(),
            message,
          })
      }
    }
  }
}

//! The fixed function table available inside `{{ }}` expressions.
//!
//! Argument order follows the usual template conventions: the subject
//! comes last so that functions compose with pipes
//! (`{{ .name | contains "doe" }}` is `contains "doe" .name`).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

use crate::engine::stringify;

/// A template function: receives evaluated arguments, returns a value or
/// an error message.
pub type TemplateFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Function {
  pub call: TemplateFn,
  /// Receives `null` for undefined paths instead of failing the template.
  pub tolerates_missing: bool,
}

/// Registry of the functions a template may call.
#[derive(Clone)]
pub struct FunctionTable {
  functions: HashMap<String, Function>,
}

impl FunctionTable {
  /// A table with no functions at all.
  pub fn empty() -> Self {
    Self {
      functions: HashMap::new(),
    }
  }

  /// The built-in function set.
  pub fn builtin() -> Self {
    let mut table = Self::empty();

    table.register("upper", |args| Ok(Value::String(one_str(args)?.to_uppercase())));
    table.register("lower", |args| Ok(Value::String(one_str(args)?.to_lowercase())));
    table.register("title", |args| Ok(Value::String(title_case(&one_str(args)?))));
    table.register("trim", |args| Ok(Value::String(one_str(args)?.trim().to_string())));
    table.register("trimPrefix", |args| {
      let (prefix, s) = two_str(args)?;
      Ok(Value::String(
        s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string(),
      ))
    });
    table.register("trimSuffix", |args| {
      let (suffix, s) = two_str(args)?;
      Ok(Value::String(
        s.strip_suffix(suffix.as_str()).unwrap_or(&s).to_string(),
      ))
    });
    table.register("replace", |args| {
      expect_args(args, 3)?;
      let s = stringify(&args[2]);
      Ok(Value::String(
        s.replace(&stringify(&args[0]), &stringify(&args[1])),
      ))
    });
    table.register("contains", |args| {
      let (needle, s) = two_str(args)?;
      Ok(Value::Bool(s.contains(&needle)))
    });
    table.register("hasPrefix", |args| {
      let (prefix, s) = two_str(args)?;
      Ok(Value::Bool(s.starts_with(&prefix)))
    });
    table.register("hasSuffix", |args| {
      let (suffix, s) = two_str(args)?;
      Ok(Value::Bool(s.ends_with(&suffix)))
    });
    table.register("split", |args| {
      let (sep, s) = two_str(args)?;
      Ok(Value::Array(
        s.split(sep.as_str())
          .map(|part| Value::String(part.to_string()))
          .collect(),
      ))
    });
    table.register("join", |args| {
      expect_args(args, 2)?;
      let sep = stringify(&args[0]);
      match &args[1] {
        Value::Array(items) => Ok(Value::String(
          items.iter().map(stringify).collect::<Vec<_>>().join(&sep),
        )),
        other => Err(format!("expected a sequence, got {}", type_name(other))),
      }
    });
    table.register("quote", |args| {
      at_least(args, 1)?;
      let quoted: Vec<String> = args
        .iter()
        .map(|arg| Value::String(stringify(arg)).to_string())
        .collect();
      Ok(Value::String(quoted.join(" ")))
    });

    table.register("add", |args| {
      at_least(args, 1)?;
      fold_numbers(args, i64::checked_add, |a, b| a + b)
    });
    table.register("mul", |args| {
      at_least(args, 1)?;
      fold_numbers(args, i64::checked_mul, |a, b| a * b)
    });
    table.register("sub", |args| {
      expect_args(args, 2)?;
      fold_numbers(args, i64::checked_sub, |a, b| a - b)
    });
    table.register("div", |args| {
      expect_args(args, 2)?;
      if to_num(&args[1])?.as_f64() == 0.0 {
        return Err("division by zero".to_string());
      }
      fold_numbers(args, i64::checked_div, |a, b| a / b)
    });
    table.register("mod", |args| {
      expect_args(args, 2)?;
      match (to_num(&args[0])?, to_num(&args[1])?) {
        (Num::Int(_), Num::Int(0)) => Err("division by zero".to_string()),
        (Num::Int(a), Num::Int(b)) => a
          .checked_rem(b)
          .map(Value::from)
          .ok_or_else(|| "integer overflow".to_string()),
        _ => Err("mod requires integers".to_string()),
      }
    });
    table.register("max", |args| extreme(args, Ordering::Greater));
    table.register("min", |args| extreme(args, Ordering::Less));

    table.register("eq", |args| {
      at_least(args, 2)?;
      Ok(Value::Bool(
        args[1..].iter().any(|other| values_equal(&args[0], other)),
      ))
    });
    table.register("ne", |args| {
      expect_args(args, 2)?;
      Ok(Value::Bool(!values_equal(&args[0], &args[1])))
    });
    table.register("lt", |args| ordered(args, |o| o == Ordering::Less));
    table.register("le", |args| ordered(args, |o| o != Ordering::Greater));
    table.register("gt", |args| ordered(args, |o| o == Ordering::Greater));
    table.register("ge", |args| ordered(args, |o| o != Ordering::Less));
    table.register("not", |args| {
      expect_args(args, 1)?;
      Ok(Value::Bool(!is_truthy(&args[0])))
    });
    table.register("and", |args| {
      at_least(args, 1)?;
      let found = args.iter().find(|arg| !is_truthy(arg));
      Ok(found.unwrap_or(&args[args.len() - 1]).clone())
    });
    table.register("or", |args| {
      at_least(args, 1)?;
      let found = args.iter().find(|arg| is_truthy(arg));
      Ok(found.unwrap_or(&args[args.len() - 1]).clone())
    });

    table.register("len", |args| {
      expect_args(args, 1)?;
      let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => return Err(format!("cannot take length of {}", type_name(other))),
      };
      Ok(Value::from(len))
    });
    table.register("index", |args| {
      at_least(args, 2)?;
      let mut current = args[0].clone();
      for key in &args[1..] {
        current = index_value(&current, key)?;
      }
      Ok(current)
    });
    table.register("toJson", |args| {
      expect_args(args, 1)?;
      serde_json::to_string(&args[0])
        .map(Value::String)
        .map_err(|e| e.to_string())
    });

    table.functions.insert(
      "default".to_string(),
      Function {
        call: Arc::new(|args: &[Value]| -> Result<Value, String> {
          expect_args(args, 2)?;
          if is_truthy(&args[1]) {
            Ok(args[1].clone())
          } else {
            Ok(args[0].clone())
          }
        }),
        tolerates_missing: true,
      },
    );

    table
  }

  /// Register a function, replacing any existing one with the same name.
  pub fn register<F>(&mut self, name: impl Into<String>, f: F)
  where
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
  {
    self.functions.insert(
      name.into(),
      Function {
        call: Arc::new(f),
        tolerates_missing: false,
      },
    );
  }

  pub fn contains(&self, name: &str) -> bool {
    self.functions.contains_key(name)
  }

  pub(crate) fn get(&self, name: &str) -> Option<&Function> {
    self.functions.get(name)
  }
}

impl Default for FunctionTable {
  fn default() -> Self {
    Self::builtin()
  }
}

impl fmt::Debug for FunctionTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<&String> = self.functions.keys().collect();
    names.sort();
    f.debug_struct("FunctionTable").field("functions", &names).finish()
  }
}

/// Truthiness used by conditions, filters and `default`: `null`, `false`,
/// zero, and empty strings or collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

#[derive(Debug, Clone, Copy)]
enum Num {
  Int(i64),
  Float(f64),
}

impl Num {
  fn as_f64(self) -> f64 {
    match self {
      Num::Int(i) => i as f64,
      Num::Float(f) => f,
    }
  }

  fn into_value(self) -> Result<Value, String> {
    match self {
      Num::Int(i) => Ok(Value::from(i)),
      Num::Float(f) => Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "result is not a finite number".to_string()),
    }
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "sequence",
    Value::Object(_) => "mapping",
  }
}

fn expect_args(args: &[Value], n: usize) -> Result<(), String> {
  if args.len() != n {
    return Err(format!("expected {n} arguments, got {}", args.len()));
  }
  Ok(())
}

fn at_least(args: &[Value], n: usize) -> Result<(), String> {
  if args.len() < n {
    return Err(format!(
      "expected at least {n} arguments, got {}",
      args.len()
    ));
  }
  Ok(())
}

fn one_str(args: &[Value]) -> Result<String, String> {
  expect_args(args, 1)?;
  Ok(stringify(&args[0]))
}

fn two_str(args: &[Value]) -> Result<(String, String), String> {
  expect_args(args, 2)?;
  Ok((stringify(&args[0]), stringify(&args[1])))
}

/// Numbers and numeric strings (environment values are always strings).
fn to_num(value: &Value) -> Result<Num, String> {
  match value {
    Value::Number(n) => match n.as_i64() {
      Some(i) => Ok(Num::Int(i)),
      None => n
        .as_f64()
        .map(Num::Float)
        .ok_or_else(|| format!("unsupported number {n}")),
    },
    Value::String(s) => {
      let s = s.trim();
      if let Ok(i) = s.parse::<i64>() {
        Ok(Num::Int(i))
      } else {
        s.parse::<f64>()
          .map(Num::Float)
          .map_err(|_| format!("'{s}' is not a number"))
      }
    }
    other => Err(format!("expected a number, got {}", type_name(other))),
  }
}

fn fold_numbers(
  args: &[Value],
  int_op: fn(i64, i64) -> Option<i64>,
  float_op: fn(f64, f64) -> f64,
) -> Result<Value, String> {
  let mut acc = to_num(&args[0])?;
  for arg in &args[1..] {
    acc = match (acc, to_num(arg)?) {
      (Num::Int(a), Num::Int(b)) => {
        Num::Int(int_op(a, b).ok_or_else(|| "integer overflow".to_string())?)
      }
      (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
    };
  }
  acc.into_value()
}

fn extreme(args: &[Value], wanted: Ordering) -> Result<Value, String> {
  at_least(args, 1)?;
  let mut best = to_num(&args[0])?;
  for arg in &args[1..] {
    let candidate = to_num(arg)?;
    if candidate.as_f64().partial_cmp(&best.as_f64()) == Some(wanted) {
      best = candidate;
    }
  }
  best.into_value()
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
    (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
    _ => None,
  }
}

fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
    _ => a == b,
  }
}

fn ordered(args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value, String> {
  expect_args(args, 2)?;
  compare(&args[0], &args[1])
    .map(|o| Value::Bool(accept(o)))
    .ok_or_else(|| {
      format!(
        "cannot compare {} with {}",
        type_name(&args[0]),
        type_name(&args[1])
      )
    })
}

fn index_value(collection: &Value, key: &Value) -> Result<Value, String> {
  match collection {
    Value::Array(items) => {
      let position = match to_num(key)? {
        Num::Int(i) if i >= 0 => i as usize,
        _ => return Err(format!("invalid sequence index {key}")),
      };
      items
        .get(position)
        .cloned()
        .ok_or_else(|| format!("index {position} out of range"))
    }
    Value::Object(map) => Ok(map.get(&stringify(key)).cloned().unwrap_or(Value::Null)),
    Value::Null => Ok(Value::Null),
    other => Err(format!("cannot index into {}", type_name(other))),
  }
}

fn title_case(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut at_word_start = true;
  for c in s.chars() {
    if at_word_start {
      out.extend(c.to_uppercase());
    } else {
      out.push(c);
    }
    at_word_start = !(c.is_alphanumeric() || c == '_');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn call(name: &str, args: &[Value]) -> Result<Value, String> {
    let table = FunctionTable::builtin();
    let function = table.get(name).unwrap();
    (function.call)(args)
  }

  #[test]
  fn test_case_conversion() {
    assert_eq!(call("upper", &[json!("john")]).unwrap(), json!("JOHN"));
    assert_eq!(call("lower", &[json!("JoHn")]).unwrap(), json!("john"));
    assert_eq!(
      call("title", &[json!("hello wide-world")]).unwrap(),
      json!("Hello Wide-World")
    );
  }

  #[test]
  fn test_arithmetic_keeps_integers() {
    assert_eq!(call("add", &[json!(10), json!(5)]).unwrap(), json!(15));
    assert_eq!(call("add", &[json!("3"), json!(4)]).unwrap(), json!(7));
    assert_eq!(call("mul", &[json!(2), json!(3), json!(4)]).unwrap(), json!(24));
    assert_eq!(call("sub", &[json!(10), json!(4)]).unwrap(), json!(6));
    assert_eq!(call("div", &[json!(7), json!(2)]).unwrap(), json!(3));
    assert_eq!(call("add", &[json!(1.5), json!(1)]).unwrap(), json!(2.5));
    assert_eq!(call("max", &[json!(3), json!(15), json!(7)]).unwrap(), json!(15));
    assert_eq!(call("min", &[json!(3), json!(15)]).unwrap(), json!(3));
  }

  #[test]
  fn test_arithmetic_errors() {
    assert!(call("div", &[json!(1), json!(0)]).is_err());
    assert!(call("add", &[json!("abc"), json!(1)]).is_err());
    assert!(call("add", &[json!(i64::MAX), json!(1)]).is_err());
    assert!(call("sub", &[json!(1)]).is_err());
    assert!(call("mod", &[json!(1), json!(0)]).is_err());
    assert_eq!(
      call("mod", &[json!(i64::MIN), json!(-1)]).unwrap_err(),
      "integer overflow"
    );
    assert_eq!(
      call("div", &[json!(i64::MIN), json!(-1)]).unwrap_err(),
      "integer overflow"
    );
  }

  #[test]
  fn test_mod_truncates_toward_zero() {
    assert_eq!(call("mod", &[json!(7), json!(3)]).unwrap(), json!(1));
    assert_eq!(call("mod", &[json!(-7), json!(3)]).unwrap(), json!(-1));
    assert_eq!(call("mod", &[json!(7), json!(-3)]).unwrap(), json!(1));
  }

  #[test]
  fn test_contains_takes_substring_first() {
    assert_eq!(
      call("contains", &[json!("doe"), json!("john doe")]).unwrap(),
      json!(true)
    );
    assert_eq!(
      call("contains", &[json!("john doe"), json!("doe")]).unwrap(),
      json!(false)
    );
  }

  #[test]
  fn test_comparisons() {
    assert_eq!(call("eq", &[json!(1), json!(1.0)]).unwrap(), json!(true));
    assert_eq!(call("eq", &[json!("a"), json!("b"), json!("a")]).unwrap(), json!(true));
    assert_eq!(call("ne", &[json!("a"), json!("b")]).unwrap(), json!(true));
    assert_eq!(call("lt", &[json!(1), json!(2)]).unwrap(), json!(true));
    assert_eq!(call("ge", &[json!("b"), json!("a")]).unwrap(), json!(true));
    assert!(call("lt", &[json!(1), json!("2")]).is_err());
  }

  #[test]
  fn test_default_uses_fallback_for_empty_values() {
    assert_eq!(call("default", &[json!("x"), Value::Null]).unwrap(), json!("x"));
    assert_eq!(call("default", &[json!("x"), json!("")]).unwrap(), json!("x"));
    assert_eq!(call("default", &[json!("x"), json!("set")]).unwrap(), json!("set"));
  }

  #[test]
  fn test_collections() {
    assert_eq!(call("len", &[json!([1, 2, 3])]).unwrap(), json!(3));
    assert_eq!(call("len", &[json!("héllo")]).unwrap(), json!(5));
    assert_eq!(call("index", &[json!(["a", "b"]), json!(1)]).unwrap(), json!("b"));
    assert_eq!(
      call("index", &[json!({ "k": { "n": 2 } }), json!("k"), json!("n")]).unwrap(),
      json!(2)
    );
    assert!(call("index", &[json!(["a"]), json!(3)]).is_err());
    assert_eq!(
      call("join", &[json!(","), json!(["a", 1, true])]).unwrap(),
      json!("a,1,true")
    );
    assert_eq!(
      call("split", &[json!(","), json!("a,b")]).unwrap(),
      json!(["a", "b"])
    );
    assert_eq!(call("toJson", &[json!({ "a": 1 })]).unwrap(), json!("{\"a\":1}"));
  }

  #[test]
  fn test_custom_function_registration() {
    let mut table = FunctionTable::empty();
    assert!(!table.contains("shout"));
    table.register("shout", |args| Ok(Value::String(format!("{}!", stringify(&args[0])))));
    let function = table.get("shout").unwrap();
    assert_eq!((function.call)(&[json!("hi")]).unwrap(), json!("hi!"));
  }

  #[test]
  fn test_truthiness() {
    assert!(!is_truthy(&json!(null)));
    assert!(!is_truthy(&json!(0)));
    assert!(!is_truthy(&json!("")));
    assert!(!is_truthy(&json!([])));
    assert!(is_truthy(&json!("false")));
    assert!(is_truthy(&json!({ "a": 1 })));
  }
}

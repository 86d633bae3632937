//! Splits a template into literal text and actions, and parses each
//! action into an expression tree.

use serde_json::Value;

use crate::error::TemplateError;
use crate::lexer::{Token, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
  Path(Vec<String>),
  Literal(Value),
  Call { name: String, args: Vec<Expr> },
}

impl Expr {
  /// Collect every path referenced by this expression.
  pub(crate) fn paths<'a>(&'a self, out: &mut Vec<&'a [String]>) {
    match self {
      Expr::Path(path) => out.push(path),
      Expr::Literal(_) => {}
      Expr::Call { args, .. } => args.iter().for_each(|arg| arg.paths(out)),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
  Text(String),
  Action(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Template {
  pub segments: Vec<Segment>,
}

impl Template {
  /// The single action of a template that is one placeholder, optionally
  /// surrounded by whitespace.
  pub(crate) fn single_action(&self) -> Option<&Expr> {
    let mut action = None;
    for segment in &self.segments {
      match segment {
        Segment::Text(text) if text.trim().is_empty() => {}
        Segment::Text(_) => return None,
        Segment::Action(expr) => {
          if action.is_some() {
            return None;
          }
          action = Some(expr);
        }
      }
    }
    action
  }

  pub(crate) fn paths(&self) -> Vec<&[String]> {
    let mut out = Vec::new();
    for segment in &self.segments {
      if let Segment::Action(expr) = segment {
        expr.paths(&mut out);
      }
    }
    out
  }
}

const UNSUPPORTED_KEYWORDS: &[&str] = &[
  "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
];

/// Parse a full template string.
pub(crate) fn parse_template(src: &str) -> Result<Template, TemplateError> {
  let mut segments = Vec::new();
  let mut rest = src;
  let mut trim_next = false;

  while let Some(open) = rest.find("{{") {
    let mut text = &rest[..open];
    if trim_next {
      text = text.trim_start();
    }
    let after_open = &rest[open + 2..];
    let close = find_close(after_open).ok_or_else(|| TemplateError::syntax(src, "unclosed action"))?;
    let mut inner = &after_open[..close];
    rest = &after_open[close + 2..];

    let trim_left = inner.starts_with('-') && inner[1..].starts_with(char::is_whitespace);
    if trim_left {
      inner = &inner[1..];
      text = text.trim_end();
    }
    trim_next = inner.ends_with('-') && inner[..inner.len() - 1].ends_with(char::is_whitespace);
    if trim_next {
      inner = &inner[..inner.len() - 1];
    }

    if !text.is_empty() {
      segments.push(Segment::Text(text.to_string()));
    }

    let trimmed = inner.trim();
    if trimmed.starts_with("/*") && trimmed.ends_with("*/") {
      continue;
    }
    let expr = parse_expression(trimmed).map_err(|message| TemplateError::syntax(src, message))?;
    segments.push(Segment::Action(expr));
  }

  let tail = if trim_next { rest.trim_start() } else { rest };
  if !tail.is_empty() {
    segments.push(Segment::Text(tail.to_string()));
  }

  Ok(Template { segments })
}

/// Locate the closing `}}` of an action, skipping over quoted strings.
fn find_close(src: &str) -> Option<usize> {
  let bytes = src.as_bytes();
  let mut i = 0;
  let mut quote: Option<u8> = None;
  while i < bytes.len() {
    let b = bytes[i];
    match quote {
      Some(q) => {
        if b == b'\\' && q == b'"' {
          i += 1;
        } else if b == q {
          quote = None;
        }
      }
      None => {
        if b == b'"' || b == b'`' {
          quote = Some(b);
        } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
          return Some(i);
        }
      }
    }
    i += 1;
  }
  None
}

/// Parse a bare expression such as `add .a 1 | upper`.
pub(crate) fn parse_expression(src: &str) -> Result<Expr, String> {
  let tokens = tokenize(src)?;
  if let Some(Token::Ident(word)) = tokens.first() {
    if UNSUPPORTED_KEYWORDS.contains(&word.as_str()) {
      return Err(format!("unsupported action '{word}'"));
    }
  }
  let mut parser = Parser { tokens, pos: 0 };
  let expr = parser.parse_pipeline()?;
  if parser.pos < parser.tokens.len() {
    return Err(format!(
      "unexpected token {:?}",
      parser.tokens[parser.pos]
    ));
  }
  Ok(expr)
}

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn at_command_end(&self) -> bool {
    matches!(self.peek(), None | Some(Token::Pipe) | Some(Token::RParen))
  }

  fn parse_pipeline(&mut self) -> Result<Expr, String> {
    let mut expr = self.parse_command()?;
    while self.peek() == Some(&Token::Pipe) {
      self.pos += 1;
      expr = match self.parse_command()? {
        Expr::Call { name, mut args } => {
          args.push(expr);
          Expr::Call { name, args }
        }
        _ => return Err("pipeline stage must be a function call".to_string()),
      };
    }
    Ok(expr)
  }

  fn parse_command(&mut self) -> Result<Expr, String> {
    if self.at_command_end() {
      return Err("empty command".to_string());
    }

    if let Some(Token::Ident(name)) = self.peek().cloned() {
      self.pos += 1;
      let mut args = Vec::new();
      while !self.at_command_end() {
        args.push(self.parse_operand()?);
      }
      return Ok(Expr::Call { name, args });
    }

    let operand = self.parse_operand()?;
    if !self.at_command_end() {
      return Err(format!(
        "unexpected argument {:?}; only functions take arguments",
        self.tokens[self.pos]
      ));
    }
    Ok(operand)
  }

  fn parse_operand(&mut self) -> Result<Expr, String> {
    match self.next() {
      Some(Token::Field(path)) => Ok(Expr::Path(path)),
      Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
      Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
      Some(Token::Float(f)) => Ok(Expr::Literal(Value::from(f))),
      Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
      Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
      // A bare function name used as an argument is called with no arguments.
      Some(Token::Ident(name)) => Ok(Expr::Call {
        name,
        args: Vec::new(),
      }),
      Some(Token::LParen) => {
        let inner = self.parse_pipeline()?;
        match self.next() {
          Some(Token::RParen) => Ok(inner),
          _ => Err("missing closing parenthesis".to_string()),
        }
      }
      Some(token) => Err(format!("unexpected token {token:?}")),
      None => Err("unexpected end of expression".to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn path(segments: &[&str]) -> Expr {
    Expr::Path(segments.iter().map(|s| s.to_string()).collect())
  }

  #[test]
  fn test_parse_mixed_template() {
    let template = parse_template("{{ .env.API_BASE }}/users/{{ .trigger.input.user.id }}").unwrap();
    assert_eq!(
      template.segments,
      vec![
        Segment::Action(path(&["env", "API_BASE"])),
        Segment::Text("/users/".to_string()),
        Segment::Action(path(&["trigger", "input", "user", "id"])),
      ]
    );
    assert!(template.single_action().is_none());
  }

  #[test]
  fn test_single_action_ignores_surrounding_whitespace() {
    let template = parse_template("  {{ .trigger.input }} ").unwrap();
    assert_eq!(template.single_action(), Some(&path(&["trigger", "input"])));
  }

  #[test]
  fn test_pipe_appends_previous_value() {
    let expr = parse_expression(r#".missing | default "x""#).unwrap();
    assert_eq!(
      expr,
      Expr::Call {
        name: "default".to_string(),
        args: vec![Expr::Literal(Value::from("x")), path(&["missing"])],
      }
    );
  }

  #[test]
  fn test_parenthesized_call() {
    let expr = parse_expression("add (len .items) 1").unwrap();
    assert_eq!(
      expr,
      Expr::Call {
        name: "add".to_string(),
        args: vec![
          Expr::Call {
            name: "len".to_string(),
            args: vec![path(&["items"])],
          },
          Expr::Literal(Value::from(1)),
        ],
      }
    );
  }

  #[test]
  fn test_trim_markers() {
    let template = parse_template("a  {{- .x -}}  b").unwrap();
    assert_eq!(
      template.segments,
      vec![
        Segment::Text("a".to_string()),
        Segment::Action(path(&["x"])),
        Segment::Text("b".to_string()),
      ]
    );
  }

  #[test]
  fn test_closing_braces_inside_string_literal() {
    let template = parse_template(r#"{{ default "}}" .x }}"#).unwrap();
    assert_eq!(template.segments.len(), 1);
  }

  #[test]
  fn test_malformed_templates() {
    assert!(matches!(
      parse_template("{{ .a "),
      Err(TemplateError::Syntax { .. })
    ));
    assert!(matches!(
      parse_template("{{ if .a }}yes{{ end }}"),
      Err(TemplateError::Syntax { .. })
    ));
    assert!(matches!(
      parse_template("{{ .a .b }}"),
      Err(TemplateError::Syntax { .. })
    ));
    assert!(matches!(
      parse_template("{{ }}"),
      Err(TemplateError::Syntax { .. })
    ));
  }
}

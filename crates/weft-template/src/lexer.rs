//! Tokenizer for the inside of a single `{{ }}` action.

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
  /// `.a.b.c`; an empty path is the bare `.`
  Field(Vec<String>),
  Ident(String),
  Str(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  Null,
  Pipe,
  LParen,
  RParen,
}

fn is_field_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_ident_start(c: char) -> bool {
  c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, String> {
  let chars: Vec<char> = src.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    match c {
      c if c.is_whitespace() => i += 1,
      '|' => {
        tokens.push(Token::Pipe);
        i += 1;
      }
      '(' => {
        tokens.push(Token::LParen);
        i += 1;
      }
      ')' => {
        tokens.push(Token::RParen);
        i += 1;
      }
      '.' => {
        i += 1;
        let mut segments = Vec::new();
        loop {
          let start = i;
          while i < chars.len() && is_field_char(chars[i]) {
            i += 1;
          }
          if i == start {
            if segments.is_empty() {
              break;
            }
            return Err(format!("empty path segment at offset {start}"));
          }
          segments.push(chars[start..i].iter().collect());
          if i < chars.len() && chars[i] == '.' {
            i += 1;
          } else {
            break;
          }
        }
        tokens.push(Token::Field(segments));
      }
      '"' => {
        let (value, next) = lex_quoted(&chars, i)?;
        tokens.push(Token::Str(value));
        i = next;
      }
      '`' => {
        let start = i + 1;
        let end = chars[start..]
          .iter()
          .position(|&ch| ch == '`')
          .map(|offset| start + offset)
          .ok_or_else(|| "unterminated raw string".to_string())?;
        tokens.push(Token::Str(chars[start..end].iter().collect()));
        i = end + 1;
      }
      c if c.is_ascii_digit()
        || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
      {
        let (token, next) = lex_number(&chars, i)?;
        tokens.push(token);
        i = next;
      }
      c if is_ident_start(c) => {
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
          i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        tokens.push(match word.as_str() {
          "true" => Token::Bool(true),
          "false" => Token::Bool(false),
          "null" | "nil" => Token::Null,
          _ => Token::Ident(word),
        });
      }
      '$' => return Err("template variables are not supported".to_string()),
      other => return Err(format!("unexpected character '{other}' at offset {i}")),
    }
  }

  Ok(tokens)
}

fn lex_quoted(chars: &[char], open: usize) -> Result<(String, usize), String> {
  let mut value = String::new();
  let mut i = open + 1;
  while i < chars.len() {
    match chars[i] {
      '"' => return Ok((value, i + 1)),
      '\\' => {
        let escaped = chars
          .get(i + 1)
          .ok_or_else(|| "unterminated escape sequence".to_string())?;
        value.push(match escaped {
          'n' => '\n',
          't' => '\t',
          'r' => '\r',
          '"' => '"',
          '\\' => '\\',
          other => return Err(format!("unknown escape sequence '\\{other}'")),
        });
        i += 2;
      }
      c => {
        value.push(c);
        i += 1;
      }
    }
  }
  Err("unterminated string literal".to_string())
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
  let mut i = start;
  if chars[i] == '-' {
    i += 1;
  }
  while i < chars.len() && chars[i].is_ascii_digit() {
    i += 1;
  }
  let mut is_float = false;
  if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
    is_float = true;
    i += 1;
    while i < chars.len() && chars[i].is_ascii_digit() {
      i += 1;
    }
  }
  let text: String = chars[start..i].iter().collect();
  let token = if is_float {
    Token::Float(
      text
        .parse()
        .map_err(|_| format!("invalid number literal '{text}'"))?,
    )
  } else {
    Token::Int(
      text
        .parse()
        .map_err(|_| format!("invalid number literal '{text}'"))?,
    )
  };
  Ok((token, i))
}

//! Inline script evaluation for `$$...$$` spans in transcluded files.
//!
//! Scripts see exactly two bindings, `path` and `data`, and must produce a
//! string. The default [`ExpressionEngine`] evaluates a small expression
//! language:
//!
//! ```text
//! program := ["return"] expr [";"]
//! expr    := postfix ("+" postfix)*
//! postfix := primary ("." ident ["(" args ")"])*
//! primary := string | integer | ident | ident "(" args ")" | "(" expr ")"
//! ```
//!
//! ```
//! use snipwiki_commonmark::transclusion::script::{
//!   ExpressionEngine,
//!   ScriptEngine,
//!   ScriptScope,
//! };
//!
//! let engine = ExpressionEngine::new();
//! let scope = ScriptScope { path: "/a.md", data: "one\ntwo" };
//! let out = engine.evaluate("data.lines().len() + ' lines'", &scope);
//! assert_eq!(out.as_deref(), Ok("2 lines"));
//! ```
use std::{collections::HashMap, fmt, sync::Arc};

/// Bindings visible to a script.
#[derive(Debug, Clone, Copy)]
pub struct ScriptScope<'a> {
  /// Path of the file the script was found in.
  pub path: &'a str,
  /// Raw text of that file.
  pub data: &'a str,
}

/// A failed script evaluation, shown inline as `name: message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct ScriptError {
  pub name:    String,
  pub message: String,
}

impl ScriptError {
  pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      name:    name.into(),
      message: message.into(),
    }
  }

  pub fn syntax(message: impl Into<String>) -> Self {
    Self::new("SyntaxError", message)
  }

  pub fn reference(message: impl Into<String>) -> Self {
    Self::new("ReferenceError", message)
  }

  pub fn type_error(message: impl Into<String>) -> Self {
    Self::new("TypeError", message)
  }

  pub fn range(message: impl Into<String>) -> Self {
    Self::new("RangeError", message)
  }
}

/// Evaluates inline scripts.
pub trait ScriptEngine: Send + Sync {
  /// Evaluate `source` with the given bindings.
  ///
  /// # Errors
  ///
  /// Returns a [`ScriptError`] describing why the script failed; the caller
  /// renders it in place of the script.
  fn evaluate(
    &self,
    source: &str,
    scope: &ScriptScope<'_>,
  ) -> Result<String, ScriptError>;
}

/// A script value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Str(String),
  Int(i64),
  Bool(bool),
  List(Vec<Value>),
}

impl Value {
  const fn type_name(&self) -> &'static str {
    match self {
      Self::Str(_) => "string",
      Self::Int(_) => "number",
      Self::Bool(_) => "boolean",
      Self::List(_) => "list",
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Str(s) => f.write_str(s),
      Self::Int(n) => write!(f, "{n}"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::List(items) => {
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            f.write_str(",")?;
          }
          write!(f, "{item}")?;
        }
        Ok(())
      },
    }
  }
}

/// A host function callable from scripts.
pub type HostFunction =
  Arc<dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync>;

/// The default script engine: a side-effect free expression evaluator.
#[derive(Clone, Default)]
pub struct ExpressionEngine {
  functions: HashMap<String, HostFunction>,
}

impl fmt::Debug for ExpressionEngine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<&String> = self.functions.keys().collect();
    names.sort();
    f.debug_struct("ExpressionEngine")
      .field("functions", &names)
      .finish()
  }
}

impl ExpressionEngine {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Make a host function callable as `name(args...)`.
  #[must_use]
  pub fn register<F>(mut self, name: &str, function: F) -> Self
  where
    F: Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static,
  {
    self.functions.insert(name.to_string(), Arc::new(function));
    self
  }

  fn eval(&self, expr: &Expr, scope: &ScriptScope<'_>) -> Result<Value, ScriptError> {
    match expr {
      Expr::Literal(value) => Ok(value.clone()),
      Expr::Ident(name) => {
        match name.as_str() {
          "path" => Ok(Value::Str(scope.path.to_string())),
          "data" => Ok(Value::Str(scope.data.to_string())),
          "true" => Ok(Value::Bool(true)),
          "false" => Ok(Value::Bool(false)),
          _ => Err(ScriptError::reference(format!("{name} is not defined"))),
        }
      },
      Expr::Call { name, args } => {
        let function = self.functions.get(name).ok_or_else(|| {
          ScriptError::reference(format!("{name} is not defined"))
        })?;
        let args = self.eval_all(args, scope)?;
        function(&args)
      },
      Expr::Method { target, name, args } => {
        let target = self.eval(target, scope)?;
        let args = self.eval_all(args, scope)?;
        call_method(target, name, &args)
      },
      Expr::Add(left, right) => {
        let left = self.eval(left, scope)?;
        let right = self.eval(right, scope)?;
        add(left, right)
      },
    }
  }

  fn eval_all(
    &self,
    exprs: &[Expr],
    scope: &ScriptScope<'_>,
  ) -> Result<Vec<Value>, ScriptError> {
    exprs.iter().map(|expr| self.eval(expr, scope)).collect()
  }
}

impl ScriptEngine for ExpressionEngine {
  fn evaluate(
    &self,
    source: &str,
    scope: &ScriptScope<'_>,
  ) -> Result<String, ScriptError> {
    let tokens = tokenize(source)?;
    let expr = Parser::new(tokens).parse_program()?;
    Ok(self.eval(&expr, scope)?.to_string())
  }
}

fn add(left: Value, right: Value) -> Result<Value, ScriptError> {
  match (left, right) {
    (Value::Int(a), Value::Int(b)) => {
      a.checked_add(b)
        .map(Value::Int)
        .ok_or_else(|| ScriptError::range("integer overflow"))
    },
    (left @ Value::Str(_), right) | (left, right @ Value::Str(_)) => {
      Ok(Value::Str(format!("{left}{right}")))
    },
    (left, right) => {
      Err(ScriptError::type_error(format!(
        "cannot add {} and {}",
        left.type_name(),
        right.type_name()
      )))
    },
  }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), ScriptError> {
  if args.len() == count {
    Ok(())
  } else {
    Err(ScriptError::type_error(format!(
      "{name} expects {count} argument(s), got {}",
      args.len()
    )))
  }
}

fn str_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str, ScriptError> {
  match value {
    Value::Str(s) => Ok(s),
    other => {
      Err(ScriptError::type_error(format!(
        "{name} expects a string, got {}",
        other.type_name()
      )))
    },
  }
}

fn index_arg(name: &str, value: &Value) -> Result<usize, ScriptError> {
  match value {
    Value::Int(n) => {
      usize::try_from(*n)
        .map_err(|_| ScriptError::range(format!("index {n} out of range")))
    },
    other => {
      Err(ScriptError::type_error(format!(
        "{name} expects a number, got {}",
        other.type_name()
      )))
    },
  }
}

fn len_value(len: usize) -> Result<Value, ScriptError> {
  i64::try_from(len)
    .map(Value::Int)
    .map_err(|_| ScriptError::range("length out of range"))
}

fn call_method(
  target: Value,
  name: &str,
  args: &[Value],
) -> Result<Value, ScriptError> {
  match (target, name) {
    (Value::Str(s), "trim") => {
      expect_args(name, args, 0)?;
      Ok(Value::Str(s.trim().to_string()))
    },
    (Value::Str(s), "upper") => {
      expect_args(name, args, 0)?;
      Ok(Value::Str(s.to_uppercase()))
    },
    (Value::Str(s), "lower") => {
      expect_args(name, args, 0)?;
      Ok(Value::Str(s.to_lowercase()))
    },
    (Value::Str(s), "len" | "length") => {
      expect_args(name, args, 0)?;
      len_value(s.chars().count())
    },
    (Value::List(items), "len" | "length") => {
      expect_args(name, args, 0)?;
      len_value(items.len())
    },
    (Value::Str(s), "lines") => {
      expect_args(name, args, 0)?;
      Ok(Value::List(
        s.lines().map(|line| Value::Str(line.to_string())).collect(),
      ))
    },
    (Value::Str(s), "split") => {
      expect_args(name, args, 1)?;
      let sep = str_arg(name, &args[0])?;
      let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::Str(c.to_string())).collect()
      } else {
        s.split(sep).map(|part| Value::Str(part.to_string())).collect()
      };
      Ok(Value::List(parts))
    },
    (Value::List(items), "join") => {
      let sep = match args {
        [] => ",",
        [sep] => str_arg(name, sep)?,
        _ => return Err(ScriptError::type_error("join expects 0 or 1 argument(s)")),
      };
      let joined = items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep);
      Ok(Value::Str(joined))
    },
    (Value::Str(s), "replace") => {
      expect_args(name, args, 2)?;
      let from = str_arg(name, &args[0])?;
      let to = str_arg(name, &args[1])?;
      Ok(Value::Str(s.replace(from, to)))
    },
    (Value::List(items), "first") => {
      expect_args(name, args, 0)?;
      items
        .into_iter()
        .next()
        .ok_or_else(|| ScriptError::range("first of an empty list"))
    },
    (Value::List(items), "last") => {
      expect_args(name, args, 0)?;
      items
        .into_iter()
        .next_back()
        .ok_or_else(|| ScriptError::range("last of an empty list"))
    },
    (Value::List(items), "get") => {
      expect_args(name, args, 1)?;
      let index = index_arg(name, &args[0])?;
      let len = items.len();
      items.into_iter().nth(index).ok_or_else(|| {
        ScriptError::range(format!("index {index} out of range for length {len}"))
      })
    },
    (Value::Str(s), "get") => {
      expect_args(name, args, 1)?;
      let index = index_arg(name, &args[0])?;
      s.chars()
        .nth(index)
        .map(|c| Value::Str(c.to_string()))
        .ok_or_else(|| ScriptError::range(format!("index {index} out of range")))
    },
    (Value::Str(s), "contains") => {
      expect_args(name, args, 1)?;
      Ok(Value::Bool(s.contains(&args[0].to_string())))
    },
    (Value::List(items), "contains") => {
      expect_args(name, args, 1)?;
      Ok(Value::Bool(items.contains(&args[0])))
    },
    (Value::Str(s), "starts_with") => {
      expect_args(name, args, 1)?;
      Ok(Value::Bool(s.starts_with(str_arg(name, &args[0])?)))
    },
    (Value::Str(s), "ends_with") => {
      expect_args(name, args, 1)?;
      Ok(Value::Bool(s.ends_with(str_arg(name, &args[0])?)))
    },
    (target, _) => {
      Err(ScriptError::type_error(format!(
        "{}.{name} is not a function",
        target.type_name()
      )))
    },
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  Str(String),
  Int(i64),
  Ident(String),
  Plus,
  LParen,
  RParen,
  Comma,
  Dot,
  Semi,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
  let mut tokens = Vec::new();
  let mut chars = source.chars().peekable();
  while let Some(&c) = chars.peek() {
    match c {
      c if c.is_whitespace() => {
        chars.next();
      },
      '"' | '\'' | '`' => {
        chars.next();
        let mut literal = String::new();
        loop {
          match chars.next() {
            None => return Err(ScriptError::syntax("unterminated string literal")),
            Some(ch) if ch == c => break,
            Some('\\') => {
              let escaped = match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some(other) => other,
                None => {
                  return Err(ScriptError::syntax("unterminated string literal"));
                },
              };
              literal.push(escaped);
            },
            Some(ch) => literal.push(ch),
          }
        }
        tokens.push(Token::Str(literal));
      },
      c if c.is_ascii_digit() => {
        let mut digits = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
          digits.push(d);
          chars.next();
        }
        let value = digits
          .parse::<i64>()
          .map_err(|_| ScriptError::range(format!("number {digits} out of range")))?;
        tokens.push(Token::Int(value));
      },
      c if c.is_alphabetic() || c == '_' || c == '$' => {
        let mut ident = String::new();
        while let Some(&d) = chars
          .peek()
          .filter(|d| d.is_alphanumeric() || **d == '_' || **d == '$')
        {
          ident.push(d);
          chars.next();
        }
        tokens.push(Token::Ident(ident));
      },
      _ => {
        chars.next();
        tokens.push(match c {
          '+' => Token::Plus,
          '(' => Token::LParen,
          ')' => Token::RParen,
          ',' => Token::Comma,
          '.' => Token::Dot,
          ';' => Token::Semi,
          other => {
            return Err(ScriptError::syntax(format!(
              "unexpected character '{other}'"
            )));
          },
        });
      },
    }
  }
  Ok(tokens)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
  Literal(Value),
  Ident(String),
  Call {
    name: String,
    args: Vec<Expr>,
  },
  Method {
    target: Box<Expr>,
    name:   String,
    args:   Vec<Expr>,
  },
  Add(Box<Expr>, Box<Expr>),
}

struct Parser {
  tokens: Vec<Token>,
  pos:    usize,
}

impl Parser {
  const fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    token
  }

  fn eat(&mut self, token: &Token) -> bool {
    if self.peek() == Some(token) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn parse_program(&mut self) -> Result<Expr, ScriptError> {
    if matches!(self.peek(), Some(Token::Ident(word)) if word == "return") {
      self.pos += 1;
    }
    let expr = self.parse_expr()?;
    self.eat(&Token::Semi);
    match self.peek() {
      None => Ok(expr),
      Some(token) => {
        Err(ScriptError::syntax(format!("unexpected token {token:?}")))
      },
    }
  }

  fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
    let mut left = self.parse_postfix()?;
    while self.eat(&Token::Plus) {
      let right = self.parse_postfix()?;
      left = Expr::Add(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
    let mut expr = self.parse_primary()?;
    while self.eat(&Token::Dot) {
      let Some(Token::Ident(name)) = self.next() else {
        return Err(ScriptError::syntax("expected a method name after '.'"));
      };
      let args = if self.eat(&Token::LParen) {
        self.parse_args()?
      } else {
        Vec::new()
      };
      expr = Expr::Method {
        target: Box::new(expr),
        name,
        args,
      };
    }
    Ok(expr)
  }

  fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
    match self.next() {
      Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
      Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
      Some(Token::Ident(name)) => {
        if self.eat(&Token::LParen) {
          let args = self.parse_args()?;
          Ok(Expr::Call { name, args })
        } else {
          Ok(Expr::Ident(name))
        }
      },
      Some(Token::LParen) => {
        let expr = self.parse_expr()?;
        if self.eat(&Token::RParen) {
          Ok(expr)
        } else {
          Err(ScriptError::syntax("expected ')'"))
        }
      },
      Some(token) => {
        Err(ScriptError::syntax(format!("unexpected token {token:?}")))
      },
      None => Err(ScriptError::syntax("unexpected end of input")),
    }
  }

  /// Arguments after an opening parenthesis, consuming the closing one.
  fn parse_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
    let mut args = Vec::new();
    if self.eat(&Token::RParen) {
      return Ok(args);
    }
    loop {
      args.push(self.parse_expr()?);
      if self.eat(&Token::RParen) {
        return Ok(args);
      }
      if !self.eat(&Token::Comma) {
        return Err(ScriptError::syntax("expected ',' or ')'"));
      }
    }
  }
}

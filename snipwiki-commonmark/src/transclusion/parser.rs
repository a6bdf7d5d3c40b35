//! Hand-written parsers for the transclusion micro-grammar.
//!
//! A directive line looks like
//!
//! ```text
//! [## ][+#name=value|positional](/path/to/file.md "optional title")
//! ```
//!
//! and placeholders inside the transcluded file look like `{{name}}` or
//! `{{name|default}}`.
use std::{collections::HashMap, ops::Range};

use crate::utils::{self, chop_str};

/// Parameter bindings of one directive. Named parameters are bound under
/// their name, every parameter is also bound under its 1-based position.
pub type Params = HashMap<String, String>;

/// One recognized transclusion line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveMatch {
  /// The full line, used as the replacement key.
  pub source_line:           String,
  /// Normalized absolute path of the transcluded document.
  pub target_path:           String,
  /// Number of `#` in front of the directive, 0 when there are none.
  pub heading_degrade_level: usize,
  pub params:                Params,
}

/// A `{{name|default}}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
  pub name:    String,
  pub default: Option<String>,
}

impl Placeholder {
  /// Parse the text between `{{` and `}}`.
  #[must_use]
  pub fn parse(inner: &str) -> Self {
    match chop_str(inner, "|", true, false) {
      (name, Some(default)) => {
        Self {
          name:    name.to_string(),
          default: Some(default.to_string()),
        }
      },
      (name, None) => {
        Self {
          name:    name.to_string(),
          default: None,
        }
      },
    }
  }

  /// Value for this placeholder: the bound parameter, else the default, else
  /// the literal `undefined`. Escaped newlines in parameter and default
  /// values are unescaped.
  #[must_use]
  pub fn resolve(&self, params: &Params) -> String {
    params
      .get(&self.name)
      .or(self.default.as_ref())
      .map_or_else(|| "undefined".to_string(), |value| value.replace("\\n", "\n"))
  }
}

/// Parse a transclusion directive line.
///
/// Returns `None` for anything that is not a directive, including
/// directives whose target is not an internal `.md` document or escapes the
/// root.
#[must_use]
pub fn parse_directive_line(line: &str) -> Option<DirectiveMatch> {
  let mut rest = line;

  let mut heading_degrade_level = 0;
  if rest.starts_with('#') {
    let hashes = rest.len() - rest.trim_start_matches('#').len();
    let after = &rest[hashes..];
    if !(2..=6).contains(&hashes) || !after.starts_with(' ') {
      return None;
    }
    heading_degrade_level = hashes;
    rest = &after[1..];
  }

  let rest = rest.trim_start().strip_prefix("[+")?;

  let (body, target) = split_label(rest)?;
  let path = parse_link_target(target)?;
  let target_path = internal_document_path(path)?;

  let params = match body {
    Some(body) => parse_params(body),
    None => Params::new(),
  };

  Some(DirectiveMatch {
    source_line: line.to_string(),
    target_path,
    heading_degrade_level,
    params,
  })
}

/// Split `#params](target)` into the parameter body and the link target.
///
/// The body may itself contain `](`, so the split point is the last one
/// after which a valid link target follows.
fn split_label(rest: &str) -> Option<(Option<&str>, &str)> {
  if let Some(target) = rest.strip_prefix(']') {
    return Some((None, target));
  }
  let body = rest.strip_prefix('#')?;
  body
    .rmatch_indices("](")
    .map(|(index, _)| (&body[..index], &body[index + 1..]))
    .find(|(label, target)| {
      !label.is_empty() && parse_link_target(target).is_some()
    })
    .map(|(label, target)| (Some(label), target))
}

/// Parse `(path)` or `(path "title")` spanning the rest of the line and
/// return the path.
fn parse_link_target(target: &str) -> Option<&str> {
  let inner = target.strip_prefix('(')?.strip_suffix(')')?;
  let path_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
  let (path, title) = inner.split_at(path_end);
  if path.is_empty() || path.contains(['(', ')']) {
    return None;
  }
  let title = title.trim_start();
  if title.is_empty() {
    return (path_end == inner.len()).then_some(path);
  }
  let quoted = title.strip_prefix('"')?.strip_suffix('"')?;
  (!quoted.contains('"')).then_some(path)
}

/// Normalize a link path if it names an internal Markdown document.
fn internal_document_path(path: &str) -> Option<String> {
  if utils::has_scheme(path) || path.starts_with('#') {
    return None;
  }
  let path = path.split(['?', '#']).next().unwrap_or(path);
  if !path.ends_with(".md") {
    return None;
  }
  utils::normalize_path(path)
}

/// Parse `name=value|positional|...` into parameter bindings.
#[must_use]
pub fn parse_params(body: &str) -> Params {
  let mut params = Params::new();
  for (index, segment) in body.split('|').enumerate() {
    let (key, value) = chop_str(segment.trim(), "=", true, false);
    let param = match value {
      Some(value) => {
        if !key.is_empty() {
          params.insert(key.to_string(), value.to_string());
        }
        value
      },
      None => key,
    };
    params.insert((index + 1).to_string(), param.to_string());
  }
  params
}

/// Locate `{{...}}` placeholders on single lines.
#[must_use]
pub fn find_placeholders(text: &str) -> Vec<(Range<usize>, Placeholder)> {
  let mut found = Vec::new();
  let mut cursor = 0;
  while let Some(offset) = text[cursor..].find("{{") {
    let start = cursor + offset;
    let inner_start = start + 2;
    let Some(close) = text[inner_start..].find("}}") else {
      break;
    };
    let inner = &text[inner_start..inner_start + close];
    if inner.is_empty() || inner.contains('\n') {
      cursor = inner_start;
      continue;
    }
    let end = inner_start + close + 2;
    found.push((start..end, Placeholder::parse(inner)));
    cursor = end;
  }
  found
}

/// Replace every placeholder in `text` with its resolved value.
#[must_use]
pub fn substitute_placeholders(text: &str, params: &Params) -> String {
  let mut out = String::with_capacity(text.len());
  let mut last = 0;
  for (range, placeholder) in find_placeholders(text) {
    out.push_str(&text[last..range.start]);
    out.push_str(&placeholder.resolve(params));
    last = range.end;
  }
  out.push_str(&text[last..]);
  out
}

/// Locate `$$...$$` inline script spans, delimiters included.
#[must_use]
pub fn find_script_spans(text: &str) -> Vec<Range<usize>> {
  let mut spans = Vec::new();
  let mut cursor = 0;
  while let Some(offset) = text[cursor..].find("$$") {
    let start = cursor + offset;
    let Some(close) = text[start + 2..].find("$$") else {
      break;
    };
    let end = start + 2 + close + 2;
    spans.push(start..end);
    cursor = end;
  }
  spans
}

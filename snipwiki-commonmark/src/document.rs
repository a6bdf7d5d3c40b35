//! Documents as handed out by a file provider, and the flag lines that carry
//! their metadata (`@title:`, `@tags:`, `@updated:`, `@author:`).
use std::{cmp::Ordering, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::{self, never_matching_regex};

/// Raw result of a file fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedFile {
  /// Path that was requested.
  pub path:     String,
  /// File content, or a short status message when `is_error` is set.
  pub data:     String,
  /// Whether the fetch failed.
  pub is_error: bool,
}

impl FetchedFile {
  #[must_use]
  pub fn ok(path: impl Into<String>, data: impl Into<String>) -> Self {
    Self {
      path:     path.into(),
      data:     data.into(),
      is_error: false,
    }
  }

  #[must_use]
  pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      path:     path.into(),
      data:     message.into(),
      is_error: true,
    }
  }
}

/// Metadata flags of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFlags {
  pub title:   String,
  pub tags:    Vec<String>,
  pub updated: Vec<String>,
  pub author:  Option<String>,
}

/// A wiki page, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub path:     String,
  pub raw_text: String,
  pub flags:    DocumentFlags,
  pub is_error: bool,
}

static FLAG_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?m)^@(title|tags|updated|author):[ \t]*(.*?)[ \t]*\r?$")
    .unwrap_or_else(|e| {
      log::error!("Failed to compile FLAG_RE regex: {e}");
      never_matching_regex()
    })
});

impl Document {
  /// Build a document from fetched content, parsing its flags.
  #[must_use]
  pub fn from_fetched(file: FetchedFile) -> Self {
    let flags = if file.is_error {
      DocumentFlags {
        title: file_stem(&file.path),
        ..DocumentFlags::default()
      }
    } else {
      parse_flags(&file.path, &file.data)
    };
    Self {
      path: file.path,
      raw_text: file.data,
      flags,
      is_error: file.is_error,
    }
  }

  /// The document text without its flag lines.
  #[must_use]
  pub fn body(&self) -> String {
    strip_flags(&self.raw_text)
  }

  /// Most recent `@updated` entry, if it parses as a date.
  #[must_use]
  pub fn last_updated(&self) -> Option<jiff::civil::Date> {
    self
      .flags
      .updated
      .iter()
      .filter_map(|date| date.parse::<jiff::civil::Date>().ok())
      .max()
  }

  /// Format the most recent update date with a strftime pattern.
  #[must_use]
  pub fn updated_display(&self, date_format: &str) -> Option<String> {
    self
      .last_updated()
      .map(|date| date.strftime(date_format).to_string())
  }
}

/// Remove the flag lines of a document, leaving its Markdown.
#[must_use]
pub fn strip_flags(text: &str) -> String {
  FLAG_RE.replace_all(text, "").trim().to_string()
}

/// Parse the flag lines of a document.
///
/// The title falls back to the first level-one heading, then to the file
/// stem.
#[must_use]
pub fn parse_flags(path: &str, text: &str) -> DocumentFlags {
  let mut flags = DocumentFlags::default();
  for caps in FLAG_RE.captures_iter(text) {
    let value = &caps[2];
    match &caps[1] {
      "title" => flags.title = value.to_string(),
      "tags" => flags.tags = utils::trim_list(value.split(',')),
      "updated" => flags.updated = utils::trim_list(value.split(',')),
      "author" if !value.is_empty() => flags.author = Some(value.to_string()),
      _ => {},
    }
  }
  if flags.title.is_empty() {
    flags.title = text
      .lines()
      .find_map(|line| line.strip_prefix("# "))
      .map(|title| title.trim().to_string())
      .filter(|title| !title.is_empty())
      .unwrap_or_else(|| file_stem(path));
  }
  flags
}

fn file_stem(path: &str) -> String {
  let name = path.rsplit('/').next().unwrap_or(path);
  name.strip_suffix(".md").unwrap_or(name).to_string()
}

/// Listing order: most recently updated first, undated last, then by path.
#[must_use]
pub fn compare_documents(a: &Document, b: &Document) -> Ordering {
  match (a.last_updated(), b.last_updated()) {
    (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.path.cmp(&b.path)),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => a.path.cmp(&b.path),
  }
}

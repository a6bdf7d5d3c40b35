//! Full-text search over documents with highlighted excerpts.
use std::sync::LazyLock;

use log::debug;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::{
  document::{Document, compare_documents},
  utils::{escape_html, never_matching_regex},
};

/// Characters of context kept on each side of a match.
pub const CONTEXT_RADIUS: usize = 10;

const HIGHLIGHT_OPEN: &str = "<span class=\"highlight\">";
const HIGHLIGHT_CLOSE: &str = "</span>";
const ELLIPSIS: &str = "<span class=\"ellipsis\">...</span>";

/// A run of merged context windows, in char indices of the text.
#[derive(Debug)]
struct Fragment {
  from:    usize,
  to:      usize,
  matches: Vec<(usize, usize)>,
}

/// Build an excerpt of `text` around every case-insensitive occurrence of
/// `query`.
///
/// Returns `None` when the query is empty or does not occur.
#[must_use]
pub fn highlight(text: &str, query: &str) -> Option<String> {
  if query.is_empty() {
    return None;
  }
  let pattern = RegexBuilder::new(&regex::escape(query))
    .case_insensitive(true)
    .build()
    .ok()?;

  let chars: Vec<char> = text.chars().collect();
  let len = chars.len();

  // Byte offsets come back in ascending order, so the char index can be
  // counted forward.
  let mut fragments: Vec<Fragment> = Vec::new();
  let mut counted_bytes = 0;
  let mut counted_chars = 0;
  for found in pattern.find_iter(text) {
    counted_chars += text[counted_bytes..found.start()].chars().count();
    let start = counted_chars;
    let end = start + found.as_str().chars().count();
    counted_chars = end;
    counted_bytes = found.end();

    let window_start = start.saturating_sub(CONTEXT_RADIUS);
    let window_end = (end + CONTEXT_RADIUS).min(len);
    match fragments.last_mut() {
      Some(last) if window_start <= last.to => {
        last.to = last.to.max(window_end);
        last.matches.push((start, end));
      },
      _ => {
        fragments.push(Fragment {
          from:    window_start,
          to:      window_end,
          matches: vec![(start, end)],
        });
      },
    }
  }

  let first = fragments.first()?;
  let last = fragments.last()?;
  let mut parts = Vec::with_capacity(fragments.len() + 2);
  if first.from > 0 {
    parts.push(String::new());
  }
  parts.extend(fragments.iter().map(|fragment| render_fragment(&chars, fragment)));
  if last.to < len {
    parts.push(String::new());
  }
  Some(parts.join(ELLIPSIS))
}

fn render_fragment(chars: &[char], fragment: &Fragment) -> String {
  let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();
  let mut html = String::new();
  let mut cursor = fragment.from;
  for (i, &(start, end)) in fragment.matches.iter().enumerate() {
    let context = slice(cursor, start);
    let context = if i == 0 { context.trim_start() } else { &context };
    html.push_str(&escape_html(context));
    html.push_str(HIGHLIGHT_OPEN);
    html.push_str(&escape_html(&slice(start, end)));
    html.push_str(HIGHLIGHT_CLOSE);
    cursor = end;
  }
  html.push_str(&escape_html(slice(cursor, fragment.to).trim_end()));
  html
}

/// A parsed search input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
  /// Match titles, then document text.
  Text(String),
  /// `@flag: param`, matched against document flags.
  Flag { flag: String, param: String },
}

static FLAG_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^@(\S+?):\s*(.*)$").unwrap_or_else(|e| {
    log::error!("Failed to compile FLAG_QUERY_RE regex: {e}");
    never_matching_regex()
  })
});

impl SearchQuery {
  /// Parse search input. The input is lower-cased; `None` for blank input.
  #[must_use]
  pub fn parse(input: &str) -> Option<Self> {
    let content = input.trim().to_lowercase();
    if content.is_empty() {
      return None;
    }
    Some(match FLAG_QUERY_RE.captures(&content) {
      Some(caps) => {
        Self::Flag {
          flag:  caps[1].to_string(),
          param: caps[2].to_string(),
        }
      },
      None => Self::Text(content),
    })
  }

  /// Whether `document` matches, and the excerpt to show with it.
  fn matches(&self, document: &Document) -> Option<Option<String>> {
    match self {
      Self::Text(text) => {
        if document.flags.title.to_lowercase().contains(text.as_str()) {
          Some(None)
        } else {
          let body = document.body();
          body
            .to_lowercase()
            .contains(text.as_str())
            .then(|| highlight(&body, text))
        }
      },
      Self::Flag { flag, param } if flag == "tags" && !param.is_empty() => {
        let wanted = param
          .split('/')
          .map(str::trim)
          .filter(|segment| !segment.is_empty())
          .collect::<Vec<_>>()
          .join("/");
        let prefix = format!("{wanted}/");
        document
          .flags
          .tags
          .iter()
          .map(|tag| tag.to_lowercase())
          .any(|tag| tag == wanted || tag.starts_with(&prefix))
          .then_some(None)
      },
      Self::Flag { .. } => None,
    }
  }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
  pub path:    String,
  pub title:   String,
  pub tags:    Vec<String>,
  pub updated: Option<String>,
  /// Highlighted excerpt, present when the match was in the text.
  pub excerpt: Option<String>,
}

/// Run `query` over `documents`. Error documents are skipped; hits come in
/// listing order.
#[must_use]
pub fn search(documents: &[Document], query: &SearchQuery) -> Vec<SearchHit> {
  let mut found: Vec<(&Document, Option<String>)> = documents
    .iter()
    .filter(|document| !document.is_error)
    .filter_map(|document| {
      query.matches(document).map(|excerpt| (document, excerpt))
    })
    .collect();
  found.sort_by(|(a, _), (b, _)| compare_documents(a, b));
  debug!("Search matched {} of {} documents", found.len(), documents.len());

  found
    .into_iter()
    .map(|(document, excerpt)| {
      SearchHit {
        path: document.path.clone(),
        title: document.flags.title.clone(),
        tags: document.flags.tags.clone(),
        updated: document.flags.updated.first().cloned(),
        excerpt,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::FetchedFile;

  #[test]
  fn match_at_start_has_no_leading_ellipsis() {
    let out = highlight("the cat sat", "the").unwrap();
    assert_eq!(out, "<span class=\"highlight\">the</span> cat sat");
  }

  #[test]
  fn overlapping_windows_merge_without_duplication() {
    let out = highlight("the cat sat on the cat mat", "cat").unwrap();
    assert_eq!(
      out,
      "the <span class=\"highlight\">cat</span> sat on the \
       <span class=\"highlight\">cat</span> mat"
    );
  }

  #[test]
  fn short_text_keeps_every_character_once() {
    let out = highlight("the cat sat", "cat").unwrap();
    assert_eq!(out, "the <span class=\"highlight\">cat</span> sat");
  }

  #[test]
  fn abutting_windows_merge() {
    let text = format!("cat{}cat", "x".repeat(2 * CONTEXT_RADIUS));
    let out = highlight(&text, "cat").unwrap();
    assert_eq!(
      out,
      format!(
        "<span class=\"highlight\">cat</span>{}<span \
         class=\"highlight\">cat</span>",
        "x".repeat(2 * CONTEXT_RADIUS)
      )
    );
  }

  #[test]
  fn separate_windows_get_one_ellipsis_between() {
    let out = highlight("cat one two three four five cat", "cat").unwrap();
    assert_eq!(
      out,
      "<span class=\"highlight\">cat</span> one two \
       t<span class=\"ellipsis\">...</span>four five <span \
       class=\"highlight\">cat</span>"
    );
  }

  #[test]
  fn distant_matches_are_split_by_ellipsis() {
    let text = format!("{}needle{}needle{}", "a".repeat(30), "b".repeat(30), "c".repeat(30));
    let out = highlight(&text, "NEEDLE").unwrap();
    let parts: Vec<&str> = out.split(ELLIPSIS).collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0], "");
    assert_eq!(parts[1], "aaaaaaaaaa<span class=\"highlight\">needle</span>bbbbbbbbbb");
    assert_eq!(parts[3], "");
  }

  #[test]
  fn context_is_escaped_and_chars_counted() {
    let out = highlight("é <b> ünïcode", "<b>").unwrap();
    assert_eq!(out, "é <span class=\"highlight\">&lt;b&gt;</span> ünïcode");
    assert_eq!(highlight("abc", "x"), None);
    assert_eq!(highlight("abc", ""), None);
  }

  #[test]
  fn parse_queries() {
    assert_eq!(
      SearchQuery::parse("  Rust "),
      Some(SearchQuery::Text("rust".to_string()))
    );
    assert_eq!(
      SearchQuery::parse("@Tags: Lang / Rust"),
      Some(SearchQuery::Flag {
        flag:  "tags".to_string(),
        param: "lang / rust".to_string(),
      })
    );
    assert_eq!(SearchQuery::parse("   "), None);
  }

  fn document(path: &str, text: &str) -> Document {
    Document::from_fetched(FetchedFile::ok(path, text))
  }

  #[test]
  fn title_hits_have_no_excerpt() {
    let documents = vec![
      document("/a.md", "@title: Rust notes\nnothing here"),
      document("/b.md", "@title: Other\nsome rust inside"),
      Document::from_fetched(FetchedFile::error("/c.md", "rust 404")),
    ];
    let hits = search(&documents, &SearchQuery::Text("rust".to_string()));
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/a.md");
    assert_eq!(hits[0].excerpt, None);
    assert!(hits[1].excerpt.as_deref().unwrap().contains("highlight"));
  }

  #[test]
  fn tag_queries_match_descendants() {
    let documents = vec![
      document("/a.md", "@tags: lang/rust\n@updated: 2020-01-01"),
      document("/b.md", "@tags: lang\n@updated: 2021-01-01"),
      document("/c.md", "@tags: language"),
    ];
    let query = SearchQuery::parse("@tags: lang").unwrap();
    let paths: Vec<String> =
      search(&documents, &query).into_iter().map(|hit| hit.path).collect();
    assert_eq!(paths, vec!["/b.md", "/a.md"]);
  }
}

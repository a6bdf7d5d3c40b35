use std::sync::LazyLock;

use regex::Regex;

/// Split `text` once at `sep`.
///
/// Returns the whole input as key and `None` as value if the separator does
/// not occur. With `trim`, the key loses trailing and the value leading
/// whitespace. With `last`, the split happens at the last occurrence.
#[must_use]
pub fn chop_str<'a>(
  text: &'a str,
  sep: &str,
  trim: bool,
  last: bool,
) -> (&'a str, Option<&'a str>) {
  let index = if last { text.rfind(sep) } else { text.find(sep) };
  let Some(index) = index else {
    return (text, None);
  };
  let key = &text[..index];
  let value = &text[index + sep.len()..];
  if trim {
    (key.trim_end(), Some(value.trim_start()))
  } else {
    (key, Some(value))
  }
}

/// Trim every item, drop empty ones and keep the first occurrence of each.
#[must_use]
pub fn trim_list<'a, I>(items: I) -> Vec<String>
where
  I: IntoIterator<Item = &'a str>,
{
  let mut list: Vec<String> = Vec::new();
  for item in items {
    let item = item.trim();
    if !item.is_empty() && !list.iter().any(|seen| seen == item) {
      list.push(item.to_string());
    }
  }
  list
}

/// Escape `&`, `<` and `>` for embedding text into HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
  html_escape::encode_text(text).into_owned()
}

/// Escape a value for a double-quoted HTML attribute.
#[must_use]
pub fn escape_attr(text: &str) -> String {
  html_escape::encode_double_quoted_attribute(text).into_owned()
}

static EXTERNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/?#\s]+")
    .unwrap_or_else(|_| never_matching_regex())
});

/// Return true if `href` is an absolute URL that names a host.
#[must_use]
pub fn is_external_link(href: &str) -> bool {
  EXTERNAL_RE.is_match(href)
}

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:")
    .unwrap_or_else(|_| never_matching_regex())
});

/// Return true if `href` starts with a URL scheme (`https:`, `mailto:`, ...).
#[must_use]
pub fn has_scheme(href: &str) -> bool {
  SCHEME_RE.is_match(href)
}

/// Prefix a site-relative path with the deployment base path.
///
/// Fragments and anything carrying a URL scheme are returned unchanged.
#[must_use]
pub fn add_base_path(path: &str, base_path: &str) -> String {
  if path.starts_with('#') || has_scheme(path) {
    return path.to_string();
  }
  let base = base_path.trim_end_matches('/');
  let path = path.strip_prefix('/').unwrap_or(path);
  format!("{base}/{path}")
}

/// Shorten a document path for hash routes: `/dir/index.md` becomes `/dir/`.
#[must_use]
pub fn shorten_path(path: &str) -> String {
  path
    .strip_suffix("index.md")
    .filter(|prefix| prefix.ends_with('/'))
    .map_or_else(|| path.to_string(), ToString::to_string)
}

/// Normalize a document path into an absolute, `/`-rooted form.
///
/// `.` segments are dropped and `..` segments pop their parent. Returns
/// `None` when the path escapes the root.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
  let mut segments: Vec<&str> = Vec::new();
  for segment in path.split('/') {
    match segment {
      "" | "." => {},
      ".." => {
        segments.pop()?;
      },
      other => segments.push(other),
    }
  }
  let mut normalized = format!("/{}", segments.join("/"));
  if path.ends_with('/') && normalized.len() > 1 {
    normalized.push('/');
  }
  Some(normalized)
}

/// Parse a leading integer the way lenient number parsing does: optional
/// whitespace, an optional sign, then digits. Trailing garbage is ignored
/// and digit runs too long for an `i64` saturate.
#[must_use]
pub fn parse_leading_int(text: &str) -> Option<i64> {
  let text = text.trim_start();
  let (negative, digits) = match text.as_bytes().first() {
    Some(b'-') => (true, &text[1..]),
    Some(b'+') => (false, &text[1..]),
    _ => (false, text),
  };
  let end = digits
    .find(|c: char| !c.is_ascii_digit())
    .unwrap_or(digits.len());
  if end == 0 {
    return None;
  }
  let value = digits[..end]
    .bytes()
    .fold(0i64, |acc, digit| {
      acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    });
  Some(if negative { -value } else { value })
}

/// Create a regex that never matches anything.
///
/// This is used as a fallback pattern when a regex fails to compile.
///
/// # Panics
///
/// Panics if the fallback regex pattern `r"^\b$"` fails to compile, which
/// should never happen.
#[must_use]
pub fn never_matching_regex() -> Regex {
  Regex::new(r"[^\s\S]").unwrap_or_else(|_| {
    #[allow(clippy::unwrap_used, reason = "pattern is statically valid")]
    Regex::new(r"^\b$").unwrap()
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chop_str_first_and_last() {
    assert_eq!(chop_str("a = b", "=", true, false), ("a", Some("b")));
    assert_eq!(chop_str("a#b#c", "#", false, true), ("a#b", Some("c")));
    assert_eq!(chop_str("plain", "#", false, false), ("plain", None));
  }

  #[test]
  fn trim_list_drops_empty_and_duplicates() {
    let list = trim_list(" a . b..a ".split('.'));
    assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn external_links_need_a_host() {
    assert!(is_external_link("https://example.com/x"));
    assert!(is_external_link("ftp://files.example.com"));
    assert!(!is_external_link("/docs/a.md"));
    assert!(!is_external_link("mailto:someone@example.com"));
    assert!(!is_external_link("#anchor"));
  }

  #[test]
  fn link_patterns_compile() {
    let fallback = never_matching_regex();
    assert_ne!(EXTERNAL_RE.as_str(), fallback.as_str());
    assert_ne!(SCHEME_RE.as_str(), fallback.as_str());
    assert!(has_scheme("mailto:someone@example.com"));
    assert!(!has_scheme("/docs/a.md"));
  }

  #[test]
  fn base_path_prefixing() {
    assert_eq!(add_base_path("/img/a.png", "/blog/"), "/blog/img/a.png");
    assert_eq!(add_base_path("img/a.png", "/"), "/img/a.png");
    assert_eq!(add_base_path("#/a.md", "/blog"), "#/a.md");
    assert_eq!(
      add_base_path("https://example.com/a.png", "/blog"),
      "https://example.com/a.png"
    );
    assert_eq!(add_base_path("mailto:a@b.c", "/blog"), "mailto:a@b.c");
  }

  #[test]
  fn normalize_paths() {
    assert_eq!(normalize_path("a/./b.md").as_deref(), Some("/a/b.md"));
    assert_eq!(normalize_path("/a/../b.md").as_deref(), Some("/b.md"));
    assert_eq!(normalize_path("/dir/").as_deref(), Some("/dir/"));
    assert_eq!(normalize_path("../x.md"), None);
  }

  #[test]
  fn leading_int_parsing() {
    assert_eq!(parse_leading_int("2"), Some(2));
    assert_eq!(parse_leading_int(" -1"), Some(-1));
    assert_eq!(parse_leading_int("99px"), Some(99));
    assert_eq!(parse_leading_int("99999999999999999999"), Some(i64::MAX));
    assert_eq!(parse_leading_int("-99999999999999999999"), Some(-i64::MAX));
    assert_eq!(parse_leading_int("random"), None);
    assert_eq!(parse_leading_int(""), None);
  }

  #[test]
  fn shorten_index_paths() {
    assert_eq!(shorten_path("/dir/index.md"), "/dir/");
    assert_eq!(shorten_path("/dir/page.md"), "/dir/page.md");
  }
}

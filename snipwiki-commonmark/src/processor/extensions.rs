//! Wiki-specific Markdown extensions that work on raw text: page marks,
//! collapsible `:::` blocks, unicode escapes, fence info payloads and the
//! `#`-directives carried in link and image titles.
use std::sync::LazyLock;

use regex::Regex;

use crate::utils::{self, chop_str, never_matching_regex};

/// Delimiter line separating clip slices of a snippet.
pub const SNIP_MARK: &str = "--8<--";

/// Placeholder line for a table of contents.
pub const TOC_MARK: &str = "[toc]";

/// Remove snip delimiter lines and turn the first `[toc]` line into the
/// table of contents container. Further `[toc]` lines are dropped.
#[must_use]
pub fn apply_page_marks(text: &str) -> String {
  let mut toc_placed = false;
  let mut out = String::with_capacity(text.len());
  for line in text.split_inclusive('\n') {
    let content = line.trim();
    if content == SNIP_MARK {
      continue;
    }
    if content.eq_ignore_ascii_case(TOC_MARK) {
      if !toc_placed {
        toc_placed = true;
        out.push_str("<div id=\"toc\"></div>\n");
      }
      continue;
    }
    out.push_str(line);
  }
  out
}

static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\\u[0-9a-f]{4}|u\+[0-9a-f]{4,6}").unwrap_or_else(|e| {
    log::error!("Failed to compile ESCAPE_RE regex: {e}");
    never_matching_regex()
  })
});

/// Decode `\uXXXX` and `u+XXXX[XX]` escapes. Escapes that do not name a
/// valid character are left as written.
#[must_use]
pub fn decode_unicode_escapes(text: &str) -> String {
  if !text.contains(['u', 'U']) {
    return text.to_string();
  }
  ESCAPE_RE
    .replace_all(text, |caps: &regex::Captures| {
      let matched = &caps[0];
      u32::from_str_radix(&matched[2..], 16)
        .ok()
        .and_then(char::from_u32)
        .map_or_else(|| matched.to_string(), String::from)
    })
    .into_owned()
}

/// Split a fence info string into the display language and the highlighted
/// line specification (`rust|1-3,5`).
#[must_use]
pub fn split_fence_info(info: &str) -> (String, Option<String>) {
  let info = info.trim();
  match chop_str(info, "|", true, false) {
    (lang, Some(lines)) => {
      (lang.to_string(), Some(lines).filter(|l| !l.is_empty()).map(str::to_string))
    },
    (lang, None) => (lang.to_string(), None),
  }
}

/// Parsed opening marker of a collapsible block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsMarker {
  /// Render the block expanded.
  pub open:    bool,
  /// CSS classes of the `<details>` element.
  pub classes: Vec<String>,
  /// Summary markdown, `None` when suppressed with `\`.
  pub summary: Option<String>,
}

static DETAILS_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\s+(open\s+)?(?:\.(.*?)\s+)?(.*)$").unwrap_or_else(|e| {
    log::error!("Failed to compile DETAILS_RE regex: {e}");
    never_matching_regex()
  })
});

/// Parse the text following `:::`.
///
/// Grammar: `^\s+(open\s+)?(?:\.(classes)\s+)?(summary)$`. A body that does
/// not match falls back to an expanded block with the `empty` class, as does
/// a class list containing `empty`.
#[must_use]
pub fn parse_details_marker(params: &str) -> DetailsMarker {
  let Some(caps) = DETAILS_RE.captures(params) else {
    return DetailsMarker {
      open:    true,
      classes: vec!["empty".to_string()],
      summary: None,
    };
  };

  let classes = caps
    .get(2)
    .map(|m| utils::trim_list(m.as_str().split('.')))
    .unwrap_or_default();
  if classes.iter().any(|c| c == "empty") {
    return DetailsMarker {
      open: true,
      classes,
      summary: None,
    };
  }
  let summary = caps.get(3).map_or("", |m| m.as_str());
  DetailsMarker {
    open: caps.get(1).is_some(),
    classes,
    summary: (summary != "\\").then(|| summary.to_string()),
  }
}

/// A run of source text, or a collapsible block with its own content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Text(String),
  Details { marker: String, body: Vec<Segment> },
}

struct Frame {
  colons:   usize,
  marker:   String,
  segments: Vec<Segment>,
  text:     String,
}

impl Frame {
  const fn new(colons: usize, marker: String) -> Self {
    Self {
      colons,
      marker,
      segments: Vec::new(),
      text: String::new(),
    }
  }

  fn flush(&mut self) {
    if !self.text.is_empty() {
      self.segments.push(Segment::Text(std::mem::take(&mut self.text)));
    }
  }

  fn into_segment(mut self) -> Segment {
    self.flush();
    Segment::Details {
      marker: self.marker,
      body:   self.segments,
    }
  }
}

/// Leading fence of a code block line: the fence character and run length.
pub(crate) fn fence_open(line: &str) -> Option<(char, usize)> {
  let indent = line.len() - line.trim_start_matches(' ').len();
  if indent > 3 {
    return None;
  }
  let rest = &line[indent..];
  let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
  let len = rest.chars().take_while(|c| *c == ch).count();
  (len >= 3).then_some((ch, len))
}

pub(crate) fn fence_closes(line: &str, fence: (char, usize)) -> bool {
  fence_open(line).is_some_and(|(ch, len)| {
    ch == fence.0
      && len >= fence.1
      && line.trim_start_matches(' ')[len..].trim().is_empty()
  })
}

fn container_marker(line: &str) -> Option<(usize, &str)> {
  let indent = line.len() - line.trim_start_matches(' ').len();
  if indent > 3 {
    return None;
  }
  let rest = &line[indent..];
  let colons = rest.len() - rest.trim_start_matches(':').len();
  (colons >= 3).then(|| (colons, &rest[colons..]))
}

/// Split text into plain runs and `:::` blocks.
///
/// A marker line with nothing after the colons closes the innermost open
/// block whose marker is not longer; any other marker line opens a block.
/// Markers inside fenced code are ignored and unclosed blocks end with the
/// text.
#[must_use]
pub fn parse_details(text: &str) -> Vec<Segment> {
  let mut stack = vec![Frame::new(0, String::new())];
  let mut fence: Option<(char, usize)> = None;

  for line in text.split_inclusive('\n') {
    let content = line.trim_end_matches(['\n', '\r']);
    let depth = stack.len();
    let Some(top) = stack.last_mut() else {
      break;
    };

    if let Some(open) = fence {
      if fence_closes(content, open) {
        fence = None;
      }
      top.text.push_str(line);
      continue;
    }
    if let Some(open) = fence_open(content) {
      fence = Some(open);
      top.text.push_str(line);
      continue;
    }

    if let Some((colons, rest)) = container_marker(content) {
      if rest.trim().is_empty() && depth > 1 && colons >= top.colons {
        if let Some(frame) = stack.pop() {
          if let Some(parent) = stack.last_mut() {
            parent.flush();
            parent.segments.push(frame.into_segment());
          }
        }
      } else {
        top.flush();
        stack.push(Frame::new(colons, rest.to_string()));
      }
      continue;
    }

    top.text.push_str(line);
  }

  while stack.len() > 1 {
    if let Some(frame) = stack.pop() {
      if let Some(parent) = stack.last_mut() {
        parent.flush();
        parent.segments.push(frame.into_segment());
      }
    }
  }

  stack
    .pop()
    .map(|mut root| {
      root.flush();
      root.segments
    })
    .unwrap_or_default()
}

/// What the `#` part of an image title asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDirective {
  Width(u32),
  Classes(Vec<String>),
  Style(String),
}

/// Split an image title into the remaining tooltip and its directive.
#[must_use]
pub fn parse_image_title(title: &str) -> Option<(String, ImageDirective)> {
  let (tooltip, value) = chop_str(title, "#", false, true);
  let value = value?;
  let directive = if let Ok(width) = value.trim().parse::<u32>() {
    ImageDirective::Width(width)
  } else if value.starts_with('.') {
    ImageDirective::Classes(utils::trim_list(value.split('.')))
  } else {
    ImageDirective::Style(value.to_string())
  };
  Some((tooltip.to_string(), directive))
}

/// Hash route for an internal document link whose title carries a `#`
/// directive. Returns the rewritten href and the remaining tooltip.
///
/// The directive body is `anchor[?query]`; either part may be empty.
#[must_use]
pub fn link_hash_route(href: &str, title: &str) -> Option<(String, String)> {
  if !(href.starts_with('/') && (href.ends_with(".md") || href.ends_with('/')))
  {
    return None;
  }
  let (tooltip, value) = chop_str(title, "#", false, true);
  let value = value?;
  let (anchor, query) = chop_str(value, "?", false, false);
  let mut route = format!("#{}", utils::shorten_path(href));
  if !anchor.is_empty() {
    route.push('#');
    route.push_str(anchor);
  }
  if let Some(query) = query.filter(|q| !q.is_empty()) {
    route.push('?');
    route.push_str(query);
  }
  Some((route, tooltip.to_string()))
}

/// Inline SVG used for the heading anchor link.
pub const LINK_ICON: &str = "<svg class=\"icon icon-link\" width=\"14\" \
                             height=\"14\" viewBox=\"0 0 24 24\" \
                             aria-hidden=\"true\"><path d=\"M10 13a5 5 0 0 0 \
                             7.07 0l3-3a5 5 0 0 0-7.07-7.07l-1.5 1.5M14 \
                             11a5 5 0 0 0-7.07 0l-3 3a5 5 0 0 0 7.07 \
                             7.07l1.5-1.5\"/></svg>";

/// Inline SVG appended to external links.
pub const EXTERNAL_ICON: &str = "<svg class=\"icon icon-external\" \
                                 width=\"14\" height=\"14\" viewBox=\"0 0 24 \
                                 24\" aria-hidden=\"true\"><path d=\"M14 \
                                 3h7v7M10 14 21 3M19 14v5a2 2 0 0 1-2 2H5a2 \
                                 2 0 0 1-2-2V7a2 2 0 0 1 2-2h5\"/></svg>";

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_marks_place_one_toc() {
    let out = apply_page_marks("a\n[toc]\n--8<--\nb\n[TOC]\n");
    assert_eq!(out, "a\n<div id=\"toc\"></div>\nb\n");
  }

  #[test]
  fn unicode_escapes_are_decoded() {
    assert_eq!(decode_unicode_escapes(r"A U+1F600"), "A 😀");
    assert_eq!(decode_unicode_escapes(r"\uD800"), r"\uD800");
    assert_eq!(decode_unicode_escapes("plain"), "plain");
  }

  #[test]
  fn fence_info_payload() {
    assert_eq!(
      split_fence_info("rust|1-3"),
      ("rust".to_string(), Some("1-3".to_string()))
    );
    assert_eq!(split_fence_info("js"), ("js".to_string(), None));
    assert_eq!(split_fence_info(""), (String::new(), None));
  }

  #[test]
  fn details_marker_grammar() {
    assert_eq!(
      parse_details_marker(" open .note.wide Click *me*"),
      DetailsMarker {
        open:    true,
        classes: vec!["note".to_string(), "wide".to_string()],
        summary: Some("Click *me*".to_string()),
      }
    );
    let closed = parse_details_marker(" Summary");
    assert!(!closed.open);
    assert_eq!(closed.summary.as_deref(), Some("Summary"));

    let empty = parse_details_marker("");
    assert!(empty.open);
    assert_eq!(empty.classes, vec!["empty"]);

    let no_summary = parse_details_marker(" .tip \\");
    assert_eq!(no_summary.summary, None);

    let danger = parse_details_marker(" .danger.empty .");
    assert!(danger.open);
    assert_eq!(danger.summary, None);
  }

  #[test]
  fn details_nest_by_marker_length() {
    let segments =
      parse_details(":::: outer\n::: inner\nx\n:::\ny\n::::\nafter\n");
    assert_eq!(segments, vec![
      Segment::Details {
        marker: " outer".to_string(),
        body:   vec![
          Segment::Details {
            marker: " inner".to_string(),
            body:   vec![Segment::Text("x\n".to_string())],
          },
          Segment::Text("y\n".to_string()),
        ],
      },
      Segment::Text("after\n".to_string()),
    ]);
  }

  #[test]
  fn details_markers_in_code_are_text() {
    let segments = parse_details("```\n::: no\n```\n");
    assert_eq!(segments, vec![Segment::Text("```\n::: no\n```\n".to_string())]);
  }

  #[test]
  fn image_title_directives() {
    assert_eq!(
      parse_image_title("Cat#120"),
      Some(("Cat".to_string(), ImageDirective::Width(120)))
    );
    assert_eq!(
      parse_image_title("#.round.shadow"),
      Some((
        String::new(),
        ImageDirective::Classes(vec!["round".to_string(), "shadow".to_string()])
      ))
    );
    assert_eq!(
      parse_image_title("#max-width: 50%"),
      Some((String::new(), ImageDirective::Style("max-width: 50%".to_string())))
    );
    assert_eq!(parse_image_title("no directive"), None);
  }

  #[test]
  fn link_routes() {
    assert_eq!(
      link_hash_route("/dir/index.md", "#sec?q=1"),
      Some(("#/dir/#sec?q=1".to_string(), String::new()))
    );
    assert_eq!(
      link_hash_route("/a.md", "Tip#"),
      Some(("#/a.md".to_string(), "Tip".to_string()))
    );
    assert_eq!(link_hash_route("/a.png", "#"), None);
    assert_eq!(link_hash_route("/a.md", "plain"), None);
  }
}

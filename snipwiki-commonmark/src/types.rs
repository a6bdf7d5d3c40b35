//! Types for snipwiki-commonmark public API and internal use.
use serde::{Deserialize, Serialize};

/// A decorated heading of a rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heading {
  /// Heading level (1-6).
  pub level:    u8,
  /// Generated element id, `h{level}-{n}`.
  pub id:       String,
  /// Visible heading text.
  pub text:     String,
  /// Whether the heading starts folded.
  pub foldable: bool,
}

/// Result of Markdown rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderResult {
  /// Rendered HTML output.
  pub html: String,

  /// Decorated headings in document order.
  pub headings: Vec<Heading>,
}

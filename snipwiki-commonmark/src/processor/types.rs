//! Type definitions for the Markdown processor.
//!
//! Contains the configuration options (`MarkdownOptions`), the replacer rules
//! applied to inline text, the processor itself and the per-render state
//! (`RenderContext`).
//!
//! # Examples
//!
//! ```
//! use snipwiki_commonmark::{MarkdownOptions, MarkdownProcessor};
//!
//! let options = MarkdownOptions {
//!   base_path: "/wiki/".to_string(),
//!   ..Default::default()
//! };
//!
//! let processor = MarkdownProcessor::new(options);
//! ```

use std::collections::HashMap;

use regex::Regex;

/// Default smart quote characters: double open/close, single open/close.
pub const DEFAULT_SMART_QUOTES: &str = "“”‘’";

/// Error raised when a replacer rule cannot be compiled.
#[derive(Debug, thiserror::Error)]
pub enum ReplacerError {
  #[error("Invalid replacer pattern `{pattern}`: {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source:  regex::Error,
  },
}

/// A text replacement applied to every inline text run.
#[derive(Debug, Clone)]
pub struct ReplacerRule {
  pattern:     Regex,
  replacement: String,
}

impl ReplacerRule {
  /// Compile a single rule.
  ///
  /// # Errors
  ///
  /// Returns [`ReplacerError::InvalidPattern`] if `pattern` is not a valid
  /// regular expression.
  pub fn compile(
    pattern: &str,
    replacement: &str,
  ) -> Result<Self, ReplacerError> {
    let regex =
      Regex::new(pattern).map_err(|source| ReplacerError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
      })?;
    Ok(Self {
      pattern:     regex,
      replacement: replacement.to_string(),
    })
  }

  /// Compile an ordered list of `(pattern, replacement)` pairs.
  ///
  /// Invalid patterns are logged and skipped; the order of the remaining
  /// rules is preserved.
  #[must_use]
  pub fn compile_all(rules: &[(String, String)]) -> Vec<Self> {
    rules
      .iter()
      .filter_map(|(pattern, replacement)| {
        Self::compile(pattern, replacement)
          .map_err(|e| log::error!("Skipping replacer rule: {e}"))
          .ok()
      })
      .collect()
  }

  /// The source pattern of this rule.
  #[must_use]
  pub fn pattern(&self) -> &str {
    self.pattern.as_str()
  }

  /// Apply the rule to every match in `text`.
  #[must_use]
  pub fn apply(&self, text: &str) -> String {
    self
      .pattern
      .replace_all(text, self.replacement.as_str())
      .into_owned()
  }
}

/// Options for configuring the Markdown processor.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
  /// Smart quote characters. Fewer than four characters disables smart
  /// punctuation.
  pub smart_quotes: String,

  /// Ordered replacer rules applied to inline text.
  pub replacers: Vec<ReplacerRule>,

  /// Deployment base path prefixed to site-relative links and images.
  pub base_path: String,

  /// Path of the home document. Links to it stay in the current tab.
  pub home_path: String,

  /// Label rendered above the footnotes list.
  pub footnotes_label: String,

  /// Render soft line breaks as `<br>`.
  pub hard_breaks: bool,

  /// Turn bare URLs into links.
  pub autolink: bool,
}

impl Default for MarkdownOptions {
  fn default() -> Self {
    Self {
      smart_quotes:    DEFAULT_SMART_QUOTES.to_string(),
      replacers:       Vec::new(),
      base_path:       "/".to_string(),
      home_path:       "/index.md".to_string(),
      footnotes_label: "Footnotes".to_string(),
      hard_breaks:     true,
      autolink:        true,
    }
  }
}

impl MarkdownOptions {
  /// The configured smart quotes, if there are enough of them to be used.
  #[must_use]
  pub fn quote_chars(&self) -> Option<[char; 4]> {
    let mut chars = self.smart_quotes.chars();
    Some([chars.next()?, chars.next()?, chars.next()?, chars.next()?])
  }
}

/// Builder for constructing `MarkdownOptions` with method chaining.
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptionsBuilder {
  options: MarkdownOptions,
}

impl MarkdownOptionsBuilder {
  /// Create a new builder with default options.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the smart quote characters.
  #[must_use]
  pub fn smart_quotes<S: Into<String>>(mut self, quotes: S) -> Self {
    self.options.smart_quotes = quotes.into();
    self
  }

  /// Compile and set replacer rules, skipping invalid ones.
  #[must_use]
  pub fn replacers(mut self, rules: &[(String, String)]) -> Self {
    self.options.replacers = ReplacerRule::compile_all(rules);
    self
  }

  /// Set the deployment base path.
  #[must_use]
  pub fn base_path<S: Into<String>>(mut self, base_path: S) -> Self {
    self.options.base_path = base_path.into();
    self
  }

  /// Set the home document path.
  #[must_use]
  pub fn home_path<S: Into<String>>(mut self, home_path: S) -> Self {
    self.options.home_path = home_path.into();
    self
  }

  /// Set the footnotes label.
  #[must_use]
  pub fn footnotes_label<S: Into<String>>(mut self, label: S) -> Self {
    self.options.footnotes_label = label.into();
    self
  }

  /// Enable or disable hard line breaks.
  #[must_use]
  pub const fn hard_breaks(mut self, enabled: bool) -> Self {
    self.options.hard_breaks = enabled;
    self
  }

  /// Enable or disable bare URL autolinking.
  #[must_use]
  pub const fn autolink(mut self, enabled: bool) -> Self {
    self.options.autolink = enabled;
    self
  }

  /// Build the final `MarkdownOptions`.
  #[must_use]
  pub fn build(self) -> MarkdownOptions {
    self.options
  }
}

/// Main Markdown processor.
///
/// Holds configuration only. Everything that changes while rendering lives in
/// a [`RenderContext`], so one processor can serve concurrent renders.
#[derive(Debug, Clone)]
pub struct MarkdownProcessor {
  pub(crate) options: MarkdownOptions,
}

/// Mutable state of one top-level render.
#[derive(Debug, Default)]
pub struct RenderContext {
  /// Per-tag heading counters (`h2` -> 3 means three `h2` seen so far).
  pub(crate) heading_counts:    HashMap<u8, usize>,
  /// Set while a details summary is rendered.
  pub(crate) rendering_summary: bool,
  /// Rendered details blocks, referenced by placeholder comments.
  pub(crate) blocks:            Vec<String>,
}

impl RenderContext {
  /// Fresh state for a new top-level render.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Next identifier for a heading of the given level, e.g. `h2-1`.
  pub(crate) fn next_heading_id(&mut self, level: u8) -> String {
    let count = self.heading_counts.entry(level).or_insert(0);
    *count += 1;
    format!("h{level}-{count}")
  }

  /// Whether heading decoration is suppressed.
  #[must_use]
  pub const fn is_rendering_summary(&self) -> bool {
    self.rendering_summary
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_replacers_are_skipped() {
    let rules = vec![
      ("(unclosed".to_string(), "x".to_string()),
      ("cat".to_string(), "dog".to_string()),
    ];
    let compiled = ReplacerRule::compile_all(&rules);
    assert_eq!(compiled.len(), 1);
    assert_eq!(compiled[0].pattern(), "cat");
    assert_eq!(compiled[0].apply("cat and cat"), "dog and dog");
  }

  #[test]
  fn quote_chars_need_four_characters() {
    let mut options = MarkdownOptions::default();
    assert_eq!(options.quote_chars(), Some(['“', '”', '‘', '’']));
    options.smart_quotes = "«»".to_string();
    assert_eq!(options.quote_chars(), None);
  }

  #[test]
  fn heading_ids_count_per_level() {
    let mut ctx = RenderContext::new();
    assert_eq!(ctx.next_heading_id(2), "h2-1");
    assert_eq!(ctx.next_heading_id(3), "h3-1");
    assert_eq!(ctx.next_heading_id(2), "h2-2");
  }
}

//! Snippet transclusion.
//!
//! A line such as `## [+#lang=rust|clip=1](/snippets/hello.md)` is replaced
//! by the content of `/snippets/hello.md`, with `{{placeholders}}` filled from
//! the directive's parameters, an optional slice selected with `clip`, and
//! headings shifted below the directive's own heading level. Transcluded
//! content is resolved recursively; a path already entered on the current
//! chain of ancestors is never entered again.
//!
//! ```
//! use std::collections::HashMap;
//!
//! use snipwiki_commonmark::{
//!   FetchedFile,
//!   transclusion::{FileProvider, Resolver, VisitedSet},
//! };
//!
//! struct Memory(HashMap<&'static str, &'static str>);
//!
//! impl FileProvider for Memory {
//!   async fn fetch(&self, path: &str) -> FetchedFile {
//!     match self.0.get(path) {
//!       Some(data) => FetchedFile::ok(path, *data),
//!       None => FetchedFile::error(path, "404 Not Found"),
//!     }
//!   }
//! }
//!
//! # tokio_test_block(async {
//! let files = HashMap::from([("/greet.md", "Hello, {{name|world}}!")]);
//! let resolver = Resolver::new(Memory(files));
//! let out = resolver
//!   .resolve("[+#name=wiki](/greet.md)", VisitedSet::new())
//!   .await;
//! assert_eq!(out, "Hello, wiki!");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #   tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
pub mod cache;
pub mod parser;
pub mod script;

use std::{
  collections::HashMap,
  fmt,
  future::Future,
  sync::{Arc, LazyLock},
};

use futures::{
  FutureExt,
  future::{BoxFuture, join_all},
};
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use rand::RngExt;
use regex::Regex;

pub use self::{
  cache::CachedProvider,
  parser::{DirectiveMatch, Params, Placeholder},
  script::{ExpressionEngine, ScriptEngine, ScriptError, ScriptScope},
};
use crate::{
  document::{self, FetchedFile},
  processor::extensions::{SNIP_MARK, fence_closes, fence_open},
  utils::{self, never_matching_regex},
};

/// Source of document content.
pub trait FileProvider: Send + Sync {
  /// Fetch the document at `path`. Failures are reported in-band through
  /// [`FetchedFile::is_error`].
  fn fetch(&self, path: &str) -> impl Future<Output = FetchedFile> + Send;
}

impl<P: FileProvider + ?Sized> FileProvider for Arc<P> {
  fn fetch(&self, path: &str) -> impl Future<Output = FetchedFile> + Send {
    (**self).fetch(path)
  }
}

/// Paths entered on the current chain of transclusions, in entry order.
///
/// Passed by value into every recursive resolution, so sibling branches never
/// see each other's additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedSet(IndexSet<String>);

impl VisitedSet {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// A set holding the page being resolved, so it cannot include itself.
  #[must_use]
  pub fn with_path(path: impl Into<String>) -> Self {
    let mut set = Self::new();
    set.insert(path);
    set
  }

  #[must_use]
  pub fn contains(&self, path: &str) -> bool {
    self.0.contains(path)
  }

  /// Add a path; returns false if it was already present.
  pub fn insert(&mut self, path: impl Into<String>) -> bool {
    self.0.insert(path.into())
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for VisitedSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self(iter.into_iter().map(Into::into).collect())
  }
}

/// Picks the slice index for `clip=random`, given the slice count.
pub type ClipPicker = Arc<dyn Fn(usize) -> usize + Send + Sync>;

/// Resolves transclusion directives against a [`FileProvider`].
pub struct Resolver<P> {
  provider:      P,
  script_engine: Arc<dyn ScriptEngine>,
  clip_picker:   ClipPicker,
}

impl<P> fmt::Debug for Resolver<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Resolver").finish_non_exhaustive()
  }
}

impl<P: FileProvider> Resolver<P> {
  /// Resolver with the default expression engine and a random clip picker.
  pub fn new(provider: P) -> Self {
    Self {
      provider,
      script_engine: Arc::new(ExpressionEngine::new()),
      clip_picker: Arc::new(|len| rand::rng().random_range(0..len.max(1))),
    }
  }

  /// Use another engine for `$$...$$` scripts.
  #[must_use]
  pub fn with_script_engine(mut self, engine: impl ScriptEngine + 'static) -> Self {
    self.script_engine = Arc::new(engine);
    self
  }

  /// Use another picker for `clip=random`.
  #[must_use]
  pub fn with_clip_picker<F>(mut self, picker: F) -> Self
  where
    F: Fn(usize) -> usize + Send + Sync + 'static,
  {
    self.clip_picker = Arc::new(picker);
    self
  }

  pub const fn provider(&self) -> &P {
    &self.provider
  }

  /// Expand every directive in `text`.
  ///
  /// `visited` holds the paths that must not be entered, normally just the
  /// page being resolved. Failures never abort resolution: missing files
  /// and failing scripts are rendered as visible callouts.
  pub async fn resolve(&self, text: &str, visited: VisitedSet) -> String {
    self.resolve_boxed(text.to_string(), visited).await
  }

  fn resolve_boxed(&self, text: String, visited: VisitedSet) -> BoxFuture<'_, String> {
    async move {
      let mut visited = visited;

      // Directives by target path, then by line; identical lines share one
      // expansion.
      let mut directives: IndexMap<String, IndexMap<String, DirectiveMatch>> =
        IndexMap::new();
      let mut lines: Vec<&str> = Vec::new();
      for line in text.split('\n') {
        let Some(directive) = parser::parse_directive_line(line) else {
          lines.push(line);
          continue;
        };
        if visited.contains(&directive.target_path) {
          debug!(
            "Dropping directive for {}: already on the transclusion chain",
            directive.target_path
          );
          lines.push("");
          continue;
        }
        directives
          .entry(directive.target_path.clone())
          .or_default()
          .entry(line.to_string())
          .or_insert(directive);
        lines.push(line);
      }
      let text = lines.join("\n");
      if directives.is_empty() {
        return text;
      }

      for path in directives.keys() {
        visited.insert(path.clone());
      }
      let files = join_all(
        directives.keys().map(|path| self.provider.fetch(path)),
      )
      .await;

      let mut expansions = Vec::new();
      for (file, (path, by_line)) in files.into_iter().zip(directives) {
        if file.is_error {
          warn!("Failed to fetch {path}: {}", file.data);
        }
        let data = if file.is_error {
          file.data
        } else {
          document::strip_flags(&file.data)
        };
        let data = if data.is_empty() {
          data
        } else {
          self.replace_inline_scripts(&path, &data)
        };
        for (line, directive) in by_line {
          expansions.push(self.expand(
            line,
            directive,
            data.clone(),
            file.is_error,
            visited.clone(),
          ));
        }
      }
      let replacements: HashMap<String, String> =
        join_all(expansions).await.into_iter().collect();

      text
        .split('\n')
        .map(|line| replacements.get(line).map_or(line, String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
    }
    .boxed()
  }

  /// Expand one directive from its file's content.
  async fn expand(
    &self,
    line: String,
    directive: DirectiveMatch,
    data: String,
    is_error: bool,
    visited: VisitedSet,
  ) -> (String, String) {
    let path = &directive.target_path;
    let mut snippet = data;
    if !snippet.is_empty() {
      snippet = parser::substitute_placeholders(&snippet, &directive.params)
        .trim()
        .to_string();
      if let Some(clip) = directive.params.get("clip") {
        snippet = self.clip(snippet, clip);
      }
    }

    let level = directive.heading_degrade_level;
    let mut with_heading = snippet.clone();
    if level > 1 {
      let heading = format!("# []({path} \"#\")");
      let text = if snippet.is_empty() {
        heading
      } else {
        format!("{heading}\n\n{snippet}")
      };
      with_heading = degrade_headings(&text, level - 1);
    }

    let content = if snippet.is_empty() {
      with_heading
    } else {
      self.resolve_boxed(with_heading, visited).await
    };

    let content = if is_error {
      format!("::: .danger.empty .\n{content}\n:::")
    } else {
      content
    };
    (line, content)
  }

  /// Select one `--8<--` slice. Numbers clamp to the valid range, `random`
  /// asks the picker, anything else selects the first slice.
  fn clip(&self, snippet: String, clip: &str) -> String {
    let slices: Vec<&str> = snippet.split(SNIP_MARK).collect();
    if slices.len() <= 1 {
      return snippet;
    }
    let last = slices.len() - 1;
    let index = match utils::parse_leading_int(clip) {
      Some(n) => {
        usize::try_from(n.max(0)).map_or(last, |index| index.min(last))
      },
      None if clip == "random" => (self.clip_picker)(slices.len()).min(last),
      None => 0,
    };
    slices[index].trim().to_string()
  }

  /// Evaluate `$$...$$` spans; a failing span becomes a danger callout
  /// showing the error and the source.
  fn replace_inline_scripts(&self, path: &str, data: &str) -> String {
    let spans = parser::find_script_spans(data);
    if spans.is_empty() {
      return data.trim().to_string();
    }
    let scope = ScriptScope { path, data };
    let mut out = String::with_capacity(data.len());
    let mut last = 0;
    for span in spans {
      out.push_str(&data[last..span.start]);
      let source = &data[span.start + 2..span.end - 2];
      match self.script_engine.evaluate(source, &scope) {
        Ok(value) => out.push_str(value.trim()),
        Err(error) => {
          warn!("Inline script in {path} failed: {error}");
          out.push_str(&script_error_callout(&error, source));
        },
      }
      last = span.end;
    }
    out.push_str(&data[last..]);
    out.trim().to_string()
  }
}

/// Visible callout for a failed inline script.
#[must_use]
pub fn script_error_callout(error: &ScriptError, source: &str) -> String {
  format!(
    "\n\n::: open .danger.readonly **{}: {}**\n```\n{source}\n```\n:::\n\n",
    error.name, error.message
  )
}

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(#{1,5})(?:[ \t]+(.*?))?[ \t]*$").unwrap_or_else(|e| {
    log::error!("Failed to compile HEADING_RE regex: {e}");
    never_matching_regex()
  })
});

/// Shift ATX headings of levels 1-5 down by `shift`, capped at level 6.
/// Lines inside fenced code are left alone.
#[must_use]
pub fn degrade_headings(text: &str, shift: usize) -> String {
  if shift == 0 {
    return text.to_string();
  }
  let mut fence = None;
  text
    .split('\n')
    .map(|line| {
      if let Some(open) = fence {
        if fence_closes(line, open) {
          fence = None;
        }
        return line.to_string();
      }
      if let Some(open) = fence_open(line) {
        fence = Some(open);
        return line.to_string();
      }
      let Some(caps) = HEADING_RE.captures(line) else {
        return line.to_string();
      };
      let depth = (caps[1].len() + shift).min(6);
      let mut degraded = "#".repeat(depth);
      if let Some(title) = caps.get(2).map(|m| m.as_str()).filter(|t| !t.is_empty()) {
        degraded.push(' ');
        degraded.push_str(title);
      }
      degraded
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn degrade_shifts_and_caps() {
    assert_eq!(degrade_headings("## Title", 2), "#### Title");
    assert_eq!(degrade_headings("##### Deep", 3), "###### Deep");
    assert_eq!(degrade_headings("#", 1), "##");
    assert_eq!(degrade_headings("###### Six", 1), "###### Six");
    assert_eq!(degrade_headings("#tag", 1), "#tag");
    assert_eq!(
      degrade_headings("```\n# comment\n```\n# Real", 1),
      "```\n# comment\n```\n## Real"
    );
  }

  #[test]
  fn visited_set_keeps_order() {
    let mut visited = VisitedSet::with_path("/index.md");
    assert!(visited.insert("/b.md"));
    assert!(!visited.insert("/index.md"));
    assert_eq!(visited.iter().collect::<Vec<_>>(), vec!["/index.md", "/b.md"]);
    assert!(visited.contains("/b.md"));
    assert_eq!(visited.len(), 2);
  }

  #[test]
  fn error_callout_layout() {
    let error = ScriptError::reference("x is not defined");
    assert_eq!(
      script_error_callout(&error, "x"),
      "\n\n::: open .danger.readonly **ReferenceError: x is not \
       defined**\n```\nx\n```\n:::\n\n"
    );
  }
}

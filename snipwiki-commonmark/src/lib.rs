//! # snipwiki-commonmark
//!
//! Rendering pipeline for snipwiki knowledge bases: CommonMark with wiki
//! extensions, recursive snippet transclusion, heading trees with fold
//! groups, and highlighted search excerpts.
//!
//! ## Quick Start
//!
//! ```rust
//! use snipwiki_commonmark::{MarkdownOptions, MarkdownProcessor};
//!
//! let processor = MarkdownProcessor::new(MarkdownOptions::default());
//! let result = processor.render("## Hello\n\nThis is **bold** text.");
//!
//! assert!(result.html.contains("<strong>bold</strong>"));
//! assert_eq!(result.headings[0].id, "h2-1");
//! ```
//!
//! ## Pipeline
//!
//! A page goes through [`transclusion::Resolver`] (text to text), then
//! [`category::expand_category_list`] for `[list]` pages, then
//! [`MarkdownProcessor::render_page`] (text to HTML), and finally
//! [`heading::augment_article`] which folds headings and fills the table of
//! contents. [`search`] works on raw document text independently.
//!
//! ## Features
//!
//! - **`:::` blocks** rendered as collapsible `<details>`
//! - **Counted heading ids** (`h2-1`, `h2-2`, ...) scoped to one render
//! - **Title directives** on links and images (`"tooltip#.class"`,
//!   `"#320"`)
//! - **Snippet transclusion** with parameters, defaults, clipping and
//!   heading degrade
//! - **Error recovery**: failures render as visible callouts instead of
//!   aborting the page

pub mod category;
pub mod document;
pub mod heading;
pub mod processor;
pub mod search;
pub mod transclusion;
mod types;
pub mod utils;

pub use crate::{
  document::{Document, DocumentFlags, FetchedFile},
  heading::{ArticleElement, HeadingTree, TocColumn, augment_article},
  processor::{
    MarkdownOptions,
    MarkdownOptionsBuilder,
    MarkdownProcessor,
    RenderContext,
    ReplacerRule,
  },
  search::{SearchHit, SearchQuery, highlight, search},
  transclusion::{
    CachedProvider,
    FileProvider,
    Resolver,
    VisitedSet,
    degrade_headings,
  },
  types::{Heading, RenderResult},
};

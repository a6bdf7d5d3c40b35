//! Markdown rendering.
//!
//! # Architecture
//!
//! - [`core`]: the processor and its rendering pipeline
//! - [`process`]: entry points with panic recovery
//! - [`extensions`]: text-level wiki extensions (page marks, `:::` blocks,
//!   escapes, title directives)
//! - [`types`]: configuration and per-render state
pub mod core;
pub mod extensions;
pub mod process;
pub mod types;

pub use extensions::{
  DetailsMarker,
  ImageDirective,
  SNIP_MARK,
  TOC_MARK,
  apply_page_marks,
  parse_details_marker,
};
pub use process::{process_safe, render_with_recovery};
pub use types::{
  DEFAULT_SMART_QUOTES,
  MarkdownOptions,
  MarkdownOptionsBuilder,
  MarkdownProcessor,
  RenderContext,
  ReplacerError,
  ReplacerRule,
};

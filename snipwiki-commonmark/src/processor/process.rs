//! Rendering entry points with panic containment.
use log::error;

use super::types::MarkdownProcessor;
use crate::types::RenderResult;

/// Markup emitted when rendering a page failed outright.
pub const RENDER_ERROR_HTML: &str =
  "<div class=\"error\">Critical error processing markdown content</div>";

/// Render a page with error recovery.
///
/// A panic anywhere in the pipeline is logged and replaced by an error block,
/// so one broken document never takes down a whole build.
///
/// # Arguments
///
/// * `processor` - The configured markdown processor
/// * `content` - The raw markdown content to render
///
/// # Returns
///
/// A `RenderResult` with the page HTML and its headings
#[must_use]
pub fn render_with_recovery(
  processor: &MarkdownProcessor,
  content: &str,
) -> RenderResult {
  match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
    processor.render_page(content)
  })) {
    Ok(result) => result,
    Err(panic_err) => {
      error!("Panic during markdown processing: {panic_err:?}");
      RenderResult {
        html:     RENDER_ERROR_HTML.to_string(),
        headings: Vec::new(),
      }
    },
  }
}

/// Safely process markup content with error recovery.
///
/// # Arguments
///
/// * `content` - The content to process
/// * `processor_fn` - The processing function to apply
/// * `fallback` - Fallback content to use if processing fails
///
/// # Returns
///
/// The processed content or fallback on error
pub fn process_safe<F>(content: &str, processor_fn: F, fallback: &str) -> String
where
  F: FnOnce(&str) -> String,
{
  if content.is_empty() {
    return String::new();
  }

  let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
    processor_fn(content)
  }));

  match result {
    Ok(processed_text) => processed_text,
    Err(e) => {
      if let Some(error_msg) = e.downcast_ref::<String>() {
        error!("Error processing markup: {error_msg}");
      } else if let Some(error_msg) = e.downcast_ref::<&str>() {
        error!("Error processing markup: {error_msg}");
      } else {
        error!("Unknown error occurred while processing markup");
      }

      if fallback.is_empty() {
        content.to_string()
      } else {
        fallback.to_string()
      }
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn process_safe_returns_fallback_on_panic() {
    #[allow(clippy::panic, reason = "exercising the recovery path")]
    let out = process_safe("input", |_| panic!("boom"), "fallback");
    assert_eq!(out, "fallback");
  }

  #[test]
  fn process_safe_skips_empty_input() {
    let out = process_safe("", |_| "never".to_string(), "fallback");
    assert_eq!(out, "");
  }
}

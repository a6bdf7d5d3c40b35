//! Core implementation of the Markdown processor.
//!
//! Rendering runs in three stages: `:::` blocks are rendered inside out and
//! replaced by placeholder comments, the remaining text is rendered by comrak
//! with in-place AST rewrites for text runs and code fences, and the final
//! HTML is decorated through a DOM pass (links, images, tables, footnotes and
//! headings).
use std::sync::LazyLock;

use comrak::{
  Arena,
  nodes::{AstNode, NodeHtmlBlock, NodeValue},
  options::Options,
  parse_document,
};
use kuchikikiki::NodeRef;
use log::trace;
use markup5ever::local_name;
use regex::Regex;
use tendril::TendrilSink;

use super::{
  extensions::{
    self,
    EXTERNAL_ICON,
    ImageDirective,
    LINK_ICON,
    Segment,
  },
  process::process_safe,
  types::{MarkdownOptions, MarkdownProcessor, RenderContext},
};
use crate::{
  types::{Heading, RenderResult},
  utils::{self, never_matching_regex},
};

const BLOCK_PREFIX: &str = "snipwiki-block:";

impl MarkdownProcessor {
  /// Create a new `MarkdownProcessor` with the given options.
  #[must_use]
  pub const fn new(options: MarkdownOptions) -> Self {
    Self { options }
  }

  /// Access processor options.
  #[must_use]
  pub const fn options(&self) -> &MarkdownOptions {
    &self.options
  }

  /// Render Markdown to HTML with a fresh render context.
  #[must_use]
  pub fn render(&self, markdown: &str) -> RenderResult {
    let mut ctx = RenderContext::new();
    self.render_with_context(markdown, &mut ctx)
  }

  /// Render a whole page: snip delimiters are dropped and the first `[toc]`
  /// line becomes the table of contents container.
  #[must_use]
  pub fn render_page(&self, markdown: &str) -> RenderResult {
    self.render(&extensions::apply_page_marks(markdown))
  }

  /// Render Markdown to HTML using the given context.
  ///
  /// Heading counters in `ctx` keep counting across calls, so a context must
  /// not be shared between unrelated pages.
  #[must_use]
  pub fn render_with_context(
    &self,
    markdown: &str,
    ctx: &mut RenderContext,
  ) -> RenderResult {
    let html = self.render_blocks(markdown.trim(), ctx);
    let mut headings = Vec::new();
    let html = kuchiki_postprocess_html(&html, |document| {
      self.apply_dom_transformations(document);
      if !ctx.rendering_summary {
        headings = decorate_headings(document, ctx);
      }
    });
    RenderResult {
      html: html.trim().to_string(),
      headings,
    }
  }

  /// Render a single line of inline Markdown.
  ///
  /// While `ctx` is rendering a summary the output is left undecorated; the
  /// enclosing render decorates it together with the rest of the page.
  #[must_use]
  pub fn render_inline(&self, text: &str, ctx: &mut RenderContext) -> String {
    let arena = Arena::new();
    let options = self.comrak_options();
    let root = parse_document(&arena, text.trim(), &options);
    self.transform_ast(root);

    let mut html = String::new();
    match single_paragraph(root) {
      Some(paragraph) => {
        for child in paragraph.children() {
          comrak::format_html(child, &options, &mut html).unwrap_or_default();
        }
      },
      None => {
        comrak::format_html(root, &options, &mut html).unwrap_or_default();
      },
    }

    if ctx.rendering_summary {
      return html.trim().to_string();
    }
    kuchiki_postprocess_html(&html, |document| {
      self.apply_dom_transformations(document);
      decorate_headings(document, ctx);
    })
    .trim()
    .to_string()
  }

  /// Render text that may contain `:::` blocks.
  fn render_blocks(&self, text: &str, ctx: &mut RenderContext) -> String {
    let segments = extensions::parse_details(text);
    let markdown = self.assemble(&segments, ctx);
    let html = self.convert_to_html(&markdown);
    substitute_blocks(&html, ctx)
  }

  /// Join segments back into Markdown, rendering every block and leaving a
  /// placeholder comment in its place.
  fn assemble(&self, segments: &[Segment], ctx: &mut RenderContext) -> String {
    let mut markdown = String::new();
    for segment in segments {
      match segment {
        Segment::Text(text) => markdown.push_str(text),
        Segment::Details { marker, body } => {
          let inner = self.assemble(body, ctx);
          let inner = substitute_blocks(&self.convert_to_html(&inner), ctx);
          let html = self.render_details(marker, &inner, ctx);
          let index = ctx.blocks.len();
          ctx.blocks.push(html);
          markdown.push_str(&format!("\n<!--{BLOCK_PREFIX}{index}-->\n\n"));
        },
      }
    }
    markdown
  }

  fn render_details(
    &self,
    marker: &str,
    inner: &str,
    ctx: &mut RenderContext,
  ) -> String {
    let marker = extensions::parse_details_marker(marker);
    let summary = match &marker.summary {
      Some(summary) => {
        let outer = std::mem::replace(&mut ctx.rendering_summary, true);
        let html = self.render_inline(summary, ctx);
        ctx.rendering_summary = outer;
        html
      },
      None => String::new(),
    };

    let mut attrs = String::new();
    if marker.open {
      attrs.push_str(" open");
    }
    if !marker.classes.is_empty() {
      attrs.push_str(&format!(
        " class=\"{}\"",
        utils::escape_attr(&marker.classes.join(" "))
      ));
    }
    format!("<details{attrs}><summary>{summary}</summary>\n{inner}</details>")
  }

  /// Convert markdown to HTML using comrak and configured options.
  fn convert_to_html(&self, content: &str) -> String {
    let arena = Arena::new();
    let options = self.comrak_options();
    let root = parse_document(&arena, content, &options);

    self.transform_ast(root);

    let mut html_output = String::new();
    comrak::format_html(root, &options, &mut html_output).unwrap_or_default();
    html_output
  }

  /// Rewrite text runs and code fences in place.
  fn transform_ast<'a>(&self, root: &'a AstNode<'a>) {
    let nodes: Vec<_> = root.descendants().collect();
    for node in nodes {
      merge_text_siblings(node);
      let mut data = node.data.borrow_mut();
      match data.value {
        NodeValue::Text(ref mut text) => {
          let current: &str = text;
          let processed = self.process_text(current);
          if processed != current {
            *text = processed.into();
          }
        },
        NodeValue::CodeBlock(ref code) if code.fenced => {
          let (lang, lines) = extensions::split_fence_info(&code.info);
          if lang.is_empty() {
            continue;
          }
          let data_line = lines.map_or_else(String::new, |lines| {
            format!(" data-line=\"{}\"", utils::escape_attr(&lines))
          });
          let html = format!(
            "<pre><code class=\"line-numbers language-{}\"{data_line}>{}</code></pre>\n",
            utils::escape_attr(&lang),
            utils::escape_html(&code.literal)
          );
          data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal:    html,
          });
        },
        _ => {},
      }
    }
  }

  /// Unicode escapes first, then smart quotes, then replacer rules in order.
  fn process_text(&self, text: &str) -> String {
    let mut content = extensions::decode_unicode_escapes(text);
    if let Some(quotes) = self.options.quote_chars() {
      if content.contains(['“', '”', '‘', '’']) {
        content = content
          .chars()
          .map(|c| {
            match c {
              '“' => quotes[0],
              '”' => quotes[1],
              '‘' => quotes[2],
              '’' => quotes[3],
              other => other,
            }
          })
          .collect();
      }
    }
    for rule in &self.options.replacers {
      content = rule.apply(&content);
    }
    content
  }

  /// Build comrak options from `MarkdownOptions`.
  fn comrak_options(&self) -> Options<'_> {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.footnotes = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.autolink = self.options.autolink;
    options.extension.description_lists = true;
    options.extension.header_id_prefix = None;
    options.parse.smart = self.options.quote_chars().is_some();
    options.render.r#unsafe = true;
    options.render.hardbreaks = self.options.hard_breaks;
    options
  }

  /// Apply all DOM transformations to the parsed HTML document.
  fn apply_dom_transformations(&self, document: &NodeRef) {
    self.process_links(document);
    self.process_images(document);
    process_table_heads(document);
    self.process_footnotes(document);
  }

  /// External links open in a new tab with an icon after them. Internal
  /// document links may be rewritten into hash routes by a `#` title
  /// directive, and open in a new tab unless they point home or at an
  /// anchor.
  fn process_links(&self, document: &NodeRef) {
    let Ok(links) = document.select("a[href]") else {
      return;
    };
    let links: Vec<NodeRef> = links.map(|link| link.as_node().clone()).collect();
    let home = utils::add_base_path(&self.options.home_path, &self.options.base_path);

    for link in links {
      let Some(element) = link.as_element() else {
        continue;
      };
      let mut attrs = element.attributes.borrow_mut();
      let original = attrs.get(local_name!("href")).unwrap_or_default().to_string();

      if utils::is_external_link(&original) {
        attrs.insert(local_name!("rel"), "noopener noreferrer".to_string());
        attrs.insert(local_name!("target"), "_blank".to_string());
        drop(attrs);
        for icon in parse_fragment(EXTERNAL_ICON).into_iter().rev() {
          link.insert_after(icon);
        }
        continue;
      }

      let mut href = original.clone();
      let route = attrs
        .get(local_name!("title"))
        .and_then(|title| extensions::link_hash_route(&href, title));
      if let Some((route, tooltip)) = route {
        href = route;
        set_or_remove(&mut attrs, local_name!("title"), tooltip);
      }

      let href = utils::add_base_path(&href, &self.options.base_path);
      if !href.starts_with('#') && href != home {
        attrs.insert(local_name!("target"), "_blank".to_string());
      }
      attrs.insert(local_name!("href"), href);
      drop(attrs);

      if link.first_child().is_none() && !original.starts_with('#') {
        trace!("Filling empty link text with {original}");
        link.append(NodeRef::new_text(original));
      }
    }
  }

  /// Prefix relative image sources and apply `#` title directives.
  fn process_images(&self, document: &NodeRef) {
    let Ok(images) = document.select("img[src]") else {
      return;
    };
    for image in images {
      let mut attrs = image.attributes.borrow_mut();
      if let Some(src) = attrs.get(local_name!("src")).map(ToString::to_string)
      {
        if !utils::is_external_link(&src) {
          attrs.insert(
            local_name!("src"),
            utils::add_base_path(&src, &self.options.base_path),
          );
        }
      }

      let Some((tooltip, directive)) = attrs
        .get(local_name!("title"))
        .and_then(extensions::parse_image_title)
      else {
        continue;
      };
      match directive {
        ImageDirective::Width(width) => {
          attrs.insert(local_name!("width"), width.to_string());
        },
        ImageDirective::Classes(classes) => {
          let joined = attrs
            .get(local_name!("class"))
            .map(|existing| format!("{existing} {}", classes.join(" ")))
            .unwrap_or_else(|| classes.join(" "));
          attrs.insert(local_name!("class"), joined);
        },
        ImageDirective::Style(style) => {
          attrs.insert(local_name!("style"), style);
        },
      }
      set_or_remove(&mut attrs, local_name!("title"), tooltip);
    }
  }

  /// Put the localized label in front of the footnotes list.
  fn process_footnotes(&self, document: &NodeRef) {
    let Ok(section) = document.select_first("section.footnotes") else {
      return;
    };
    let section = section.as_node();
    if let Ok(list) = section.select_first("ol") {
      add_class(list.as_node(), "footnotes-list");
    }
    let label = format!(
      "<p>{}</p>",
      utils::escape_html(&self.options.footnotes_label)
    );
    for node in parse_fragment(&label).into_iter().rev() {
      section.prepend(node);
    }
  }
}

/// The paragraph of a document that holds exactly one paragraph.
fn single_paragraph<'a>(root: &'a AstNode<'a>) -> Option<&'a AstNode<'a>> {
  let first = root.first_child()?;
  let is_paragraph = matches!(first.data.borrow().value, NodeValue::Paragraph);
  (is_paragraph && first.next_sibling().is_none()).then_some(first)
}

/// Fold following text siblings into `node` so escapes split by the inline
/// parser are seen as one run.
fn merge_text_siblings<'a>(node: &'a AstNode<'a>) {
  if !matches!(node.data.borrow().value, NodeValue::Text(_)) {
    return;
  }
  while let Some(next) = node.next_sibling() {
    let next_text = match &next.data.borrow().value {
      NodeValue::Text(text) => text.to_string(),
      _ => break,
    };
    if let NodeValue::Text(ref mut text) = node.data.borrow_mut().value {
      let merged = format!("{text}{next_text}");
      *text = merged.into();
    }
    next.detach();
  }
}

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"<!--snipwiki-block:(\d+)-->").unwrap_or_else(|e| {
    log::error!("Failed to compile BLOCK_RE regex: {e}");
    never_matching_regex()
  })
});

/// Replace block placeholder comments with the rendered blocks.
fn substitute_blocks(html: &str, ctx: &RenderContext) -> String {
  if !html.contains(BLOCK_PREFIX) {
    return html.to_string();
  }
  BLOCK_RE
    .replace_all(html, |caps: &regex::Captures| {
      caps[1]
        .parse::<usize>()
        .ok()
        .and_then(|index| ctx.blocks.get(index))
        .cloned()
        .unwrap_or_default()
    })
    .into_owned()
}

static FOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\+\s+").unwrap_or_else(|e| {
    log::error!("Failed to compile FOLD_RE regex: {e}");
    never_matching_regex()
  })
});

/// Give top-level headings their ids, fold class, level badge and anchor
/// icon.
fn decorate_headings(
  document: &NodeRef,
  ctx: &mut RenderContext,
) -> Vec<Heading> {
  let Ok(body) = document.select_first("body") else {
    return Vec::new();
  };
  let mut headings = Vec::new();
  let children: Vec<NodeRef> = body.as_node().children().collect();
  for node in children {
    let Some(level) = heading_level(&node) else {
      continue;
    };

    let mut foldable = false;
    if let Some(first) = node.first_child() {
      if let Some(text) = first.as_text() {
        let mut text = text.borrow_mut();
        if let Some(prefix) = FOLD_RE.find(&text) {
          let stripped = text[prefix.end()..].to_string();
          *text = stripped;
          foldable = true;
        }
      }
    }

    let id = ctx.next_heading_id(level);
    let text = node.text_contents().trim().to_string();
    if let Some(element) = node.as_element() {
      element
        .attributes
        .borrow_mut()
        .insert(local_name!("id"), id.clone());
    }
    if foldable {
      add_class(&node, "fold");
    }

    let badge = format!(
      "<span class=\"heading-tag\">H<small>{level}</small></span>"
    );
    for part in parse_fragment(&badge).into_iter().rev() {
      node.prepend(part);
    }
    let anchor = format!("<span class=\"heading-link\">{LINK_ICON}</span>");
    for part in parse_fragment(&anchor) {
      node.append(part);
    }

    headings.push(Heading {
      level,
      id,
      text,
      foldable,
    });
  }
  headings
}

/// Level of an `h1`-`h6` element.
pub(crate) fn heading_level(node: &NodeRef) -> Option<u8> {
  let element = node.as_element()?;
  let name = element.name.local.as_ref();
  let level = name.strip_prefix('h')?.parse::<u8>().ok()?;
  (name.len() == 2 && (1..=6).contains(&level)).then_some(level)
}

/// Hide header rows whose cells are all empty.
fn process_table_heads(document: &NodeRef) {
  let Ok(heads) = document.select("thead") else {
    return;
  };
  let heads: Vec<NodeRef> = heads.map(|head| head.as_node().clone()).collect();
  for head in heads {
    let Ok(cells) = head.select("th") else {
      continue;
    };
    let all_empty = cells.into_iter().all(|cell| {
      cell.as_node().children().all(|child| {
        child
          .as_text()
          .is_some_and(|text| text.borrow().trim().is_empty())
      })
    });
    if all_empty {
      add_class(&head, "hidden");
    }
  }
}

/// Append a class to an element.
pub(crate) fn add_class(node: &NodeRef, class: &str) {
  let Some(element) = node.as_element() else {
    return;
  };
  let mut attrs = element.attributes.borrow_mut();
  let classes = match attrs.get(local_name!("class")) {
    Some(existing) if existing.split_whitespace().any(|c| c == class) => {
      return;
    },
    Some(existing) if !existing.trim().is_empty() => {
      format!("{} {class}", existing.trim())
    },
    _ => class.to_string(),
  };
  attrs.insert(local_name!("class"), classes);
}

/// Remove a class from an element, dropping the attribute when it empties.
pub(crate) fn remove_class(node: &NodeRef, class: &str) {
  let Some(element) = node.as_element() else {
    return;
  };
  let mut attrs = element.attributes.borrow_mut();
  let Some(existing) = attrs.get(local_name!("class")) else {
    return;
  };
  let remaining: Vec<&str> =
    existing.split_whitespace().filter(|c| *c != class).collect();
  if remaining.is_empty() {
    attrs.remove(local_name!("class"));
  } else {
    let joined = remaining.join(" ");
    attrs.insert(local_name!("class"), joined);
  }
}

fn set_or_remove(
  attrs: &mut kuchikikiki::Attributes,
  name: markup5ever::LocalName,
  value: String,
) {
  if value.is_empty() {
    attrs.remove(name);
  } else {
    attrs.insert(name, value);
  }
}

/// Parse an HTML fragment into detached nodes.
pub(crate) fn parse_fragment(html: &str) -> Vec<NodeRef> {
  let document = kuchikikiki::parse_html().one(html);
  let Ok(body) = document.select_first("body") else {
    return Vec::new();
  };
  let nodes: Vec<NodeRef> = body.as_node().children().collect();
  for node in &nodes {
    node.detach();
  }
  nodes
}

/// Serialize the children of `<body>`.
pub(crate) fn serialize_body(document: &NodeRef) -> String {
  document
    .select_first("body")
    .map(|body| {
      body
        .as_node()
        .children()
        .map(|child| child.to_string())
        .collect::<String>()
    })
    .unwrap_or_default()
}

/// Standalone HTML post-processing function to avoid borrowing issues.
pub(crate) fn kuchiki_postprocess_html<F>(html: &str, transform_fn: F) -> String
where
  F: FnOnce(&NodeRef),
{
  process_safe(
    html,
    |html| {
      let document = kuchikikiki::parse_html().one(html);
      transform_fn(&document);
      serialize_body(&document)
    },
    html,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn processor() -> MarkdownProcessor {
    MarkdownProcessor::new(MarkdownOptions::default())
  }

  #[test]
  fn headings_get_counted_ids() {
    let result = processor().render("## One\n\n### Two\n\n## Three");
    let ids: Vec<&str> =
      result.headings.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["h2-1", "h3-1", "h2-2"]);
    assert!(result.html.contains("<h2 id=\"h2-1\">"));
    assert!(
      result
        .html
        .contains("<span class=\"heading-tag\">H<small>2</small></span>One")
    );
    assert!(result.html.contains("class=\"heading-link\""));
  }

  #[test]
  fn headings_carry_only_counted_ids() {
    let result = processor().render("# Intro\n\n## Setup");
    assert!(result.html.contains("<h1 id=\"h1-1\">"));
    assert!(result.html.contains("<h2 id=\"h2-1\">"));
    assert!(!result.html.contains("id=\"intro\""));
    assert!(!result.html.contains("class=\"anchor\""));
  }

  #[test]
  fn fenced_code_renders_as_block() {
    let result = processor().render("text\n\n```rust|1-2\nlet x = 1 < 2;\n```\n");
    assert!(result.html.contains(
      "<pre><code class=\"line-numbers language-rust\" data-line=\"1-2\">let x \
       = 1 &lt; 2;\n</code></pre>"
    ));
    assert!(!result.html.contains("<p><pre>"));
  }

  #[test]
  fn counters_reset_per_render() {
    let processor = processor();
    let first = processor.render("## A");
    let second = processor.render("## B");
    assert_eq!(first.headings[0].id, "h2-1");
    assert_eq!(second.headings[0].id, "h2-1");
  }

  #[test]
  fn foldable_heading_prefix_is_stripped() {
    let result = processor().render("## + Hidden part");
    assert!(result.headings[0].foldable);
    assert_eq!(result.headings[0].text, "Hidden part");
    assert!(result.html.contains("class=\"fold\""));
    assert!(!result.html.contains("+ Hidden"));
  }

  #[test]
  fn merged_text_runs() {
    let arena = Arena::new();
    let options = Options::default();
    let root = parse_document(&arena, "a\\u0041", &options);
    let paragraph = root.first_child().unwrap_or(root);
    if let Some(first) = paragraph.first_child() {
      merge_text_siblings(first);
    }
    let count = paragraph.children().count();
    assert_eq!(count, 1);
  }

  #[test]
  fn heading_levels() {
    let nodes = parse_fragment("<h3>x</h3><p>y</p><header>z</header>");
    assert_eq!(heading_level(&nodes[0]), Some(3));
    assert_eq!(heading_level(&nodes[1]), None);
    assert_eq!(heading_level(&nodes[2]), None);
  }

  #[test]
  fn class_helpers() {
    let nodes = parse_fragment("<p class=\"a\">x</p>");
    add_class(&nodes[0], "b");
    add_class(&nodes[0], "b");
    assert_eq!(nodes[0].to_string(), "<p class=\"a b\">x</p>");
    remove_class(&nodes[0], "a");
    remove_class(&nodes[0], "b");
    assert_eq!(nodes[0].to_string(), "<p>x</p>");
  }
}

//! Heading hierarchy, fold groups and table of contents.
//!
//! The tree is built from the flat list of an article's top-level elements.
//! [`HeadingTree`] is plain data so the nesting and folding rules can be
//! exercised without a DOM; [`augment_article`] applies the result to
//! rendered HTML.
use kuchikikiki::NodeRef;
use markup5ever::local_name;

use crate::{
  processor::core::{
    add_class,
    heading_level,
    kuchiki_postprocess_html,
    parse_fragment,
    remove_class,
  },
  utils::{escape_attr, escape_html},
};

/// One top-level element of a rendered article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleElement {
  /// An `h2`-`h6` element.
  Heading {
    level:    u8,
    id:       String,
    text:     String,
    foldable: bool,
  },
  /// Anything else.
  Body,
  /// The footnotes section; it and everything after it stay out of the tree.
  Footnotes,
}

/// A child of a heading: a nested heading (index into the tree's nodes) or a
/// body element (index into the article's elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChild {
  Heading(usize),
  Element(usize),
}

#[derive(Debug, Clone)]
pub struct HeadingNode {
  /// Index of the heading in the article's elements.
  pub element:   usize,
  pub level:     u8,
  pub id:        String,
  pub text:      String,
  pub is_folded: bool,
  pub parent:    Option<usize>,
  pub children:  Vec<TreeChild>,
}

/// One entry of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
  pub id:       String,
  pub text:     String,
  pub children: Vec<Self>,
}

impl TocEntry {
  /// This entry plus all nested entries.
  #[must_use]
  pub fn weight(&self) -> usize {
    1 + self.children.iter().map(Self::weight).sum::<usize>()
  }
}

/// One column of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocColumn {
  /// `ul-a`/`ul-b` for two columns, `ul-1`..`ul-3` for three.
  pub class:   Option<String>,
  pub entries: Vec<TocEntry>,
}

const MAX_TOC_COLUMNS: usize = 3;

/// Headings of one article, nested by level.
#[derive(Debug, Clone, Default)]
pub struct HeadingTree {
  nodes:  Vec<HeadingNode>,
  roots:  Vec<usize>,
  folded: Vec<bool>,
}

impl HeadingTree {
  /// Build the tree and apply the initial folds of foldable headings.
  #[must_use]
  pub fn build(elements: &[ArticleElement]) -> Self {
    let mut tree = Self {
      nodes:  Vec::new(),
      roots:  Vec::new(),
      folded: vec![false; elements.len()],
    };
    let mut cursor: Option<usize> = None;

    for (index, element) in elements.iter().enumerate() {
      let (level, id, text) = match element {
        ArticleElement::Footnotes => break,
        ArticleElement::Body => {
          if let Some(cursor) = cursor {
            tree.nodes[cursor].children.push(TreeChild::Element(index));
          }
          continue;
        },
        ArticleElement::Heading {
          level, id, text, ..
        } => (*level, id, text),
      };

      let parent = match cursor {
        Some(current) if level > tree.nodes[current].level => Some(current),
        Some(current) => {
          let mut parent = tree.nodes[current].parent;
          while let Some(candidate) = parent {
            if tree.nodes[candidate].level < level {
              break;
            }
            parent = tree.nodes[candidate].parent;
          }
          parent
        },
        None => None,
      };

      let node = tree.nodes.len();
      tree.nodes.push(HeadingNode {
        element: index,
        level,
        id: id.clone(),
        text: text.clone(),
        is_folded: false,
        parent,
        children: Vec::new(),
      });
      match parent {
        Some(parent) => tree.nodes[parent].children.push(TreeChild::Heading(node)),
        None => tree.roots.push(node),
      }
      cursor = Some(node);
    }

    for node in 0..tree.nodes.len() {
      let foldable = matches!(
        elements.get(tree.nodes[node].element),
        Some(ArticleElement::Heading { foldable: true, .. })
      );
      if foldable {
        tree.toggle_node(node);
      }
    }
    tree
  }

  #[must_use]
  pub fn nodes(&self) -> &[HeadingNode] {
    &self.nodes
  }

  /// Top-level headings.
  #[must_use]
  pub fn roots(&self) -> &[usize] {
    &self.roots
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  #[must_use]
  pub fn find(&self, id: &str) -> Option<&HeadingNode> {
    self.nodes.iter().find(|node| node.id == id)
  }

  /// Whether the article element at `index` is currently hidden.
  #[must_use]
  pub fn is_element_folded(&self, index: usize) -> bool {
    self.folded.get(index).copied().unwrap_or(false)
  }

  /// Fold or unfold the heading with the given id. Returns its new state, or
  /// `None` if no heading has that id.
  pub fn toggle(&mut self, id: &str) -> Option<bool> {
    let node = self.nodes.iter().position(|node| node.id == id)?;
    Some(self.toggle_node(node))
  }

  fn toggle_node(&mut self, node: usize) -> bool {
    let folded = !self.nodes[node].is_folded;
    self.nodes[node].is_folded = folded;
    let children = self.nodes[node].children.clone();
    for child in children {
      self.fold_child(child, folded);
    }
    folded
  }

  /// Hide or show a child; descent stops at headings that are folded
  /// themselves.
  fn fold_child(&mut self, child: TreeChild, folded: bool) {
    match child {
      TreeChild::Element(index) => self.set_folded(index, folded),
      TreeChild::Heading(node) => {
        self.set_folded(self.nodes[node].element, folded);
        if !self.nodes[node].is_folded {
          let children = self.nodes[node].children.clone();
          for child in children {
            self.fold_child(child, folded);
          }
        }
      },
    }
  }

  fn set_folded(&mut self, index: usize, folded: bool) {
    if let Some(slot) = self.folded.get_mut(index) {
      *slot = folded;
    }
  }

  fn toc_entry(&self, node: usize) -> TocEntry {
    let heading = &self.nodes[node];
    TocEntry {
      id:       heading.id.clone(),
      text:     heading.text.clone(),
      children: heading
        .children
        .iter()
        .filter_map(|child| {
          match child {
            TreeChild::Heading(child) => Some(self.toc_entry(*child)),
            TreeChild::Element(_) => None,
          }
        })
        .collect(),
    }
  }

  /// Lay the top-level headings out in up to three balanced columns.
  #[must_use]
  pub fn toc_columns(&self) -> Vec<TocColumn> {
    let total = self.nodes.len();
    if total == 0 {
      return Vec::new();
    }
    let max_weight = match total {
      0..=7 => total,
      8..=11 => total.div_ceil(2),
      _ => total.div_ceil(3),
    };

    let mut columns: Vec<Vec<TocEntry>> = vec![Vec::new()];
    let mut count = 0;
    for &root in &self.roots {
      let entry = self.toc_entry(root);
      let weight = entry.weight();
      count += weight;
      if count > max_weight {
        count = weight;
        let current_used = columns.last().is_some_and(|c| !c.is_empty());
        if current_used && columns.len() < MAX_TOC_COLUMNS {
          columns.push(Vec::new());
        }
      }
      if let Some(column) = columns.last_mut() {
        column.push(entry);
      }
    }

    let len = columns.len();
    columns
      .into_iter()
      .enumerate()
      .map(|(i, entries)| {
        let class = match len {
          3 => Some(format!("ul-{}", i + 1)),
          2 => Some(if i == 0 { "ul-a" } else { "ul-b" }.to_string()),
          _ => None,
        };
        TocColumn { class, entries }
      })
      .collect()
  }
}

/// Build the heading tree of rendered article HTML and apply it: initial
/// folds, the `#toc` contents, and removal of `#toc` on pages without
/// headings.
#[must_use]
pub fn augment_article(html: &str) -> String {
  kuchiki_postprocess_html(html, |document| {
    let Ok(body) = document.select_first("body") else {
      return;
    };
    let nodes: Vec<NodeRef> = body
      .as_node()
      .children()
      .filter(|node| node.as_element().is_some())
      .collect();
    let elements: Vec<ArticleElement> = nodes.iter().map(classify).collect();
    let tree = HeadingTree::build(&elements);

    for (index, node) in nodes.iter().enumerate() {
      if tree.is_element_folded(index) {
        add_class(node, "folded");
      } else {
        remove_class(node, "folded");
      }
    }
    for heading in tree.nodes() {
      if !heading.is_folded {
        continue;
      }
      if let Ok(tag) = nodes[heading.element].select_first(".heading-tag") {
        add_class(tag.as_node(), "folding");
      }
    }

    let Ok(toc) = document.select_first("#toc") else {
      return;
    };
    let toc = toc.as_node().clone();
    if tree.is_empty() {
      toc.detach();
      return;
    }
    let children: Vec<NodeRef> = toc.children().collect();
    for child in children {
      child.detach();
    }
    for column in tree.toc_columns() {
      for node in parse_fragment(&column_html(&column)) {
        toc.append(node);
      }
    }
  })
}

fn classify(node: &NodeRef) -> ArticleElement {
  if has_class(node, "footnotes") {
    return ArticleElement::Footnotes;
  }
  let Some(level) = heading_level(node).filter(|level| *level >= 2) else {
    return ArticleElement::Body;
  };
  let id = node
    .as_element()
    .and_then(|element| {
      element
        .attributes
        .borrow()
        .get(local_name!("id"))
        .map(str::to_string)
    })
    .unwrap_or_default();
  ArticleElement::Heading {
    level,
    id,
    text: heading_text(node),
    foldable: has_class(node, "fold"),
  }
}

/// Visible heading text without the level badge and anchor icon.
fn heading_text(node: &NodeRef) -> String {
  let text: String = node
    .children()
    .filter(|child| {
      !has_class(child, "heading-tag") && !has_class(child, "heading-link")
    })
    .map(|child| child.text_contents())
    .collect();
  let text = text.trim();
  if text.is_empty() {
    "[null]".to_string()
  } else {
    text.to_string()
  }
}

fn has_class(node: &NodeRef, class: &str) -> bool {
  node.as_element().is_some_and(|element| {
    element
      .attributes
      .borrow()
      .get(local_name!("class"))
      .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
  })
}

fn column_html(column: &TocColumn) -> String {
  let mut html = match &column.class {
    Some(class) => format!("<ul class=\"{class}\">"),
    None => "<ul>".to_string(),
  };
  for entry in &column.entries {
    entry_html(entry, &mut html);
  }
  html.push_str("</ul>");
  html
}

fn entry_html(entry: &TocEntry, html: &mut String) {
  html.push_str("<li><a href=\"#");
  html.push_str(&escape_attr(&entry.id));
  html.push_str("\">");
  html.push_str(&escape_html(&entry.text));
  html.push_str("</a>");
  if !entry.children.is_empty() {
    html.push_str("<ul>");
    for child in &entry.children {
      entry_html(child, html);
    }
    html.push_str("</ul>");
  }
  html.push_str("</li>");
}

#[cfg(test)]
mod tests {
  use super::*;

  fn heading(level: u8, id: &str) -> ArticleElement {
    ArticleElement::Heading {
      level,
      id: id.to_string(),
      text: id.to_string(),
      foldable: false,
    }
  }

  fn foldable(level: u8, id: &str) -> ArticleElement {
    ArticleElement::Heading {
      level,
      id: id.to_string(),
      text: id.to_string(),
      foldable: true,
    }
  }

  #[test]
  fn nesting_allows_skipped_levels() {
    let tree = HeadingTree::build(&[
      heading(2, "a"),
      heading(4, "b"),
      heading(3, "c"),
      heading(2, "d"),
    ]);
    let parent_of = |id: &str| {
      tree
        .find(id)
        .and_then(|node| node.parent)
        .map(|parent| tree.nodes()[parent].id.clone())
    };
    assert_eq!(parent_of("b").as_deref(), Some("a"));
    assert_eq!(parent_of("c").as_deref(), Some("a"));
    assert_eq!(parent_of("d"), None);
    assert_eq!(tree.roots().len(), 2);
  }

  #[test]
  fn body_before_first_heading_is_unowned() {
    let tree = HeadingTree::build(&[
      ArticleElement::Body,
      heading(2, "a"),
      ArticleElement::Body,
    ]);
    let a = tree.find("a").unwrap();
    assert_eq!(a.children, vec![TreeChild::Element(2)]);
  }

  #[test]
  fn footnotes_end_the_scan() {
    let tree = HeadingTree::build(&[
      heading(2, "a"),
      ArticleElement::Footnotes,
      heading(2, "b"),
    ]);
    assert!(tree.find("b").is_none());
  }

  #[test]
  fn foldable_heading_starts_folded() {
    let tree = HeadingTree::build(&[
      foldable(2, "a"),
      ArticleElement::Body,
      heading(3, "b"),
      ArticleElement::Body,
      heading(2, "c"),
    ]);
    assert!(tree.find("a").unwrap().is_folded);
    assert!(!tree.is_element_folded(0));
    assert!(tree.is_element_folded(1));
    assert!(tree.is_element_folded(2));
    assert!(tree.is_element_folded(3));
    assert!(!tree.is_element_folded(4));
  }

  #[test]
  fn folded_child_keeps_its_own_state() {
    // H2 > H2a (folded) > H3b
    let mut tree = HeadingTree::build(&[
      heading(2, "h2"),
      foldable(3, "h2a"),
      heading(4, "h3b"),
      ArticleElement::Body,
    ]);
    assert!(tree.is_element_folded(2));
    assert_eq!(tree.toggle("h2"), Some(true));
    assert!(tree.is_element_folded(1));
    assert_eq!(tree.toggle("h2"), Some(false));
    assert!(!tree.is_element_folded(1));
    // Descent stopped at the folded child, so its subtree stays hidden.
    assert!(tree.is_element_folded(2));
    assert!(tree.is_element_folded(3));
    assert!(!tree.find("h3b").unwrap().is_folded);
    assert_eq!(tree.toggle("missing"), None);
  }

  #[test]
  fn toc_weight_nine_uses_two_columns() {
    let mut elements = vec![heading(2, "a")];
    elements.extend((0..4).map(|i| heading(3, &format!("a{i}"))));
    elements.push(heading(2, "b"));
    elements.extend((0..3).map(|i| heading(3, &format!("b{i}"))));
    let tree = HeadingTree::build(&elements);
    let columns = tree.toc_columns();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].class.as_deref(), Some("ul-a"));
    assert_eq!(columns[1].class.as_deref(), Some("ul-b"));
    let weights: Vec<usize> = columns
      .iter()
      .map(|c| c.entries.iter().map(TocEntry::weight).sum())
      .collect();
    assert_eq!(weights, vec![5, 4]);
  }

  #[test]
  fn toc_caps_at_three_columns() {
    let elements: Vec<ArticleElement> =
      (0..14).map(|i| heading(2, &format!("h{i}"))).collect();
    let tree = HeadingTree::build(&elements);
    let columns = tree.toc_columns();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[2].class.as_deref(), Some("ul-3"));
    let sizes: Vec<usize> = columns.iter().map(|c| c.entries.len()).collect();
    assert_eq!(sizes, vec![5, 5, 4]);
  }

  #[test]
  fn small_toc_is_one_column() {
    let tree = HeadingTree::build(&[heading(2, "a"), heading(3, "b")]);
    let columns = tree.toc_columns();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].class, None);
  }

  #[test]
  fn augment_fills_toc_and_folds() {
    let html = "<div id=\"toc\"></div>\
      <h2 id=\"h2-1\" class=\"fold\"><span class=\"heading-tag\">H<small>2</small></span>One</h2>\
      <p>hidden</p>\
      <h2 id=\"h2-2\"><span class=\"heading-tag\">H<small>2</small></span>Two &amp; more</h2>";
    let out = augment_article(html);
    assert!(out.contains("<a href=\"#h2-1\">One</a>"), "got {out}");
    assert!(out.contains("<a href=\"#h2-2\">Two &amp; more</a>"));
    assert!(out.contains("<p class=\"folded\">hidden</p>"));
    assert!(out.contains("class=\"heading-tag folding\""));
  }

  #[test]
  fn augment_drops_toc_without_headings() {
    let out = augment_article("<div id=\"toc\"></div><p>text</p>");
    assert!(!out.contains("toc"));
    assert!(out.contains("<p>text</p>"));
  }
}

//! Tag index for category pages.
//!
//! A page containing a `[list]` line gets that line replaced by a markdown
//! index of every document grouped by its hierarchical tags.
use std::{collections::BTreeMap, sync::LazyLock};

use regex::{NoExpand, Regex};

use crate::{
  document::{Document, compare_documents},
  utils::never_matching_regex,
};

static LIST_MARK_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?im)^\[list\][ \t]*\r?$").unwrap_or_else(|e| {
    log::error!("Failed to compile LIST_MARK_RE regex: {e}");
    never_matching_regex()
  })
});

#[derive(Debug, Default)]
struct TagNode<'a> {
  children:  BTreeMap<String, TagNode<'a>>,
  documents: Vec<&'a Document>,
}

impl<'a> TagNode<'a> {
  fn insert(&mut self, tag: &str, document: &'a Document) {
    let node = tag.split('/').fold(self, |node, segment| {
      node.children.entry(segment.to_string()).or_default()
    });
    if !node.documents.iter().any(|seen| seen.path == document.path) {
      node.documents.push(document);
    }
  }
}

/// Whether `text` has a `[list]` line.
#[must_use]
pub fn has_list_mark(text: &str) -> bool {
  LIST_MARK_RE.is_match(text)
}

/// Replace the first `[list]` line with the tag index of `documents` and drop
/// any further ones. Text without a `[list]` line is returned unchanged.
#[must_use]
pub fn expand_category_list(
  text: &str,
  documents: &[Document],
  untagged_label: &str,
) -> String {
  if !has_list_mark(text) {
    return text.to_string();
  }
  let index = build_category_index(documents, untagged_label);
  let replaced = LIST_MARK_RE.replacen(text, 1, NoExpand(&index));
  LIST_MARK_RE
    .replace_all(&replaced, "")
    .trim()
    .to_string()
}

/// Markdown index of `documents` by tag.
///
/// Every tag node becomes a heading, `##` for top-level tags and one level
/// deeper per segment, titled with the number of documents at and below it,
/// and followed by links to its own documents. Untagged documents are listed
/// last under `untagged_label`.
#[must_use]
pub fn build_category_index(documents: &[Document], untagged_label: &str) -> String {
  let mut root = TagNode::default();
  let mut untagged = Vec::new();
  for document in documents.iter().filter(|document| !document.is_error) {
    if document.flags.tags.is_empty() {
      untagged.push(document);
      continue;
    }
    for tag in &document.flags.tags {
      root.insert(tag, document);
    }
  }

  let mut sections = Vec::new();
  for (tag, node) in &root.children {
    write_node(tag, node, 2, &mut sections);
  }
  if !untagged.is_empty() {
    let node = TagNode {
      children:  BTreeMap::new(),
      documents: untagged,
    };
    write_node(untagged_label, &node, 2, &mut sections);
  }
  sections.join("\n\n")
}

/// Append the sections of `node` and its descendants; returns the number of
/// documents listed under it.
fn write_node(
  tag: &str,
  node: &TagNode<'_>,
  level: usize,
  sections: &mut Vec<String>,
) -> usize {
  let position = sections.len();
  sections.push(String::new());

  let mut count = node.documents.len();
  for (child_tag, child) in &node.children {
    count += write_node(child_tag, child, level + 1, sections);
  }

  let mut documents = node.documents.clone();
  documents.sort_by(|a, b| compare_documents(a, b));
  let list = documents
    .iter()
    .map(|document| format!("- []({} \"#\")", document.path))
    .collect::<Vec<_>>()
    .join("\n");

  let mut section = format!("{} {tag} - ( {count} )", "#".repeat(level.min(6)));
  if !list.is_empty() {
    section.push_str("\n\n");
    section.push_str(&list);
  }
  sections[position] = section;
  count
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::FetchedFile;

  fn document(path: &str, text: &str) -> Document {
    Document::from_fetched(FetchedFile::ok(path, text))
  }

  #[test]
  fn nested_tags_count_descendants() {
    let documents = vec![
      document("/a.md", "@tags: lang/rust"),
      document("/b.md", "@tags: lang\n@updated: 2020-01-01"),
      document("/c.md", "no tags"),
    ];
    let index = build_category_index(&documents, "Untagged");
    assert_eq!(
      index,
      "## lang - ( 2 )\n\n- [](/b.md \"#\")\n\n\
       ### rust - ( 1 )\n\n- [](/a.md \"#\")\n\n\
       ## Untagged - ( 1 )\n\n- [](/c.md \"#\")"
    );
  }

  #[test]
  fn list_mark_is_replaced_once() {
    let documents = vec![document("/a.md", "@tags: x")];
    let out = expand_category_list("# Index\n[LIST]\ntext\n[list]", &documents, "-");
    assert_eq!(out, "# Index\n## x - ( 1 )\n\n- [](/a.md \"#\")\ntext");
    assert_eq!(expand_category_list("no mark", &documents, "-"), "no mark");
  }

  #[test]
  fn error_documents_are_skipped() {
    let documents = vec![Document::from_fetched(FetchedFile::error("/x.md", "404"))];
    assert_eq!(build_category_index(&documents, "Untagged"), "");
  }
}

use std::collections::HashMap;

use snipwiki_commonmark::{
  Document,
  FetchedFile,
  MarkdownOptions,
  MarkdownProcessor,
  SearchQuery,
  augment_article,
  category::expand_category_list,
  search,
  transclusion::{FileProvider, Resolver, VisitedSet},
};

struct Site(HashMap<&'static str, &'static str>);

impl FileProvider for Site {
  async fn fetch(&self, path: &str) -> FetchedFile {
    match self.0.get(path) {
      Some(data) => FetchedFile::ok(path, *data),
      None => FetchedFile::error(path, "404 Not Found"),
    }
  }
}

fn site() -> Site {
  Site(HashMap::from([
    (
      "/index.md",
      "@title: Home\n@tags: meta\n\n[toc]\n\n## + Intro\n\nWelcome.\n\n### \
       [+#lang=rust](/snippets/hello.md)\n\n## Index\n\n[list]",
    ),
    (
      "/snippets/hello.md",
      "@tags: snippets/code\n@updated: 2024-05-01\n\n## Hello in {{lang}}\n\n```{{lang}}|1\nfn main() {}\n```",
    ),
    (
      "/notes/loose.md",
      "# Loose note\n\nA note about the cat that sat.",
    ),
  ]))
}

async fn documents(site: &Site) -> Vec<Document> {
  let mut documents = Vec::new();
  for path in ["/index.md", "/snippets/hello.md", "/notes/loose.md"] {
    documents.push(Document::from_fetched(site.fetch(path).await));
  }
  documents
}

#[tokio::test]
async fn test_full_page_pipeline() {
  let site = site();
  let documents = documents(&site).await;
  let page = &documents[0];

  let resolver = Resolver::new(site);
  let text = resolver
    .resolve(&page.body(), VisitedSet::with_path(page.path.clone()))
    .await;
  assert!(text.contains("### [](/snippets/hello.md \"#\")"), "{text}");
  assert!(text.contains("#### Hello in rust"));
  assert!(text.contains("```rust|1"));

  let text = expand_category_list(&text, &documents, "Untagged");
  assert!(text.contains("## meta - ( 1 )"), "{text}");
  assert!(text.contains("## snippets - ( 1 )"));
  assert!(text.contains("### code - ( 1 )"));
  assert!(text.contains("## Untagged - ( 1 )\n\n- [](/notes/loose.md \"#\")"));

  let processor = MarkdownProcessor::new(MarkdownOptions::default());
  let result = processor.render_page(&text);
  assert!(result.html.contains("language-rust"));
  assert!(result.headings.iter().any(|h| h.foldable && h.text == "Intro"));

  let html = augment_article(&result.html);
  assert!(html.contains("<div id=\"toc\"><ul"), "{html}");
  assert!(html.contains("<a href=\"#h2-1\">Intro</a>"));
  assert!(html.contains("class=\"heading-tag folding\""));
  assert!(html.contains("<p class=\"folded\">Welcome.</p>"));
}

#[tokio::test]
async fn test_search_over_site() {
  let documents = documents(&site()).await;

  let hits = search(&documents, &SearchQuery::parse("CAT").unwrap());
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].title, "Loose note");
  let excerpt = hits[0].excerpt.as_deref().unwrap();
  assert!(excerpt.contains("<span class=\"highlight\">cat</span>"));
  assert!(excerpt.starts_with("<span class=\"ellipsis\">...</span>"));

  let hits = search(&documents, &SearchQuery::parse("@tags: snippets").unwrap());
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].path, "/snippets/hello.md");
  assert_eq!(hits[0].updated.as_deref(), Some("2024-05-01"));

  let hits = search(&documents, &SearchQuery::parse("home").unwrap());
  assert_eq!(hits[0].path, "/index.md");
  assert_eq!(hits[0].excerpt, None);
}

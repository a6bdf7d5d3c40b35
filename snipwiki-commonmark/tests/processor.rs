use snipwiki_commonmark::{
  MarkdownOptions,
  MarkdownProcessor,
  RenderContext,
  ReplacerRule,
  processor::render_with_recovery,
};

fn processor() -> MarkdownProcessor {
  MarkdownProcessor::new(MarkdownOptions::default())
}

#[test]
fn test_open_details_block_with_classes() {
  let result = processor().render("::: open .note.wide Read *me*\nbody text\n:::");
  let html = result.html;
  assert!(html.starts_with("<details open"), "unexpected details markup: {html}");
  assert!(html.contains("class=\"note wide\""));
  assert!(html.contains("<summary>Read <em>me</em></summary>"));
  assert!(html.contains("<p>body text</p>"));
  assert!(html.ends_with("</details>"));
}

#[test]
fn test_details_without_open_is_collapsed() {
  let html = processor().render("::: Title\ntext\n:::").html;
  assert!(html.starts_with("<details><summary>Title</summary>"), "{html}");
}

#[test]
fn test_unmatched_marker_falls_back_to_empty() {
  let html = processor().render(":::\ntext\n:::").html;
  assert!(html.starts_with("<details open"), "{html}");
  assert!(html.contains("class=\"empty\"><summary></summary>"));
}

#[test]
fn test_nested_details_blocks() {
  let md = ":::: Outer\n::: Inner\ndeep\n:::\n::::";
  let html = processor().render(md).html;
  let outer = html.find("<summary>Outer</summary>").expect("outer summary");
  let inner = html.find("<summary>Inner</summary>").expect("inner summary");
  assert!(outer < inner);
  assert_eq!(html.matches("</details>").count(), 2);
}

#[test]
fn test_heading_in_summary_is_not_decorated() {
  let result = processor().render("::: ## Summary heading\nbody\n:::");
  assert!(result.headings.is_empty());
  assert!(!result.html.contains("heading-tag"));
}

#[test]
fn test_heading_ids_badges_and_folding() {
  let result = processor().render("## One\n\n## + Two\n\n### Three");
  let ids: Vec<&str> = result.headings.iter().map(|h| h.id.as_str()).collect();
  assert_eq!(ids, vec!["h2-1", "h2-2", "h3-1"]);
  assert!(result.headings[1].foldable);
  assert_eq!(result.headings[1].text, "Two");
  assert!(
    result
      .html
      .contains("<span class=\"heading-tag\">H<small>2</small></span>One")
  );
  assert!(result.html.contains("class=\"fold\""));
  assert!(result.html.contains("heading-link"));
}

#[test]
fn test_counters_are_scoped_to_the_context() {
  let processor = processor();
  let mut ctx = RenderContext::new();
  let first = processor.render_with_context("## A", &mut ctx);
  let second = processor.render_with_context("## B", &mut ctx);
  assert_eq!(first.headings[0].id, "h2-1");
  assert_eq!(second.headings[0].id, "h2-2");
  assert_eq!(processor.render("## C").headings[0].id, "h2-1");
}

#[test]
fn test_external_and_internal_links() {
  let html = processor()
    .render("[ext](https://example.com) [doc](/notes/a.md) [home](/index.md) [top](#top)")
    .html;
  assert!(html.contains("rel=\"noopener noreferrer\""));
  assert!(html.contains("icon-external"));
  assert_eq!(html.matches("target=\"_blank\"").count(), 2, "{html}");
}

#[test]
fn test_empty_internal_link_gets_path_text() {
  let html = processor().render("[](/notes/a.md \"#\")").html;
  assert!(html.contains("href=\"#/notes/a.md\""), "{html}");
  assert!(html.contains(">/notes/a.md</a>"));
  assert!(!html.contains("title="));
}

#[test]
fn test_link_title_directive_builds_hash_route() {
  let html = processor()
    .render("[a](/dir/index.md \"Tip#part?q=1\")")
    .html;
  assert!(html.contains("href=\"#/dir/#part?q=1\""), "{html}");
  assert!(html.contains("title=\"Tip\""));
}

#[test]
fn test_image_directives() {
  let options = MarkdownOptions {
    base_path: "/wiki/".to_string(),
    ..Default::default()
  };
  let html = MarkdownProcessor::new(options)
    .render("![a](pic.png \"#320\") ![b](https://x.org/b.png \"Tip#.round.big\")")
    .html;
  assert!(html.contains("src=\"/wiki/pic.png\""), "{html}");
  assert!(html.contains("width=\"320\""));
  assert!(html.contains("src=\"https://x.org/b.png\""));
  assert!(html.contains("class=\"round big\""));
  assert!(html.contains("title=\"Tip\""));
}

#[test]
fn test_blank_table_header_is_hidden() {
  let html = processor().render("| | |\n|---|---|\n| a | b |").html;
  assert!(html.contains("<thead class=\"hidden\">"), "{html}");
}

#[test]
fn test_footnotes_get_label() {
  let options = MarkdownOptions {
    footnotes_label: "Notes".to_string(),
    ..Default::default()
  };
  let html = MarkdownProcessor::new(options).render("text[^1]\n\n[^1]: note").html;
  assert!(html.contains("<p>Notes</p>"), "{html}");
  assert!(html.contains("footnotes-list"));
}

#[test]
fn test_unicode_escapes_and_replacers() {
  let options = MarkdownOptions {
    replacers: ReplacerRule::compile_all(&[
      ("ab".to_string(), "x".to_string()),
      ("(".to_string(), "never".to_string()),
      ("x".to_string(), "y".to_string()),
    ]),
    ..Default::default()
  };
  assert_eq!(options.replacers.len(), 2);
  let html = MarkdownProcessor::new(options).render("ab \\u0041 U+1F600").html;
  assert!(html.contains("y A 😀"), "{html}");
}

#[test]
fn test_page_marks() {
  let result = processor().render_page("[TOC]\n\n## A\n\n--8<--\n\n[toc]\ntext");
  assert_eq!(result.html.matches("id=\"toc\"").count(), 1);
  assert!(!result.html.contains("--8&lt;--"));
  assert!(!result.html.contains("[toc]"));
}

#[test]
fn test_render_with_recovery_renders() {
  let result = render_with_recovery(&processor(), "plain *text*");
  assert_eq!(result.html, "<p>plain <em>text</em></p>");
}

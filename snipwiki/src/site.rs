//! Page rendering and site builds over a [`FsProvider`].
use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use futures::future::join_all;
use log::{debug, info};
use snipwiki_commonmark::{
  CachedProvider,
  Document,
  FileProvider,
  MarkdownProcessor,
  Resolver,
  SearchHit,
  SearchQuery,
  VisitedSet,
  augment_article,
  category::{expand_category_list, has_list_mark},
  processor::render_with_recovery,
  search,
  utils::{escape_html, normalize_path},
};
use tokio::sync::OnceCell;

use crate::{
  config::Config,
  error::{Result, SnipwikiError},
  provider::FsProvider,
};

/// A wiki rooted at the configured input directory.
#[derive(Debug)]
pub struct Site {
  config:    Config,
  processor: MarkdownProcessor,
  provider:  Arc<FsProvider>,
  documents: OnceCell<Vec<Document>>,
}

impl Site {
  #[must_use]
  pub fn new(config: Config) -> Self {
    let processor = MarkdownProcessor::new(config.markdown_options());
    let provider = Arc::new(FsProvider::new(&config.input_dir));
    Self {
      config,
      processor,
      provider,
      documents: OnceCell::new(),
    }
  }

  #[must_use]
  pub const fn config(&self) -> &Config {
    &self.config
  }

  /// All documents of the site, loaded once.
  ///
  /// # Errors
  ///
  /// Returns an error if the input directory cannot be walked.
  pub async fn documents(&self) -> Result<&[Document]> {
    let documents = self
      .documents
      .get_or_try_init(|| self.provider.load_documents())
      .await?;
    Ok(documents)
  }

  /// Render one page into an `<article>` fragment.
  ///
  /// # Errors
  ///
  /// Returns an error if the path is not a Markdown document inside the input
  /// directory or the document cannot be read.
  pub async fn render_page(&self, page: &str) -> Result<String> {
    let path = normalize_path(page)
      .filter(|path| path.ends_with(".md"))
      .ok_or_else(|| SnipwikiError::InvalidPath(page.to_string()))?;

    // One cache per page load; siblings fetching the same snippet share it.
    let provider = CachedProvider::new(Arc::clone(&self.provider));
    let file = provider.fetch(&path).await;
    if file.is_error {
      return Err(SnipwikiError::NotFound(format!("{path}: {}", file.data)));
    }
    let document = Document::from_fetched(file);

    let resolver = Resolver::new(provider);
    let mut text = resolver
      .resolve(&document.body(), VisitedSet::with_path(path.clone()))
      .await;
    if has_list_mark(&text) {
      let documents = self.documents().await?;
      text = expand_category_list(&text, documents, &self.config.messages.untagged);
    }
    debug!("Resolved {path} into {} bytes of markdown", text.len());

    let result = render_with_recovery(&self.processor, &text);
    let body = augment_article(&result.html);
    Ok(self.wrap_article(&document, &body))
  }

  fn wrap_article(&self, document: &Document, body: &str) -> String {
    let mut html = String::from("<article>\n<header>\n");
    html.push_str(&format!(
      "<h1 class=\"title\">{}</h1>\n",
      escape_html(&document.flags.title)
    ));

    let updated = document.updated_display(&self.config.date_format);
    let author = document
      .flags
      .author
      .as_ref()
      .or(self.config.default_author.as_ref());
    if updated.is_some() || author.is_some() {
      html.push_str("<p class=\"meta\">");
      if let Some(updated) = updated {
        html.push_str(&format!("<time>{}</time>", escape_html(&updated)));
      }
      if let Some(author) = author {
        html.push_str(&format!(
          "<span class=\"author\">{}</span>",
          escape_html(author)
        ));
      }
      html.push_str("</p>\n");
    }
    html.push_str("</header>\n");
    html.push_str(body);
    html.push_str("\n</article>\n");
    html
  }

  /// Output location of a rendered page.
  #[must_use]
  pub fn output_path(&self, page: &str) -> PathBuf {
    let relative = Path::new(page.trim_start_matches('/')).with_extension("html");
    self.config.output_dir.join(relative)
  }

  /// Render every document into the output directory. Returns the number of
  /// pages written.
  ///
  /// # Errors
  ///
  /// Returns the first error met while rendering or writing a page.
  pub async fn build(&self) -> Result<usize> {
    let pages = self.provider.list_pages()?;
    info!(
      "Building {} pages from {} into {}",
      pages.len(),
      self.config.input_dir.display(),
      self.config.output_dir.display()
    );

    let results = join_all(pages.iter().map(|page| self.build_page(page))).await;
    results.into_iter().collect::<Result<Vec<()>>>()?;
    Ok(pages.len())
  }

  async fn build_page(&self, page: &str) -> Result<()> {
    let html = self.render_page(page).await?;
    let output = self.output_path(page);
    if let Some(parent) = output.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&output, html).await?;
    info!("Rendered {page} -> {}", output.display());
    Ok(())
  }

  /// Search all documents. An empty query yields no hits.
  ///
  /// # Errors
  ///
  /// Returns an error if the documents cannot be loaded.
  pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
    let Some(query) = SearchQuery::parse(query) else {
      return Ok(Vec::new());
    };
    Ok(search(self.documents().await?, &query))
  }
}

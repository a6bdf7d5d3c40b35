//! Documents served from a directory on disk.
use std::{
  io,
  path::{Path, PathBuf},
};

use futures::future::join_all;
use log::{debug, trace};
use snipwiki_commonmark::{
  Document,
  FetchedFile,
  FileProvider,
  utils::normalize_path,
};
use walkdir::WalkDir;

use crate::error::Result;

/// Serves `/`-rooted document paths from files under `root`.
#[derive(Debug, Clone)]
pub struct FsProvider {
  root: PathBuf,
}

impl FsProvider {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  #[must_use]
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// File system location of a document path, or `None` when the path
  /// escapes the root.
  #[must_use]
  pub fn file_path(&self, path: &str) -> Option<PathBuf> {
    let normalized = normalize_path(path)?;
    Some(self.root.join(normalized.trim_start_matches('/')))
  }

  /// Every Markdown document under the root as a sorted list of `/`-rooted
  /// paths.
  ///
  /// # Errors
  ///
  /// Returns an error if the directory cannot be walked.
  pub fn list_pages(&self) -> Result<Vec<String>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(&self.root).follow_links(true) {
      let entry = entry?;
      let path = entry.path();
      if !entry.file_type().is_file()
        || path.extension().and_then(|ext| ext.to_str()) != Some("md")
      {
        continue;
      }
      let Ok(relative) = path.strip_prefix(&self.root) else {
        continue;
      };
      let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
      pages.push(format!("/{}", segments.join("/")));
    }
    pages.sort();
    debug!("Found {} pages under {}", pages.len(), self.root.display());
    Ok(pages)
  }

  /// Fetch and parse every document under the root concurrently.
  ///
  /// # Errors
  ///
  /// Returns an error if the directory cannot be walked.
  pub async fn load_documents(&self) -> Result<Vec<Document>> {
    let pages = self.list_pages()?;
    let files = join_all(pages.iter().map(|page| self.fetch(page))).await;
    Ok(files.into_iter().map(Document::from_fetched).collect())
  }
}

impl FileProvider for FsProvider {
  async fn fetch(&self, path: &str) -> FetchedFile {
    let Some(file_path) = self.file_path(path) else {
      return FetchedFile::error(path, "403 Forbidden");
    };
    trace!("Reading {}", file_path.display());
    match tokio::fs::read_to_string(&file_path).await {
      Ok(data) => FetchedFile::ok(path, data),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        FetchedFile::error(path, "404 Not Found")
      },
      Err(e) => FetchedFile::error(path, e.to_string()),
    }
  }
}

//! Single-flight file cache.
use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use log::trace;
use tokio::sync::OnceCell;

use super::FileProvider;
use crate::document::FetchedFile;

/// Wraps a provider so that every path is fetched at most once per page
/// load, even when several directives ask for it concurrently.
#[derive(Debug)]
pub struct CachedProvider<P> {
  inner: P,
  cells: Mutex<HashMap<String, Arc<OnceCell<FetchedFile>>>>,
}

impl<P: FileProvider> CachedProvider<P> {
  pub fn new(inner: P) -> Self {
    Self {
      inner,
      cells: Mutex::new(HashMap::new()),
    }
  }

  /// The wrapped provider.
  pub const fn inner(&self) -> &P {
    &self.inner
  }

  /// Forget everything fetched so far, starting a new page load.
  pub fn clear(&self) {
    self
      .cells
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clear();
  }

  fn cell(&self, path: &str) -> Arc<OnceCell<FetchedFile>> {
    let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(cells.entry(path.to_string()).or_default())
  }
}

impl<P: FileProvider> FileProvider for CachedProvider<P> {
  async fn fetch(&self, path: &str) -> FetchedFile {
    let cell = self.cell(path);
    if let Some(file) = cell.get() {
      trace!("Cache hit for {path}");
      return file.clone();
    }
    cell.get_or_init(|| self.inner.fetch(path)).await.clone()
  }
}

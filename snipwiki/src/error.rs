use std::io;

use thiserror::Error;

/// Top-level error type for the snipwiki crate.
#[derive(Debug, Error)]
pub enum SnipwikiError {
  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Page not found: {0}")]
  NotFound(String),

  #[error("Invalid page path: {0}")]
  InvalidPath(String),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Serde error: {0}")]
  Serde(#[from] serde_json::Error),

  #[error("TOML error: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("TOML serialization error: {0}")]
  TomlSerialize(#[from] toml::ser::Error),

  #[error("Directory walk error: {0}")]
  Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, SnipwikiError>;

use std::{
  fs,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use snipwiki_commonmark::{
  MarkdownOptions,
  ReplacerRule,
  processor::DEFAULT_SMART_QUOTES,
};

use crate::error::{Result, SnipwikiError};

/// File names looked up in the working directory when no configuration file
/// is given on the command line.
pub const CONFIG_FILENAMES: [&str; 4] = [
  "snipwiki.toml",
  "snipwiki.json",
  ".config/snipwiki.toml",
  ".config/snipwiki.json",
];

/// Localized strings shown to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
  /// Label in front of the footnotes list.
  pub footnotes:      String,
  /// Heading for documents without tags on category pages.
  pub untagged:       String,
  pub searching:      String,
  pub search_nothing: String,
  /// `{count}` and `{total}` are replaced with the hit and document counts.
  pub search_done:    String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      footnotes:      "Footnotes".to_string(),
      untagged:       "Untagged".to_string(),
      searching:      "Searching...".to_string(),
      search_nothing: "Nothing found.".to_string(),
      search_done:    "Found {count} of {total} documents.".to_string(),
    }
  }
}

/// Configuration for snipwiki.
///
/// Loaded from a TOML or JSON file; every field has a default so a file only
/// needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Directory holding the Markdown documents.
  pub input_dir:      PathBuf,
  /// Directory rendered pages are written to.
  pub output_dir:     PathBuf,
  /// Deployment base path prefixed to site-relative links and images.
  pub base_path:      String,
  /// Path of the home document.
  pub home_path:      String,
  /// Replacement quote characters; fewer than four disables smart quotes.
  pub smart_quotes:   String,
  /// Ordered `[pattern, replacement]` text rules.
  pub replacer:       Vec<(String, String)>,
  /// strftime pattern for update dates.
  pub date_format:    String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default_author: Option<String>,
  pub messages:       Messages,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      input_dir:      PathBuf::from("docs"),
      output_dir:     PathBuf::from("build"),
      base_path:      "/".to_string(),
      home_path:      "/index.md".to_string(),
      smart_quotes:   DEFAULT_SMART_QUOTES.to_string(),
      replacer:       Vec::new(),
      date_format:    "%Y-%m-%d".to_string(),
      default_author: None,
      messages:       Messages::default(),
    }
  }
}

impl Config {
  /// Load configuration from a file (TOML or JSON).
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
      SnipwikiError::Config(format!(
        "Failed to read config file: {}: {e}",
        path.display()
      ))
    })?;

    let extension = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_lowercase);
    match extension.as_deref() {
      Some("json") => {
        serde_json::from_str(&content).map_err(|e| {
          SnipwikiError::Config(format!(
            "Failed to parse JSON config from {}: {e}",
            path.display()
          ))
        })
      },
      Some("toml") => {
        toml::from_str(&content).map_err(|e| {
          SnipwikiError::Config(format!(
            "Failed to parse TOML config from {}: {e}",
            path.display()
          ))
        })
      },
      _ => {
        Err(SnipwikiError::Config(format!(
          "Unsupported config file format: {}",
          path.display()
        )))
      },
    }
  }

  /// Load the given files in order, or the first discovered file in `dir`,
  /// or the defaults.
  ///
  /// # Errors
  ///
  /// Returns an error if any configuration file cannot be loaded.
  pub fn load(config_files: &[PathBuf], dir: &Path) -> Result<Self> {
    if let Some((first, rest)) = config_files.split_first() {
      let mut config = Self::from_file(first)?;
      for path in rest {
        config.merge(Self::from_file(path)?);
      }
      if !rest.is_empty() {
        log::info!("Loaded and merged {} config files", config_files.len());
      }
      return Ok(config);
    }

    match Self::find_config_file(dir) {
      Some(path) => {
        log::info!("Using discovered config file: {}", path.display());
        Self::from_file(&path)
      },
      None => {
        log::debug!("No config file found, using defaults");
        Ok(Self::default())
      },
    }
  }

  /// Search `dir` for one of [`CONFIG_FILENAMES`].
  #[must_use]
  pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
      .iter()
      .map(|name| dir.join(name))
      .find(|path| path.is_file())
  }

  /// Merge another config into this one.
  ///
  /// Fields the other config leaves at their default keep this config's
  /// value; replacer rules are appended.
  pub fn merge(&mut self, other: Self) {
    let defaults = Self::default();
    macro_rules! take {
      ($($field:ident),*) => {
        $(
          if other.$field != defaults.$field {
            self.$field = other.$field;
          }
        )*
      };
    }
    take!(
      input_dir,
      output_dir,
      base_path,
      home_path,
      smart_quotes,
      date_format,
      default_author,
      messages
    );
    self.replacer.extend(other.replacer);
  }

  /// Apply command line overrides.
  pub fn merge_with_cli(
    &mut self,
    input_dir: Option<&Path>,
    output_dir: Option<&Path>,
  ) {
    if let Some(input_dir) = input_dir {
      self.input_dir = input_dir.to_path_buf();
    }
    if let Some(output_dir) = output_dir {
      self.output_dir = output_dir.to_path_buf();
    }
  }

  /// Rendering options for the Markdown processor. Replacer rules with
  /// invalid patterns are logged and left out.
  #[must_use]
  pub fn markdown_options(&self) -> MarkdownOptions {
    MarkdownOptions {
      smart_quotes: self.smart_quotes.clone(),
      replacers: ReplacerRule::compile_all(&self.replacer),
      base_path: self.base_path.clone(),
      home_path: self.home_path.clone(),
      footnotes_label: self.messages.footnotes.clone(),
      ..MarkdownOptions::default()
    }
  }

  /// Serialize the default configuration as `toml` or `json`.
  ///
  /// # Errors
  ///
  /// Returns an error for an unknown format or a serialization failure.
  pub fn default_config_text(format: &str) -> Result<String> {
    let config = Self::default();
    match format {
      "toml" => Ok(toml::to_string_pretty(&config)?),
      "json" => Ok(serde_json::to_string_pretty(&config)?),
      other => {
        Err(SnipwikiError::Config(format!(
          "Unsupported config format: {other}"
        )))
      },
    }
  }

  /// Write the default configuration to `path`.
  ///
  /// # Errors
  ///
  /// Returns an error if the configuration cannot be serialized or written.
  pub fn generate_default_config(format: &str, path: &Path) -> Result<()> {
    let content = Self::default_config_text(format)?;
    fs::write(path, content).map_err(|e| {
      SnipwikiError::Config(format!(
        "Failed to write default config to {}: {e}",
        path.display()
      ))
    })?;
    log::info!("Created default configuration file: {}", path.display());
    Ok(())
  }
}

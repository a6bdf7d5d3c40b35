use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line interface for snipwiki
#[derive(Parser, Debug)]
#[command(author, version, about = "snipwiki: a wiki built from snippets")]
pub struct Cli {
  /// Subcommand to execute (see [`Commands`])
  #[command(subcommand)]
  pub command: Commands,

  /// Enable verbose debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Path to configuration file(s) (TOML or JSON, can be specified multiple
  /// times). Later files override earlier ones.
  #[arg(
    short = 'c',
    long = "config-file",
    global = true,
    action = clap::ArgAction::Append
  )]
  pub config_files: Vec<PathBuf>,
}

/// All supported subcommands for the snipwiki CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Initialize a new snipwiki configuration file
  Init {
    /// Path to create the configuration file at
    #[arg(short, long, default_value = "snipwiki.toml")]
    output: PathBuf,

    /// Format of the configuration file.
    #[arg(short = 'F', long, default_value = "toml", value_parser = ["toml", "json"])]
    format: String,

    /// Force overwrite if file already exists
    #[arg(short, long)]
    force: bool,
  },

  /// Render one page to an HTML fragment.
  Render {
    /// Page path relative to the input directory, e.g. `notes/rust.md`.
    page: String,

    /// Output file. Prints to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Render every page of the input directory.
  Build {
    /// Path to the directory containing markdown files.
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Output directory for rendered pages.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
  },

  /// Search all documents.
  Search {
    /// Text to look for, or `@tags: some/tag`.
    query: String,

    /// Print hits as JSON.
    #[arg(long)]
    json: bool,
  },
}

impl Cli {
  /// Parse command line arguments into a [`Cli`] struct.
  #[must_use]
  pub fn parse_args() -> Self {
    Self::parse()
  }
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn global_flags_after_subcommand() {
    let cli = Cli::parse_from([
      "snipwiki",
      "search",
      "@tags: rust",
      "--json",
      "-v",
      "-c",
      "a.toml",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.config_files, vec![PathBuf::from("a.toml")]);
    match cli.command {
      Commands::Search { query, json } => {
        assert_eq!(query, "@tags: rust");
        assert!(json);
      },
      other => panic!("unexpected command: {other:?}"),
    }
  }
}

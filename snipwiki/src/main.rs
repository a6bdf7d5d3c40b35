use std::{
  fs,
  io::{self, Write},
  path::Path,
};

use color_eyre::eyre::{Context, Result, bail};
use log::{LevelFilter, info};
use snipwiki::{
  cli::{Cli, Commands},
  config::Config,
  site::Site,
};

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse_args();

  env_logger::Builder::new()
    .filter_level(if cli.verbose {
      LevelFilter::Debug
    } else {
      LevelFilter::Info
    })
    .write_style(env_logger::WriteStyle::Always)
    .init();

  if let Commands::Init {
    output,
    format,
    force,
  } = &cli.command
  {
    return init(output, format, *force);
  }

  let mut config = Config::load(&cli.config_files, Path::new("."))
    .wrap_err("Failed to load configuration")?;

  match cli.command {
    Commands::Init { .. } => Ok(()),

    Commands::Render { page, output } => {
      let site = Site::new(config);
      let html = site
        .render_page(&page)
        .await
        .wrap_err_with(|| format!("Failed to render page: {page}"))?;
      match output {
        Some(path) => {
          fs::write(&path, html).wrap_err_with(|| {
            format!("Failed to write output file: {}", path.display())
          })?;
          info!("Wrote {}", path.display());
        },
        None => io::stdout().lock().write_all(html.as_bytes())?,
      }
      Ok(())
    },

    Commands::Build {
      input_dir,
      output_dir,
    } => {
      config.merge_with_cli(input_dir.as_deref(), output_dir.as_deref());
      if !config.input_dir.is_dir() {
        bail!(
          "Input directory does not exist: {}",
          config.input_dir.display()
        );
      }
      let site = Site::new(config);
      let count = site.build().await.wrap_err("Failed to build site")?;
      info!("Built {count} pages");
      Ok(())
    },

    Commands::Search { query, json } => {
      let site = Site::new(config);
      info!("{}", site.config().messages.searching);
      let hits = site
        .search(&query)
        .await
        .wrap_err_with(|| format!("Search failed: {query}"))?;
      let total = site.documents().await?.len();
      let mut stdout = io::stdout().lock();

      if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&hits)?)?;
        return Ok(());
      }

      let messages = &site.config().messages;
      if hits.is_empty() {
        writeln!(stdout, "{}", messages.search_nothing)?;
        return Ok(());
      }
      for hit in &hits {
        writeln!(stdout, "{} ({})", hit.title, hit.path)?;
        if !hit.tags.is_empty() {
          writeln!(stdout, "  tags: {}", hit.tags.join(", "))?;
        }
        if let Some(excerpt) = &hit.excerpt {
          writeln!(stdout, "  {excerpt}")?;
        }
      }
      writeln!(
        stdout,
        "{}",
        messages
          .search_done
          .replace("{count}", &hits.len().to_string())
          .replace("{total}", &total.to_string())
      )?;
      Ok(())
    },
  }
}

fn init(output: &Path, format: &str, force: bool) -> Result<()> {
  if output.exists() && !force {
    bail!(
      "Configuration file already exists: {}. Use --force to overwrite.",
      output.display()
    );
  }

  if let Some(parent) = output.parent() {
    if !parent.as_os_str().is_empty() && !parent.exists() {
      fs::create_dir_all(parent).wrap_err_with(|| {
        format!("Failed to create directory: {}", parent.display())
      })?;
      info!("Created directory: {}", parent.display());
    }
  }

  Config::generate_default_config(format, output).wrap_err_with(|| {
    format!("Failed to generate configuration file: {}", output.display())
  })?;
  info!("Configuration file created. Edit it to customize your wiki.");
  Ok(())
}

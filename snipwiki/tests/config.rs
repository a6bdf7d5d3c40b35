use std::{fs, path::PathBuf};

use snipwiki::{config::Config, error::SnipwikiError};
use tempfile::TempDir;

#[test]
fn test_generate_and_reload_default_config() {
  let dir = TempDir::new().unwrap();
  for format in ["toml", "json"] {
    let path = dir.path().join(format!("snipwiki.{format}"));
    Config::generate_default_config(format, &path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, Config::default(), "format {format}");
  }
}

#[test]
fn test_unknown_extension_is_rejected() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("snipwiki.yaml");
  fs::write(&path, "base_path: /").unwrap();
  assert!(matches!(
    Config::from_file(&path),
    Err(SnipwikiError::Config(_))
  ));
  assert!(Config::default_config_text("yaml").is_err());
}

#[test]
fn test_discovery_order() {
  let dir = TempDir::new().unwrap();
  assert_eq!(Config::find_config_file(dir.path()), None);
  assert_eq!(Config::load(&[], dir.path()).unwrap(), Config::default());

  fs::create_dir(dir.path().join(".config")).unwrap();
  fs::write(
    dir.path().join(".config/snipwiki.toml"),
    "output_dir = \"site\"\n",
  )
  .unwrap();
  let config = Config::load(&[], dir.path()).unwrap();
  assert_eq!(config.output_dir, PathBuf::from("site"));

  fs::write(dir.path().join("snipwiki.json"), "{\"base_path\": \"/w/\"}")
    .unwrap();
  assert_eq!(
    Config::find_config_file(dir.path()),
    Some(dir.path().join("snipwiki.json"))
  );
  let config = Config::load(&[], dir.path()).unwrap();
  assert_eq!(config.base_path, "/w/");
  assert_eq!(config.output_dir, PathBuf::from("build"));
}

#[test]
fn test_later_files_override_earlier_ones() {
  let dir = TempDir::new().unwrap();
  let first = dir.path().join("a.toml");
  let second = dir.path().join("b.json");
  fs::write(
    &first,
    "base_path = \"/wiki/\"\ndate_format = \"%d.%m.%Y\"\nreplacer = [[\"a\", \
     \"b\"]]\n",
  )
  .unwrap();
  fs::write(
    &second,
    "{\"date_format\": \"%Y\", \"replacer\": [[\"c\", \"d\"]], \"messages\": \
     {\"untagged\": \"Other\"}}",
  )
  .unwrap();

  let config = Config::load(&[first, second], dir.path()).unwrap();
  assert_eq!(config.base_path, "/wiki/");
  assert_eq!(config.date_format, "%Y");
  assert_eq!(config.replacer.len(), 2);
  assert_eq!(config.messages.untagged, "Other");
  assert_eq!(config.messages.footnotes, "Footnotes");
}

#[test]
fn test_cli_overrides() {
  let mut config = Config::default();
  config.merge_with_cli(Some(PathBuf::from("in").as_path()), None);
  assert_eq!(config.input_dir, PathBuf::from("in"));
  assert_eq!(config.output_dir, PathBuf::from("build"));
}

//! Configuration loading.
//!
//! Priority (highest first):
//! 1. CLI arguments
//! 2. TOML config file (`--config`, or `<config_dir>/taskgrid/config.toml`)
//! 3. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config` path
//! that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use tracing::warn;

use crate::cli::Cli;
use crate::db::DEFAULT_TIMESTAMP_FORMAT;
use crate::storage::SNAPSHOT_FILE;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Top-level TOML file structure. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageFileConfig,
    ui: UiFileConfig,
}

/// `[storage]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_dir: Option<PathBuf>,
}

/// `[ui]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
    poll_timeout_ms: Option<u64>,
    confirm_delete: Option<bool>,
}

/// Settings the TUI needs.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSettings {
    /// chrono format string for created/deadline timestamps.
    pub timestamp_format: String,
    /// How long to wait for a key before redrawing. Redraws keep expiry markers current.
    pub poll_timeout: Duration,
    /// Ask before deleting.
    pub confirm_delete: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            poll_timeout: Duration::from_millis(250),
            confirm_delete: true,
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Snapshot file.
    pub db_path: PathBuf,
    pub ui: UiSettings,
}

impl Config {
    /// Load configuration by merging CLI args with the TOML file.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Like [`Config::load`], but a broken default config file only costs a warning.
    /// An explicit `--config` path must exist and parse.
    pub fn load_or_defaults(cli: &Cli) -> Result<Self, ConfigError> {
        match Self::load(cli) {
            Ok(config) => Ok(config),
            Err(e) if cli.config.is_some() => Err(e),
            Err(e) => {
                warn!(error = %e, "config load failed, using defaults");
                eprintln!("Warning: {e}; using defaults");
                Ok(Self::defaults(cli))
            }
        }
    }

    /// CLI args over compiled defaults, ignoring any config file.
    pub fn defaults(cli: &Cli) -> Self {
        Self::resolve(cli, &ConfigFile::default())
    }

    fn resolve(cli: &Cli, file: &ConfigFile) -> Self {
        let defaults = UiSettings::default();
        let db_path = cli.db.clone().unwrap_or_else(|| {
            file.storage
                .data_dir
                .clone()
                .unwrap_or_else(default_data_dir)
                .join(SNAPSHOT_FILE)
        });

        Self {
            db_path,
            ui: UiSettings {
                timestamp_format: cli
                    .timestamp_format
                    .clone()
                    .or_else(|| file.ui.timestamp_format.clone())
                    .filter(|fmt| {
                        let valid = is_valid_timestamp_format(fmt);
                        if !valid {
                            warn!(format = %fmt, "invalid timestamp format, using default");
                        }
                        valid
                    })
                    .unwrap_or(defaults.timestamp_format),
                poll_timeout: file
                    .ui
                    .poll_timeout_ms
                    .map_or(defaults.poll_timeout, Duration::from_millis),
                confirm_delete: file.ui.confirm_delete.unwrap_or(defaults.confirm_delete),
            },
        }
    }
}

/// True when chrono knows every specifier in `fmt`. Unknown ones make formatting panic.
fn is_valid_timestamp_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

/// `<data_dir>/taskgrid`, falling back to `~/.taskgrid` and then the working directory.
fn default_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("taskgrid");
    }
    dirs::home_dir()
        .map(|home| home.join(".taskgrid"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskgrid").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("tg").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::defaults(&cli(&[]));
        assert_eq!(config.ui, UiSettings::default());
        assert!(config.db_path.ends_with(SNAPSHOT_FILE));
    }

    #[test]
    fn file_values_override_defaults() {
        let file: ConfigFile = toml::from_str(
            r#"
            [storage]
            data_dir = "/tmp/tg-data"

            [ui]
            timestamp_format = "%d/%m %H:%M"
            poll_timeout_ms = 1000
            confirm_delete = false
            "#,
        )
        .unwrap();
        let config = Config::resolve(&cli(&[]), &file);
        assert_eq!(config.db_path, PathBuf::from("/tmp/tg-data").join(SNAPSHOT_FILE));
        assert_eq!(config.ui.timestamp_format, "%d/%m %H:%M");
        assert_eq!(config.ui.poll_timeout, Duration::from_secs(1));
        assert!(!config.ui.confirm_delete);
    }

    #[test]
    fn cli_overrides_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [storage]
            data_dir = "/tmp/tg-data"
            [ui]
            timestamp_format = "%d/%m"
            "#,
        )
        .unwrap();
        let config = Config::resolve(
            &cli(&["--db", "/tmp/other.json", "--timestamp-format", "%H:%M"]),
            &file,
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.json"));
        assert_eq!(config.ui.timestamp_format, "%H:%M");
    }

    #[test]
    fn invalid_timestamp_format_falls_back_to_default() {
        let file: ConfigFile = toml::from_str("[ui]\ntimestamp_format = \"%Q\"\n").unwrap();
        let config = Config::resolve(&cli(&[]), &file);
        assert_eq!(config.ui.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);

        let config = Config::resolve(&cli(&["--timestamp-format", "%H:%Q"]), &ConfigFile::default());
        assert_eq!(config.ui.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);

        // The fallback output renders without panicking.
        let rendered = crate::db::format_local(chrono::Utc::now(), &config.ui.timestamp_format);
        assert!(!rendered.is_empty());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config_file(Some(&missing)),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn explicit_missing_config_stops_startup() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let args = cli(&["--config", missing.to_str().unwrap()]);
        assert!(matches!(
            Config::load_or_defaults(&args),
            Err(ConfigError::ReadFile { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[ui\n").unwrap();
        let args = cli(&["--config", broken.to_str().unwrap()]);
        assert!(matches!(
            Config::load_or_defaults(&args),
            Err(ConfigError::ParseToml(_))
        ));
    }

    #[test]
    fn partial_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ui]\nconfirm_delete = false\n").unwrap();
        let file = load_config_file(Some(&path)).unwrap();
        assert_eq!(file.ui.confirm_delete, Some(false));
        assert!(file.storage.data_dir.is_none());
    }
}

//! The zk command line's own settings, kept in `config.toml`.
//!
//! Holds which store to open, which editor runs `zk edit`, and the note the
//! user last moved to. A missing or unparsable file means "all unset"; only
//! writing it back can fail.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;

const CONFIG_FILENAME: &str = "config.toml";
const FALLBACK_EDITOR: &str = "vi";

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub store_root: Option<String>,
    pub editor: Option<String>,
    /// Note that `show`, `print`, `ls` and friends act on when given no id.
    pub current_note: Option<u64>,
}

fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Reads `config.toml`, treating a missing or broken file as empty settings.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(s) => parse_config(&s),
        Err(_) => Config::default(),
    }
}

fn parse_config(s: &str) -> Config {
    toml::from_str(s).unwrap_or_else(|err| {
        log::warn!("ignoring invalid config: {err}");
        Config::default()
    })
}

/// Overwrites `config.toml` with `config`.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(&path, s).map_err(ConfigError::Write)
}

/// Store to open when `--root` is not given: the remembered one, else `~/zk`.
pub fn get_store_root() -> Option<PathBuf> {
    load_config()
        .store_root
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(app_data::default_store_root)
}

/// Remembers `path` (made absolute) as the store to open.
///
/// The current note belonged to the previous store, so it goes back to the
/// top-level note.
pub fn set_store_root(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config();
    config.store_root = Some(path.to_string_lossy().into_owned());
    config.current_note = None;
    save_config(&config)
}

/// The note the user last moved to, if any. May name a note that no longer exists.
pub fn get_current_note() -> Option<u64> {
    load_config().current_note
}

/// Records `id` as the current note.
pub fn set_current_note(id: u64) -> Result<(), ConfigError> {
    let mut config = load_config();
    config.current_note = Some(id);
    save_config(&config)
}

/// Program `zk edit` launches: config, then `$EDITOR`, then `vi`.
pub fn get_editor() -> String {
    resolve_editor(load_config().editor, std::env::var("EDITOR").ok())
}

fn resolve_editor(configured: Option<String>, env: Option<String>) -> String {
    configured
        .into_iter()
        .chain(env)
        .find(|e| !e.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

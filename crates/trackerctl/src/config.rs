//! CLI configuration: where the tracker database lives.
//!
//! Resolution order: `--db` flag, `STATTRACK_DB`, the config file at
//! `~/.config/stattrack/config.toml`, then the default data directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the SQLite database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stattrack")
        .join("tracker.db")
}

fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stattrack").join("config.toml"))
}

/// Load the config file, falling back to defaults when it is absent.
pub fn load() -> Result<Config> {
    let Some(path) = config_file() else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Final database path after applying every override.
pub fn database_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("STATTRACK_DB") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(load()?.db_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_everything() {
        let path = database_path(Some(PathBuf::from("/tmp/explicit.db"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
    }

    #[test]
    fn config_parses_db_path() {
        let config: Config = toml::from_str("db_path = \"/var/lib/stattrack/tracker.db\"").unwrap();
        assert_eq!(
            config.db_path,
            PathBuf::from("/var/lib/stattrack/tracker.db")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.db_path.ends_with("stattrack/tracker.db"));
    }
}

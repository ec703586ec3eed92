//! Configuration management for eastward CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the container holding the metadata documents
pub const CONFIG_CONTAINER: &str = "config.g";

#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the game's .g containers
    pub game_dir: Option<PathBuf>,
    /// Loose-file root for the virtual file system
    pub fallback_root: Option<PathBuf>,
    /// Default extraction output directory
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("eastward");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    /// Metadata source: the explicit path, else `config.g` in the game dir
    pub fn metadata_source(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        explicit
            .or_else(|| self.game_dir.as_ref().map(|dir| dir.join(CONFIG_CONTAINER)))
            .context("No metadata given; pass --metadata or run `eastward configure --game-dir`")
    }

    /// Container sources: the explicit paths, else the game dir
    pub fn archive_sources(&self, explicit: Vec<PathBuf>) -> Vec<PathBuf> {
        if explicit.is_empty() {
            self.game_dir.iter().cloned().collect()
        } else {
            explicit
        }
    }

    pub fn fallback_root(&self, explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| self.fallback_root.clone())
    }

    pub fn output_dir(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("extracted"))
    }
}

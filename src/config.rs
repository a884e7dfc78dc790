//! Engine configuration.
//!
//! Loaded from `<config_dir>/grimoire/config.json`, then overridden by
//! environment variables:
//! - `GRIMOIRE_CACHE_PATH` - cache database file
//! - `GRIMOIRE_DATA_DIR` - directory of dataset JSON files (instead of the embedded ones)
//! - `GRIMOIRE_OFFLOAD_THRESHOLD` - collection size at which recomputes move to a worker

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::store::StoreOptions;

const APP_NAME: &str = "grimoire";
const CONFIG_FILE: &str = "config.json";

/// Default collection size at which filtering is offloaded to a worker.
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache database file. Defaults to the platform cache directory.
    pub cache_path: Option<PathBuf>,
    /// Directory holding `<dataset>.json` files. Defaults to the embedded datasets.
    pub data_dir: Option<PathBuf>,
    /// Collections at least this large are filtered on a worker thread.
    pub offload_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            data_dir: None,
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the user's config directory and the environment.
    /// Returns defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        let config = match Self::load_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Read the config file alone, without environment overrides. A missing
    /// file yields the defaults.
    pub fn load_file() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = var("GRIMOIRE_CACHE_PATH").filter(|s| !s.is_empty()) {
            self.cache_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = var("GRIMOIRE_DATA_DIR").filter(|s| !s.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = var("GRIMOIRE_OFFLOAD_THRESHOLD") {
            match raw.trim().parse::<usize>() {
                Ok(threshold) => self.offload_threshold = threshold,
                Err(_) => {
                    tracing::warn!(value = %raw, "Ignoring invalid GRIMOIRE_OFFLOAD_THRESHOLD")
                }
            }
        }
        self
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            offload_threshold: self.offload_threshold,
        }
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let config = EngineConfig::default().with_env_overrides(lookup(&[
            ("GRIMOIRE_CACHE_PATH", "/tmp/g.db"),
            ("GRIMOIRE_DATA_DIR", "/srv/data"),
            ("GRIMOIRE_OFFLOAD_THRESHOLD", "0"),
        ]));
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/g.db")));
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/data")));
        assert_eq!(config.offload_threshold, 0);
        assert_eq!(config.store_options().offload_threshold, 0);
    }

    #[test]
    fn test_invalid_threshold_is_ignored() {
        let config = EngineConfig::default()
            .with_env_overrides(lookup(&[("GRIMOIRE_OFFLOAD_THRESHOLD", "lots")]));
        assert_eq!(config.offload_threshold, DEFAULT_OFFLOAD_THRESHOLD);
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"data_dir": "/srv/data"}"#).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/data")));
        assert_eq!(config.cache_path, None);
        assert_eq!(config.offload_threshold, DEFAULT_OFFLOAD_THRESHOLD);
    }
}

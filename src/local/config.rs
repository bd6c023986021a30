//! Local configuration management.
//!
//! Config is stored at `~/.config/slotvault/config.toml` and contains:
//! - store call timeout and pool size
//! - slot term used for new allocations
//! - read retry policy
//! - extra platform aliases layered over the built-in table

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{AliasTable, PURCHASE_TERM_DAYS};

const CONFIG_DIR: &str = "slotvault";
const CONFIG_FILE: &str = "config.toml";

/// Local configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Upper bound for a single store call (default: 10s).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// SQLite pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Days an allocated slot stays assigned (default: 30).
    #[serde(default = "default_slot_term_days")]
    pub slot_term_days: i64,

    /// Retries for read-only operations on transient failures (default: 3).
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// Base backoff between read retries, doubled each attempt (default: 100ms).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Extra `alias = "Canonical"` pairs.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    4
}

fn default_slot_term_days() -> i64 {
    PURCHASE_TERM_DAYS
}

fn default_read_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_connections: default_max_connections(),
            slot_term_days: default_slot_term_days(),
            read_retries: default_read_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            aliases: BTreeMap::new(),
        }
    }
}

impl VaultConfig {
    /// Load config from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;

        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&path, content).context("Failed to write config file")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn slot_term(&self) -> chrono::Duration {
        chrono::Duration::days(self.slot_term_days.max(1))
    }

    /// Built-in aliases with the configured ones layered on top.
    pub fn alias_table(&self) -> AliasTable {
        AliasTable::builtin().with_aliases(&self.aliases)
    }

    /// Add or replace an alias.
    pub fn set_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.trim().to_lowercase(), canonical.trim().to_string());
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.slot_term(), chrono::Duration::days(30));
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: VaultConfig = toml::from_str("slot_term_days = 60").unwrap();
        assert_eq!(parsed.slot_term_days, 60);
        assert_eq!(parsed.request_timeout_secs, 10);
        assert_eq!(parsed.read_retries, 3);
    }

    #[test]
    fn test_aliases_feed_alias_table() {
        let mut config = VaultConfig::default();
        config.set_alias("  Star Plus ", "Disney+");

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: VaultConfig = toml::from_str(&toml_str).unwrap();

        let table = parsed.alias_table();
        assert_eq!(table.canonicalize("STAR PLUS").as_str(), "Disney+");
        assert_eq!(table.canonicalize("amazon prime").as_str(), "Prime");
    }
}

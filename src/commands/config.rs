//! Config command - manage local configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::local::VaultConfig;

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub command: ConfigSubCmd,
}

#[derive(Subcommand)]
pub enum ConfigSubCmd {
    /// Set the store call timeout in seconds (default: 10)
    SetTimeout(SetTimeoutCmd),

    /// Set the number of days an allocated slot is held (default: 30)
    SetTerm(SetTermCmd),

    /// Map an extra platform alias onto a canonical name
    SetAlias(SetAliasCmd),

    /// Show current configuration
    Show,
}

#[derive(Args)]
pub struct SetTimeoutCmd {
    pub secs: u64,
}

#[derive(Args)]
pub struct SetTermCmd {
    pub days: i64,
}

#[derive(Args)]
pub struct SetAliasCmd {
    /// Alias as typed by users (e.g. "star plus")
    pub alias: String,

    /// Canonical platform name (e.g. "Disney+")
    pub canonical: String,
}

impl ConfigCmd {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            ConfigSubCmd::SetTimeout(cmd) => {
                if cmd.secs == 0 {
                    anyhow::bail!("Timeout must be at least 1 second");
                }
                let mut config = VaultConfig::load()?;
                config.request_timeout_secs = cmd.secs;
                config.save()?;
                println!("Request timeout set to: {}s", cmd.secs);
            }
            ConfigSubCmd::SetTerm(cmd) => {
                if cmd.days <= 0 {
                    anyhow::bail!("Term must be at least 1 day");
                }
                let mut config = VaultConfig::load()?;
                config.slot_term_days = cmd.days;
                config.save()?;
                println!("Slot term set to: {} days", cmd.days);
            }
            ConfigSubCmd::SetAlias(cmd) => {
                let mut config = VaultConfig::load()?;
                config.set_alias(&cmd.alias, &cmd.canonical);
                config.save()?;
                let resolved = config.alias_table().canonicalize(&cmd.alias);
                println!("{} -> {}", cmd.alias.trim(), resolved);
            }
            ConfigSubCmd::Show => {
                let config = VaultConfig::load()?;
                println!("Config: {}", VaultConfig::config_path()?.display());
                println!();
                println!("request_timeout:  {}s", config.request_timeout_secs);
                println!("max_connections:  {}", config.max_connections);
                println!("slot_term:        {} days", config.slot_term_days);
                println!(
                    "read_retries:     {} (backoff {}ms)",
                    config.read_retries, config.retry_backoff_ms
                );
                if !config.aliases.is_empty() {
                    println!("aliases:");
                    for (alias, canonical) in &config.aliases {
                        println!("  {} -> {}", alias, canonical);
                    }
                }
            }
        }
        Ok(())
    }
}

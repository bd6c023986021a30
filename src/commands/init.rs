//! Init command - create the local store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::engine::SlotService;
use crate::local::{self, VaultConfig};

#[derive(Args)]
pub struct InitCmd {
    /// Directory to create the store in (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

impl InitCmd {
    pub async fn run(&self) -> Result<()> {
        let store_dir =
            local::get_store_dir().unwrap_or_else(|| self.path.join(local::STORE_DIR_NAME));

        if !store_dir.exists() {
            std::fs::create_dir_all(&store_dir)
                .context("Failed to create .slotvault directory")?;
            println!("Created {}", store_dir.display());
        }

        let config = VaultConfig::load()?;
        let service = SlotService::open(&store_dir, &config).await?;
        let stock = service.count_available_all().await?;

        println!("Store: {}", store_dir.join(local::DB_FILE_NAME).display());
        println!("{} platforms in stock", stock.len());

        Ok(())
    }
}

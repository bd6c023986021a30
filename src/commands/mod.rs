//! CLI command implementations.

mod account;
mod buy;
mod config;
mod customer;
mod init;
mod inventory;
mod purchases;
mod release;
mod stock;

pub use account::AccountCmd;
pub use buy::BuyCmd;
pub use config::ConfigCmd;
pub use customer::CustomerCmd;
pub use init::InitCmd;
pub use inventory::InventoryCmd;
pub use purchases::PurchasesCmd;
pub use release::ReleaseCmd;
pub use stock::StockCmd;

use anyhow::{Context, Result};

use crate::engine::SlotService;
use crate::local::{self, VaultConfig};

/// Open the service over the store found from the working directory.
async fn open_service() -> Result<SlotService> {
    let store_dir = local::get_store_dir()
        .context("No .slotvault directory found. Run `slotvault init` first.")?;
    let config = VaultConfig::load()?;

    SlotService::open(&store_dir, &config)
        .await
        .with_context(|| format!("Failed to open store at {}", store_dir.display()))
}

/// Hide all but the first character of a secret for terminal output.
fn mask(secret: &str) -> String {
    match secret.chars().next() {
        Some(first) => format!("{}{}", first, "*".repeat(secret.chars().count().saturating_sub(1))),
        None => String::new(),
    }
}

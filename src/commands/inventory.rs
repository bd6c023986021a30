//! Inventory command - accounts and slots of one platform.

use anyhow::{Context, Result};
use clap::Args;

use super::{mask, open_service};

#[derive(Args)]
pub struct InventoryCmd {
    /// Platform name (any alias works)
    pub platform: String,

    /// Show account passwords and PINs in clear
    #[arg(long)]
    pub reveal: bool,

    /// Print JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

impl InventoryCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        let inventory = service
            .get_platform(&self.platform)
            .await?
            .with_context(|| format!("Platform not found: {}", self.platform))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&inventory)?);
            return Ok(());
        }

        let secret = |s: &str| if self.reveal { s.to_string() } else { mask(s) };

        println!("{}", inventory.name);
        for account in &inventory.accounts {
            println!();
            println!("  {}  {} / {}", account.id, account.email, secret(&account.password));
            for slot in &account.slots {
                match &slot.occupancy {
                    Some(occ) => println!(
                        "    #{} pin {}  occupied by {} until {}",
                        slot.number,
                        secret(&slot.pin),
                        occ.customer,
                        occ.expires_at.format("%d/%m/%Y")
                    ),
                    None => println!("    #{} pin {}  {}", slot.number, secret(&slot.pin), slot.state()),
                }
            }
        }

        println!(
            "\n{} accounts, {} slots available",
            inventory.accounts.len(),
            inventory.available()
        );

        Ok(())
    }
}

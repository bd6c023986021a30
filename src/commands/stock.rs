//! Stock command - available slots per platform.

use anyhow::Result;
use clap::Args;

use super::open_service;
use crate::types::OFFICIAL_PLATFORMS;

#[derive(Args)]
pub struct StockCmd {
    /// Only count this platform (any alias works)
    pub platform: Option<String>,

    /// Include official platforms that have no accounts yet
    #[arg(long)]
    pub all: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl StockCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        if let Some(ref platform) = self.platform {
            let name = service.canonicalize(platform);
            let available = service.count_available(platform).await?;
            if self.json {
                println!("{}", serde_json::json!({ name.as_str(): available }));
            } else {
                println!("{}: {} available", name, available);
            }
            return Ok(());
        }

        let mut stock = service.count_available_all().await?;
        if self.all {
            for name in OFFICIAL_PLATFORMS {
                stock.entry(service.canonicalize(name)).or_insert(0);
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stock)?);
            return Ok(());
        }

        if stock.is_empty() {
            println!("No platforms yet. Add one with `slotvault account add`.");
            return Ok(());
        }

        let width = stock.keys().map(|n| n.as_str().len()).max().unwrap_or(0);
        for (name, available) in &stock {
            println!("{:<width$}  {}", name.as_str(), available, width = width);
        }
        println!("\n{} slots available", stock.values().sum::<u32>());

        Ok(())
    }
}

//! Release command - give an occupied slot back to the pool.

use anyhow::{Context, Result};
use clap::Args;

use super::open_service;
use crate::engine::ReleaseTarget;

#[derive(Args)]
pub struct ReleaseCmd {
    /// Platform name (any alias works)
    pub platform: String,

    /// Account id
    pub account_id: String,

    /// Slot number (1-6)
    #[arg(value_parser = clap::value_parser!(u8).range(1..=6))]
    pub slot: u8,

    /// Customer currently holding the slot
    #[arg(long)]
    pub customer: String,

    /// Account e-mail used to match older purchases (default: current e-mail)
    #[arg(long)]
    pub account_email: Option<String>,
}

impl ReleaseCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        let target = ReleaseTarget {
            platform: self.platform.clone(),
            account_id: self.account_id.clone(),
            account_email: self.account_email.clone(),
            slot_number: self.slot,
            customer: self.customer.clone(),
        };

        let report = service
            .release_slot(&target)
            .await
            .context("Failed to release slot")?;

        println!(
            "Released slot {} of {} ({} purchases suspended)",
            self.slot,
            self.account_id,
            report.suspended.len()
        );
        for id in &report.suspended {
            println!("  suspended {}", id);
        }
        for warning in &report.warnings {
            eprintln!("warning: {}", warning);
        }

        Ok(())
    }
}

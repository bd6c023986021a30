//! Purchases command - a customer's order history.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::open_service;
use crate::types::{Purchase, PurchaseState};

#[derive(Args)]
pub struct PurchasesCmd {
    /// Customer e-mail
    pub email: String,

    /// Print JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PurchaseView<'a> {
    #[serde(flatten)]
    purchase: &'a Purchase,
    status: PurchaseState,
}

impl PurchasesCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        let purchases = service.purchases(&self.email).await?;
        let now = service.now();
        let term = service.settings().slot_term;

        if self.json {
            let views: Vec<_> = purchases
                .iter()
                .map(|purchase| PurchaseView {
                    purchase,
                    status: purchase.status_at(now, term),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(());
        }

        if purchases.is_empty() {
            println!("No purchases for {}.", self.email);
            return Ok(());
        }

        for purchase in &purchases {
            let status = purchase.status_at(now, term);
            println!(
                "{}  {}  {:<16} {:>8}  {}",
                purchase.purchased_at.format("%d/%m/%Y"),
                purchase.code.numeric,
                purchase.platform,
                purchase.price,
                status
            );
            if let Some(credential) = purchase
                .credential
                .as_ref()
                .filter(|_| purchase.is_active_at(now, term))
            {
                println!(
                    "      {} profile {} PIN {} until {}",
                    credential.email,
                    credential.slot_number,
                    credential.pin,
                    credential.expiration_label()
                );
            }
        }

        println!("\n{} purchases", purchases.len());

        Ok(())
    }
}

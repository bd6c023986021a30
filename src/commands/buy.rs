//! Buy command - sell one slot to a customer.

use anyhow::Result;
use clap::Args;

use super::open_service;
use crate::engine::PurchaseRequest;
use crate::types::SlotError;

#[derive(Args)]
pub struct BuyCmd {
    /// Platform name (any alias works)
    pub platform: String,

    /// Customer e-mail
    #[arg(long)]
    pub customer: String,

    /// Price override (default: the customer's list price)
    #[arg(long)]
    pub price: Option<i64>,

    /// Idempotency key; repeating it returns the original purchase
    #[arg(long)]
    pub request_id: Option<String>,

    /// Print the purchase as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuyCmd {
    pub async fn run(&self) -> Result<()> {
        let service = open_service().await?;

        let request = PurchaseRequest {
            platform: self.platform.clone(),
            customer: self.customer.clone(),
            price: self.price,
            request_id: self.request_id.clone(),
        };

        let purchase = match service.buy(&request).await {
            Ok(purchase) => purchase,
            Err(SlotError::NoCapacity(platform)) => {
                println!("Sale declined: no {} slots available right now.", platform);
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = ?e, "purchase failed");
                anyhow::bail!(failure_message(&e));
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&purchase)?);
            return Ok(());
        }

        println!("Order {} ({})", purchase.code.numeric, purchase.code.hex);
        println!("Platform: {}", purchase.platform);
        println!("Price:    {}", purchase.price);
        if let Some(credential) = &purchase.credential {
            println!("Email:    {}", credential.email);
            println!("Password: {}", credential.password);
            println!("Profile:  {} (PIN {})", credential.slot_number, credential.pin);
            println!("Expires:  {}", credential.expiration_label());
        }

        Ok(())
    }
}

/// Store and internal failures are reported generically; the detail only
/// goes to the debug log.
fn failure_message(e: &SlotError) -> String {
    match e {
        SlotError::InsufficientBalance { .. } | SlotError::NotFound(_) | SlotError::InvalidInput(_) => {
            format!("Purchase declined: {}", e)
        }
        _ => "Purchase failed. Try again later.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_store_failures_are_reported_generically() {
        let store = SlotError::Persistence(sqlx::Error::Protocol(
            "UNIQUE constraint failed near 'acc@x.com' 'hunter2'".to_string(),
        ));
        let corrupt = SlotError::CorruptRow("slot pin 1234 of acc@x.com".to_string());
        let timeout = SlotError::Timeout {
            op: "record_purchase",
            after: Duration::from_millis(5),
        };

        for e in [store, corrupt, timeout] {
            assert_eq!(failure_message(&e), "Purchase failed. Try again later.");
        }
    }

    #[test]
    fn test_declines_keep_their_reason() {
        let e = SlotError::InsufficientBalance {
            balance: 1000,
            price: 15000,
        };
        assert_eq!(
            failure_message(&e),
            "Purchase declined: insufficient balance: 1000 available, 15000 required"
        );
        assert!(failure_message(&SlotError::NotFound("customer ghost@x.com".into())).contains("ghost@x.com"));
    }
}

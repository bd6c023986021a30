//! Customer accounts, balances and purchase history.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use super::SlotService;
use crate::local::models::CustomerRow;
use crate::local::queries;
use crate::types::{Customer, NewCustomer, Purchase, SlotError};

impl SlotService {
    /// Register a customer with a zero balance.
    pub async fn register_customer(&self, input: NewCustomer) -> Result<Customer, SlotError> {
        let email = input.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(SlotError::InvalidInput(format!("invalid e-mail: {:?}", input.email)));
        }
        if input.password.expose_secret().is_empty() {
            return Err(SlotError::InvalidInput("password is required".to_string()));
        }

        let id = Uuid::now_v7().to_string();
        let row = CustomerRow {
            password: hash_password(&id, input.password.expose_secret()),
            id,
            email,
            name: input.name.trim().to_string(),
            balance: 0,
            price_tier: input.tier.as_str().to_string(),
            created_at: self.now().to_rfc3339(),
        };

        self.bounded("register_customer", async {
            let mut conn = self.db.acquire().await?;
            match queries::insert_customer(&mut conn, &row).await {
                Err(e) if e.is_unique_violation() => {
                    return Err(SlotError::DuplicateEmail {
                        scope: "customers".to_string(),
                        email: row.email.clone(),
                    });
                }
                other => other?,
            }
            info!(customer = %row.email, tier = %row.price_tier, "registered customer");
            Customer::try_from(row.clone())
        })
        .await
    }

    /// Add funds to a customer's balance, returning the new balance.
    pub async fn credit_balance(&self, email: &str, amount: i64) -> Result<i64, SlotError> {
        if amount <= 0 {
            return Err(SlotError::InvalidInput(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        self.bounded("credit_balance", async {
            let mut conn = self.db.acquire().await?;
            let balance = queries::credit_balance(&mut conn, email, amount)
                .await?
                .ok_or_else(|| SlotError::NotFound(format!("customer {}", email)))?;
            info!(customer = %email, amount, balance, "credited balance");
            Ok(balance)
        })
        .await
    }

    /// Look up a customer by e-mail.
    pub async fn customer(&self, email: &str) -> Result<Customer, SlotError> {
        self.read_with_retry("customer", || async {
            let mut conn = self.db.acquire().await?;
            queries::find_customer(&mut conn, email).await
        })
        .await?
        .ok_or_else(|| SlotError::NotFound(format!("customer {}", email)))
        .and_then(Customer::try_from)
    }

    /// A customer's purchases, newest first.
    pub async fn purchases(&self, email: &str) -> Result<Vec<Purchase>, SlotError> {
        let rows = self
            .read_with_retry("purchases", || async {
                let mut conn = self.db.acquire().await?;
                queries::purchases_for_customer(&mut conn, email).await
            })
            .await?;

        rows.into_iter().map(Purchase::try_from).collect()
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::engine::testing::{customer, service};
    use crate::types::PriceTier;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let created = svc
            .register_customer(customer("Buyer@x.com", PriceTier::Wholesale))
            .await
            .unwrap();
        assert_eq!(created.balance, 0);

        let found = svc.customer("buyer@X.com").await.unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, "Buyer@x.com");
        assert_eq!(found.tier, PriceTier::Wholesale);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        svc.register_customer(customer("buyer@x.com", PriceTier::Retail))
            .await
            .unwrap();
        let err = svc
            .register_customer(customer("BUYER@x.com", PriceTier::Retail))
            .await
            .unwrap_err();
        assert!(matches!(err, SlotError::DuplicateEmail { .. }));
    }

    #[tokio::test]
    async fn test_credit_balance() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        svc.register_customer(customer("buyer@x.com", PriceTier::Retail))
            .await
            .unwrap();
        assert_eq!(svc.credit_balance("buyer@x.com", 5000).await.unwrap(), 5000);
        assert_eq!(svc.credit_balance("BUYER@x.com", 2500).await.unwrap(), 7500);

        assert!(matches!(
            svc.credit_balance("buyer@x.com", 0).await,
            Err(SlotError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.credit_balance("ghost@x.com", 100).await,
            Err(SlotError::NotFound(_))
        ));
    }

    #[test]
    fn test_hash_password_is_salted() {
        assert_ne!(hash_password("a", "pw"), hash_password("b", "pw"));
        assert_eq!(hash_password("a", "pw").len(), 64);
    }
}

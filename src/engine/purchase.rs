//! Purchase flow.
//!
//! A purchase spans two store steps:
//! 1. Allocate a slot for the customer
//! 2. Debit the balance and record the purchase in one transaction
//!
//! The slot is claimed under the purchase id. If step 2 fails the slot is
//! returned unless a purchase with that id was recorded, so a customer is
//! never holding a slot they did not pay for, and a paid slot is never taken
//! back because the commit outran its timeout.

use tracing::{info, warn};
use uuid::Uuid;

use super::SlotService;
use crate::local::models::CreatePurchase;
use crate::local::queries;
use super::COMPENSATION_TIMEOUT;
use crate::types::{
    Customer, Purchase, PurchaseCode, PurchaseState, SlotError, default_price, masked_customer,
};

/// A request to buy one slot.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub platform: String,
    pub customer: String,
    /// Overrides the customer's list price.
    pub price: Option<i64>,
    /// Client-chosen key; repeating it returns the original purchase.
    pub request_id: Option<String>,
}

impl PurchaseRequest {
    pub fn new(platform: impl Into<String>, customer: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            customer: customer.into(),
            price: None,
            request_id: None,
        }
    }

    fn request_id(&self) -> Option<&str> {
        self.request_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

impl SlotService {
    /// Buy a slot: allocate, charge and record, or leave nothing behind.
    pub async fn buy(&self, request: &PurchaseRequest) -> Result<Purchase, SlotError> {
        let customer = self.customer(&request.customer).await?;
        let request_id = request.request_id();

        if let Some(request_id) = request_id {
            if let Some(existing) = self.purchase_for_request(&customer, request_id).await? {
                info!(customer = %customer.email, request_id, purchase = %existing.id, "replayed purchase");
                return Ok(existing);
            }
        }

        let platform = self.canonicalize(&request.platform);
        let price = match request.price {
            Some(price) if price < 0 => {
                return Err(SlotError::InvalidInput(format!("negative price {}", price)));
            }
            Some(price) => price,
            None => default_price(&platform, customer.tier),
        };
        if customer.balance < price {
            return Err(SlotError::InsufficientBalance {
                balance: customer.balance,
                price,
            });
        }

        let id = Uuid::now_v7().to_string();
        let credential = self
            .allocate_under(platform.as_str(), &customer.email, &id)
            .await?;

        let input = CreatePurchase {
            id,
            code: PurchaseCode::generate(),
            request_id: request_id.map(str::to_string),
            customer: customer.email.clone(),
            platform: platform.to_string(),
            info: masked_customer(&customer.email),
            price,
            purchased_at: self.now(),
            credential,
        };

        match self.record_purchase(&input).await {
            Ok(()) => {
                info!(
                    customer = %input.customer,
                    platform = %platform,
                    purchase = %input.id,
                    code = %input.code.numeric,
                    price,
                    "recorded purchase"
                );
                Ok(purchase_from(input))
            }
            Err(e) => {
                let _ = self.release_claim(&input.id).await;
                if matches!(e, SlotError::Timeout { .. }) {
                    if let Some(recorded) = self.recorded_purchase(&input.id).await {
                        warn!(purchase = %input.id, "purchase committed after its timeout");
                        return Ok(recorded);
                    }
                }
                warn!(
                    platform = %platform,
                    account = %input.credential.account_id,
                    slot = input.credential.slot_number,
                    error = %e,
                    "purchase not recorded"
                );
                match request_id {
                    Some(request_id) if e.is_unique_violation() => {
                        warn!(customer = %customer.email, request_id, "concurrent request with the same id");
                        self.purchase_for_request(&customer, request_id)
                            .await?
                            .ok_or(e)
                    }
                    _ => Err(e),
                }
            }
        }
    }

    /// Debit the balance and insert the purchase in one transaction.
    async fn record_purchase(&self, input: &CreatePurchase) -> Result<(), SlotError> {
        self.bounded("record_purchase", async {
            let mut tx = self.db.begin().await?;

            if !queries::debit_balance(&mut tx, &input.customer, input.price).await? {
                let balance = queries::find_customer(&mut tx, &input.customer)
                    .await?
                    .map(|c| c.balance)
                    .unwrap_or(0);
                return Err(SlotError::InsufficientBalance {
                    balance,
                    price: input.price,
                });
            }
            queries::insert_purchase(&mut tx, input).await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    /// The purchase with this id, if its commit landed.
    async fn recorded_purchase(&self, id: &str) -> Option<Purchase> {
        let row = self
            .bounded_for("find_purchase", COMPENSATION_TIMEOUT, async {
                let mut conn = self.db.acquire().await?;
                queries::find_purchase(&mut conn, id).await
            })
            .await;

        match row {
            Ok(row) => row.and_then(|row| Purchase::try_from(row).ok()),
            Err(e) => {
                warn!(purchase = id, error = %e, "could not check for recorded purchase");
                None
            }
        }
    }

    async fn purchase_for_request(
        &self,
        customer: &Customer,
        request_id: &str,
    ) -> Result<Option<Purchase>, SlotError> {
        let row = self
            .read_with_retry("find_purchase", || async {
                let mut conn = self.db.acquire().await?;
                queries::find_purchase_by_request(&mut conn, &customer.email, request_id).await
            })
            .await?;

        row.map(Purchase::try_from).transpose()
    }
}

fn purchase_from(input: CreatePurchase) -> Purchase {
    Purchase {
        id: input.id,
        code: input.code,
        customer: input.customer,
        platform: input.platform,
        info: input.info,
        price: input.price,
        purchased_at: input.purchased_at,
        state: PurchaseState::Available,
        credential: Some(input.credential),
    }
}

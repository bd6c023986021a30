//! Slot allocation.
//!
//! A slot is claimed inside a write transaction and tagged with a claim id.
//! When the claim fails or times out, whatever committed under that id is
//! returned to the pool, so an allocation never outlives its caller.

use tracing::{debug, error, info};
use uuid::Uuid;

use super::{COMPENSATION_TIMEOUT, SlotService};
use crate::local::queries;
use crate::types::{CanonicalName, CredentialSnapshot, SlotError};

impl SlotService {
    /// Claim the first available slot of `platform` for `customer`.
    ///
    /// Accounts are tried in stored order and slots in ascending number.
    pub async fn allocate(&self, platform: &str, customer: &str) -> Result<CredentialSnapshot, SlotError> {
        let claim = Uuid::now_v7().to_string();
        self.allocate_under(platform, customer, &claim).await
    }

    /// Allocate with a caller-chosen claim id.
    pub(super) async fn allocate_under(
        &self,
        platform: &str,
        customer: &str,
        claim: &str,
    ) -> Result<CredentialSnapshot, SlotError> {
        let customer = customer.trim();
        if customer.is_empty() {
            return Err(SlotError::InvalidInput("customer is required".to_string()));
        }
        let name = self.canonicalize(platform);

        let result = self
            .bounded("allocate", self.claim_slot(&name, customer, claim))
            .await;
        if matches!(&result, Err(e) if !matches!(e, SlotError::NoCapacity(_))) {
            // The commit may have landed after the timeout fired.
            let _ = self.release_claim(claim).await;
        }
        result
    }

    async fn claim_slot(
        &self,
        name: &CanonicalName,
        customer: &str,
        claim: &str,
    ) -> Result<CredentialSnapshot, SlotError> {
        let mut tx = self.db.begin_write().await?;
        let platforms = self.matching_platforms(&mut tx, name).await?;

        for platform_row in &platforms {
            let candidates = queries::available_slots(&mut tx, platform_row.id).await?;
            for candidate in candidates {
                let Ok(number) = u8::try_from(candidate.number) else {
                    continue;
                };
                let assigned_at = self.now();
                let expires_at = assigned_at + self.settings.slot_term;

                let Some(pin) = queries::occupy_slot(
                    &mut tx,
                    &candidate.account_id,
                    number,
                    customer,
                    claim,
                    assigned_at,
                    expires_at,
                )
                .await?
                else {
                    debug!(account = %candidate.account_id, number, "slot no longer available");
                    continue;
                };

                let account = queries::find_account(&mut tx, &candidate.account_id)
                    .await?
                    .ok_or_else(|| SlotError::NotFound(format!("account {}", candidate.account_id)))?;
                tx.commit().await?;

                info!(
                    platform = %name,
                    account = %account.id,
                    slot = number,
                    customer,
                    "allocated slot"
                );
                return Ok(CredentialSnapshot {
                    account_id: account.id,
                    email: account.email,
                    password: account.password,
                    slot_number: number,
                    pin,
                    expires_at,
                });
            }
        }

        Err(SlotError::NoCapacity(name.to_string()))
    }

    /// Return the slot held under `claim` unless a purchase was recorded for
    /// it. Waits for the write lock, so an in-flight commit settles first.
    pub(super) async fn release_claim(&self, claim: &str) -> Result<bool, SlotError> {
        let released = self
            .bounded_for("release_claim", COMPENSATION_TIMEOUT, async {
                let mut conn = self.db.acquire().await?;
                queries::release_claim(&mut conn, claim).await
            })
            .await;

        match &released {
            Ok(true) => info!(claim, "returned slot of failed allocation"),
            Ok(false) => debug!(claim, "no unpaid slot held under claim"),
            Err(e) => error!(
                claim,
                error = %e,
                "failed to return slot; it stays occupied until released"
            ),
        }
        released
    }
}

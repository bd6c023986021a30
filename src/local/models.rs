//! Row models for the local store and their mapping onto domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{
    Account, CredentialSnapshot, Customer, Occupancy, Purchase, PurchaseCode,
    PurchaseState, Slot, SlotError, SlotState,
};

// ============================================================================
// Inventory Models
// ============================================================================

/// A platform row. Several rows may share one canonical name.
#[derive(Debug, Clone, FromRow)]
pub struct PlatformRow {
    pub id: i64,
    pub name: String,
}

/// An account row from the store.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: String,
    pub seq: i64,
    pub platform_id: i64,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// A slot row from the store.
#[derive(Debug, Clone, FromRow)]
pub struct SlotRow {
    pub account_id: String,
    pub number: i64,
    pub pin: String,
    pub state: String,
    pub customer: Option<String>,
    pub assigned_at: Option<String>,
    pub expires_at: Option<String>,
}

impl SlotRow {
    pub fn is_occupied(&self) -> bool {
        self.state == SlotState::Occupied.as_str()
    }
}

/// An available slot considered by the allocator.
#[derive(Debug, Clone, FromRow)]
pub struct SlotCandidate {
    pub account_id: String,
    pub number: i64,
}

/// Available-slot count for one platform row.
#[derive(Debug, Clone, FromRow)]
pub struct PlatformAvailability {
    pub platform_id: i64,
    pub name: String,
    pub available: i64,
}

/// Rows removed when an account is retired.
#[derive(Debug, Clone)]
pub struct RetiredAccount {
    pub account: AccountRow,
    pub slots: Vec<SlotRow>,
}

// ============================================================================
// Ledger Models
// ============================================================================

/// A customer row from the store.
#[derive(Debug, Clone, FromRow)]
pub struct CustomerRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub balance: i64,
    pub price_tier: String,
    pub created_at: String,
}

/// A purchase row from the store.
#[derive(Debug, Clone, FromRow)]
pub struct PurchaseRow {
    pub id: String,
    pub code: String,
    pub code_hex: String,
    pub request_id: Option<String>,
    pub customer: String,
    pub platform: String,
    pub info: String,
    pub state: String,
    pub price: i64,
    pub purchased_at: String,
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub slot_number: Option<i64>,
    pub pin: Option<String>,
    pub expires_at: Option<String>,
}

/// Input for inserting a purchase.
#[derive(Debug, Clone)]
pub struct CreatePurchase {
    pub id: String,
    pub code: PurchaseCode,
    pub request_id: Option<String>,
    pub customer: String,
    pub platform: String,
    pub info: String,
    pub price: i64,
    pub purchased_at: DateTime<Utc>,
    pub credential: CredentialSnapshot,
}

// ============================================================================
// Conversions
// ============================================================================

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SlotError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SlotError::CorruptRow(format!("bad timestamp {:?}: {}", value, e)))
}

fn slot_number(value: i64) -> Result<u8, SlotError> {
    u8::try_from(value).map_err(|_| SlotError::CorruptRow(format!("bad slot number {}", value)))
}

impl TryFrom<SlotRow> for Slot {
    type Error = SlotError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let occupancy = if row.is_occupied() {
            match (row.customer, row.assigned_at, row.expires_at) {
                (Some(customer), Some(assigned_at), Some(expires_at)) => Some(Occupancy {
                    customer,
                    assigned_at: parse_timestamp(&assigned_at)?,
                    expires_at: parse_timestamp(&expires_at)?,
                }),
                _ => {
                    return Err(SlotError::CorruptRow(format!(
                        "occupied slot {}#{} without occupancy",
                        row.account_id, row.number
                    )));
                }
            }
        } else {
            None
        };

        Ok(Slot {
            number: slot_number(row.number)?,
            pin: row.pin,
            occupancy,
        })
    }
}

impl AccountRow {
    pub fn into_account(self, slots: Vec<SlotRow>) -> Result<Account, SlotError> {
        let slots = slots
            .into_iter()
            .map(Slot::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Account {
            id: self.id,
            email: self.email,
            password: self.password,
            slots,
        })
    }
}

impl TryFrom<CustomerRow> for Customer {
    type Error = SlotError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: row.id,
            email: row.email,
            name: row.name,
            balance: row.balance,
            tier: row.price_tier.parse().map_err(SlotError::CorruptRow)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = SlotError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let state: PurchaseState = row.state.parse().map_err(SlotError::CorruptRow)?;

        // A suspended purchase never exposes credentials, whatever the columns hold.
        let credential = match (state, row.email, row.password, row.slot_number, row.pin, row.expires_at) {
            (PurchaseState::Suspended, ..) => None,
            (_, Some(email), Some(password), Some(number), Some(pin), Some(expires_at)) => {
                Some(CredentialSnapshot {
                    account_id: row.account_id.unwrap_or_default(),
                    email,
                    password,
                    slot_number: slot_number(number)?,
                    pin,
                    expires_at: parse_timestamp(&expires_at)?,
                })
            }
            _ => None,
        };

        Ok(Purchase {
            id: row.id,
            code: PurchaseCode {
                numeric: row.code,
                hex: row.code_hex,
            },
            customer: row.customer,
            platform: row.platform,
            info: row.info,
            price: row.price,
            purchased_at: parse_timestamp(&row.purchased_at)?,
            state,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase_row(state: &str) -> PurchaseRow {
        PurchaseRow {
            id: "p1".into(),
            code: "12345".into(),
            code_hex: "ABCDEF012345".into(),
            request_id: None,
            customer: "a@x.com".into(),
            platform: "Netflix".into(),
            info: "a@...".into(),
            state: state.into(),
            price: 15000,
            purchased_at: "2026-01-01T00:00:00+00:00".into(),
            account_id: Some("acc-1".into()),
            email: Some("acc@x.com".into()),
            password: Some("secret".into()),
            slot_number: Some(2),
            pin: Some("2222".into()),
            expires_at: Some("2026-01-31T00:00:00+00:00".into()),
        }
    }

    #[test]
    fn test_available_purchase_keeps_snapshot() {
        let purchase = Purchase::try_from(purchase_row("Available")).unwrap();
        let credential = purchase.credential.unwrap();
        assert_eq!(credential.email, "acc@x.com");
        assert_eq!(credential.slot_number, 2);
        assert_eq!(credential.expiration_label(), "31/01/2026");
    }

    #[test]
    fn test_suspended_purchase_is_redacted_even_with_stale_columns() {
        let purchase = Purchase::try_from(purchase_row("Suspended")).unwrap();
        assert_eq!(purchase.state, PurchaseState::Suspended);
        assert!(purchase.credential.is_none());
    }

    #[test]
    fn test_occupied_slot_requires_occupancy() {
        let row = SlotRow {
            account_id: "acc-1".into(),
            number: 1,
            pin: "1111".into(),
            state: "occupied".into(),
            customer: None,
            assigned_at: None,
            expires_at: None,
        };
        assert!(matches!(Slot::try_from(row), Err(SlotError::CorruptRow(_))));
    }

    #[test]
    fn test_available_slot_has_no_occupancy() {
        let row = SlotRow {
            account_id: "acc-1".into(),
            number: 3,
            pin: "3333".into(),
            state: "available".into(),
            customer: None,
            assigned_at: None,
            expires_at: None,
        };
        let slot = Slot::try_from(row).unwrap();
        assert_eq!(slot.state(), SlotState::Available);
        assert_eq!(slot.number, 3);
    }
}

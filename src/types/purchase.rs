use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Days a purchase stays active before it reads as expired.
pub const PURCHASE_TERM_DAYS: i64 = 30;

/// Stored and derived purchase states.
///
/// Only `Available` and `Suspended` are persisted; `Expired` is computed at
/// read time from the purchase timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PurchaseState {
    Available,
    Expired,
    Suspended,
}

impl PurchaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseState::Available => "Available",
            PurchaseState::Expired => "Expired",
            PurchaseState::Suspended => "Suspended",
        }
    }
}

impl std::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PurchaseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" | "disponible" => Ok(PurchaseState::Available),
            "expired" | "expirado" => Ok(PurchaseState::Expired),
            "suspended" | "suspendido" => Ok(PurchaseState::Suspended),
            _ => Err(format!("unknown purchase state: {}", s)),
        }
    }
}

/// Credentials handed to a customer at the moment of allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSnapshot {
    pub account_id: String,
    pub email: String,
    pub password: String,
    pub slot_number: u8,
    pub pin: String,
    pub expires_at: DateTime<Utc>,
}

impl CredentialSnapshot {
    /// Day-first expiration date, as shown to customers.
    pub fn expiration_label(&self) -> String {
        self.expires_at.format("%d/%m/%Y").to_string()
    }
}

/// Display codes for an order.
///
/// Neither is a key; collisions are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseCode {
    /// Five-digit decimal code.
    pub numeric: String,
    /// Opaque upper-case hex code.
    pub hex: String,
}

impl PurchaseCode {
    pub fn generate() -> Self {
        Self::from_seed(Uuid::new_v4())
    }

    fn from_seed(seed: Uuid) -> Self {
        let bytes = seed.as_bytes();
        let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let digest = Sha256::digest(bytes);
        Self {
            numeric: (10_000 + n % 90_000).to_string(),
            hex: hex::encode_upper(&digest[..6]),
        }
    }
}

/// Mask a customer e-mail for the order's info line (`local@...`).
pub fn masked_customer(email: &str) -> String {
    let local = email.split('@').next().filter(|l| !l.is_empty()).unwrap_or("user");
    format!("{}@...", local)
}

/// A customer-facing order record.
#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub id: String,
    pub code: PurchaseCode,
    pub customer: String,
    pub platform: String,
    pub info: String,
    pub price: i64,
    pub purchased_at: DateTime<Utc>,
    /// Stored state: `Available` or `Suspended`.
    pub state: PurchaseState,
    /// Always `None` once suspended.
    pub credential: Option<CredentialSnapshot>,
}

impl Purchase {
    /// State as seen at `now`, deriving expiry from the purchase timestamp.
    pub fn status_at(&self, now: DateTime<Utc>, term: Duration) -> PurchaseState {
        match self.state {
            PurchaseState::Available if now - self.purchased_at > term => PurchaseState::Expired,
            state => state,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>, term: Duration) -> bool {
        self.status_at(now, term) == PurchaseState::Available
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{CanonicalName, SlotError};

/// Maximum number of independently assignable slots on one account.
pub const MAX_SLOTS_PER_ACCOUNT: u8 = 6;

/// Whether a slot can be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Occupied,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Available => "available",
            SlotState::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SlotState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" | "disponible" => Ok(SlotState::Available),
            "occupied" | "ocupado" => Ok(SlotState::Occupied),
            _ => Err(format!("unknown slot state: {}", s)),
        }
    }
}

/// Who holds an occupied slot and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub customer: String,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A profile seat on a shared account.
///
/// Occupancy fields only exist while the slot is occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub number: u8,
    pub pin: String,
    pub occupancy: Option<Occupancy>,
}

impl Slot {
    pub fn state(&self) -> SlotState {
        if self.occupancy.is_some() {
            SlotState::Occupied
        } else {
            SlotState::Available
        }
    }

    pub fn is_available(&self) -> bool {
        self.occupancy.is_none()
    }
}

/// One set of shared login credentials and its slots.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password: String,
    /// Ascending by slot number.
    pub slots: Vec<Slot>,
}

impl Account {
    pub fn available_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_available()).count()
    }

    pub fn slot(&self, number: u8) -> Option<&Slot> {
        self.slots.iter().find(|s| s.number == number)
    }
}

/// Every account stored under one logical platform.
///
/// Accounts from duplicate platform rows are merged in stored order.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInventory {
    pub name: CanonicalName,
    pub accounts: Vec<Account>,
}

impl PlatformInventory {
    pub fn available(&self) -> usize {
        self.accounts.iter().map(Account::available_slots).sum()
    }
}

/// Credentials and PINs for registering or editing an account.
///
/// `pins[i]` configures slot `i + 1`; blank entries leave that slot out.
#[derive(Debug, Clone, Default)]
pub struct AccountFields {
    pub email: String,
    pub password: String,
    pub pins: Vec<String>,
}

impl AccountFields {
    pub fn new(email: impl Into<String>, password: impl Into<String>, pins: &[&str]) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            pins: pins.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Trimmed e-mail and password, rejecting blanks.
    pub fn credentials(&self) -> Result<(String, String), SlotError> {
        let email = self.email.trim();
        let password = self.password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SlotError::InvalidInput(
                "account e-mail and password are required".to_string(),
            ));
        }
        Ok((email.to_string(), password.to_string()))
    }

    /// `(slot number, pin)` for every non-blank PIN.
    pub fn slot_pins(&self) -> Result<Vec<(u8, String)>, SlotError> {
        if self.pins.len() > MAX_SLOTS_PER_ACCOUNT as usize {
            return Err(SlotError::InvalidInput(format!(
                "an account holds at most {} slots, got {} PINs",
                MAX_SLOTS_PER_ACCOUNT,
                self.pins.len()
            )));
        }

        let pins: Vec<(u8, String)> = self
            .pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| !pin.trim().is_empty())
            .map(|(i, pin)| (i as u8 + 1, pin.trim().to_string()))
            .collect();

        if pins.is_empty() {
            return Err(SlotError::InvalidInput(
                "at least one slot PIN is required".to_string(),
            ));
        }
        Ok(pins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_state_from_str() {
        assert_eq!("available".parse::<SlotState>().unwrap(), SlotState::Available);
        assert_eq!("OCUPADO".parse::<SlotState>().unwrap(), SlotState::Occupied);
        assert!("free".parse::<SlotState>().is_err());
    }

    #[test]
    fn test_slot_pins_are_positional() {
        let fields = AccountFields::new("acc@x.com", "secret", &["1111", "", " 3333 "]);
        let pins = fields.slot_pins().unwrap();
        assert_eq!(pins, vec![(1, "1111".to_string()), (3, "3333".to_string())]);
    }

    #[test]
    fn test_slot_pins_rejects_empty_and_overflow() {
        let blank = AccountFields::new("acc@x.com", "secret", &["", " "]);
        assert!(matches!(blank.slot_pins(), Err(SlotError::InvalidInput(_))));

        let seven = AccountFields::new("acc@x.com", "secret", &["1"; 7]);
        assert!(matches!(seven.slot_pins(), Err(SlotError::InvalidInput(_))));
    }

    #[test]
    fn test_credentials_required() {
        let fields = AccountFields::new("  ", "secret", &["1"]);
        assert!(fields.credentials().is_err());

        let fields = AccountFields::new(" acc@x.com ", "secret", &["1"]);
        let (email, _) = fields.credentials().unwrap();
        assert_eq!(email, "acc@x.com");
    }
}

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::CanonicalName;

/// Which price list applies to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Wholesale,
    #[default]
    Retail,
}

impl PriceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Wholesale => "wholesale",
            PriceTier::Retail => "retail",
        }
    }
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PriceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wholesale" | "mayorista" => Ok(PriceTier::Wholesale),
            "retail" | "detal" => Ok(PriceTier::Retail),
            _ => Err(format!("unknown price tier: {}", s)),
        }
    }
}

/// (wholesale, retail) list prices keyed by canonical platform key.
const DEFAULT_PRICES: &[(&str, i64, i64)] = &[
    ("netflix", 13000, 15000),
    ("disney+", 13000, 15000),
    ("prime", 10000, 12000),
    ("hbo max", 8000, 11000),
    ("paramount+", 7000, 9000),
    ("crunchyroll", 6000, 10000),
    ("appletv", 8000, 10000),
    ("vix+", 8000, 10000),
    ("viki rakuten", 10500, 10000),
    ("directv", 10000, 12000),
    ("universal+", 8000, 10000),
    ("canva", 6000, 8000),
    ("win sports+", 16000, 18000),
    ("spotify", 5500, 6500),
    ("youtube premium", 8000, 10000),
];

const FALLBACK_PRICES: (i64, i64) = (10000, 12000);

/// List price for a platform under a tier, in whole currency units.
pub fn default_price(platform: &CanonicalName, tier: PriceTier) -> i64 {
    let (wholesale, retail) = DEFAULT_PRICES
        .iter()
        .find(|(key, _, _)| *key == platform.key())
        .map(|(_, w, r)| (*w, *r))
        .unwrap_or(FALLBACK_PRICES);

    match tier {
        PriceTier::Wholesale => wholesale,
        PriceTier::Retail => retail,
    }
}

/// A storefront customer. The e-mail is the identity stamped on slots and
/// purchases.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub name: String,
    pub balance: i64,
    pub tier: PriceTier,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a customer.
#[derive(Debug)]
pub struct NewCustomer {
    pub email: String,
    pub name: String,
    pub password: SecretString,
    pub tier: PriceTier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AliasTable;

    #[test]
    fn test_price_tier_from_str() {
        assert_eq!("wholesale".parse::<PriceTier>().unwrap(), PriceTier::Wholesale);
        assert_eq!("Detal".parse::<PriceTier>().unwrap(), PriceTier::Retail);
        assert!("vip".parse::<PriceTier>().is_err());
    }

    #[test]
    fn test_default_price_uses_canonical_key() {
        let aliases = AliasTable::builtin();
        let prime = aliases.canonicalize("Amazon Prime");
        assert_eq!(default_price(&prime, PriceTier::Wholesale), 10000);
        assert_eq!(default_price(&prime, PriceTier::Retail), 12000);

        let netflix = aliases.canonicalize("NETFLIX");
        assert_eq!(default_price(&netflix, PriceTier::Retail), 15000);
    }

    #[test]
    fn test_default_price_fallback() {
        let unknown = AliasTable::builtin().canonicalize("Mubi");
        assert_eq!(default_price(&unknown, PriceTier::Wholesale), 10000);
        assert_eq!(default_price(&unknown, PriceTier::Retail), 12000);
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// Platforms sold by the storefront, in their canonical spelling.
pub const OFFICIAL_PLATFORMS: &[&str] = &[
    "Netflix",
    "Disney+",
    "Prime",
    "Crunchyroll",
    "Paramount+",
    "HBO Max",
    "Directv",
    "Spotify",
    "Vix+",
    "Appletv",
    "Viki rakuten",
    "Youtube Premium",
    "Universal+",
    "Canva",
    "Win Sports+",
];

/// Legacy spellings and variants seen in stored data.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("amazon prime", "Prime"),
    ("prime", "Prime"),
    ("apple tv+", "Appletv"),
    ("apple tv", "Appletv"),
    ("appletv", "Appletv"),
    ("directv", "Directv"),
    ("direct tv", "Directv"),
    ("hbo max", "HBO Max"),
    ("youtube premium", "Youtube Premium"),
    ("vix+", "Vix+"),
    ("viki rakuten", "Viki rakuten"),
    ("paramount+", "Paramount+"),
    ("universal+", "Universal+"),
    ("netflix", "Netflix"),
    ("disney+", "Disney+"),
    ("crunchyroll", "Crunchyroll"),
    ("spotify", "Spotify"),
    ("canva", "Canva"),
    ("win sports+", "Win Sports+"),
];

/// A platform name after canonicalization.
///
/// Equality, ordering and hashing use the lower-cased form, so stored rows
/// that differ only in case collapse onto one logical platform.
#[derive(Debug, Clone)]
pub struct CanonicalName {
    display: String,
    key: String,
}

impl CanonicalName {
    fn new(display: String) -> Self {
        let key = display.to_lowercase();
        Self { display, key }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lower-cased comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for CanonicalName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CanonicalName {}

impl Hash for CanonicalName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for CanonicalName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

impl Serialize for CanonicalName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display)
    }
}

/// Immutable alias lookup used to canonicalize platform names.
///
/// Built once (built-ins plus configured overrides) and handed to the
/// service. Every canonical target maps to itself, which keeps
/// `canonicalize` idempotent no matter how overrides are layered.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AliasTable {
    /// Table with no aliases: names are only trimmed.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The storefront's built-in alias set.
    pub fn builtin() -> Self {
        Self::empty().with_aliases(BUILTIN_ALIASES.iter().copied())
    }

    /// Layer additional `alias -> canonical` pairs over this table.
    pub fn with_aliases<I, A, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        for (alias, canonical) in pairs {
            self.insert(alias.as_ref(), canonical.as_ref());
        }
        self
    }

    fn insert(&mut self, alias: &str, canonical: &str) {
        let alias_key = alias.trim().to_lowercase();
        let canonical = canonical.trim();
        if alias_key.is_empty() || canonical.is_empty() {
            return;
        }

        let target = self
            .entries
            .get(&canonical.to_lowercase())
            .cloned()
            .unwrap_or_else(|| canonical.to_string());
        let target_key = target.to_lowercase();

        // Anything that previously resolved to the alias (or another casing
        // of the target) now resolves to the target.
        for value in self.entries.values_mut() {
            let value_key = value.to_lowercase();
            if value_key == alias_key || value_key == target_key {
                *value = target.clone();
            }
        }

        self.entries.insert(alias_key, target.clone());
        self.entries.insert(target_key, target);
    }

    /// Map a free-text platform name to its canonical form.
    ///
    /// Trims and lower-cases for lookup; unknown names pass through trimmed.
    pub fn canonicalize(&self, name: &str) -> CanonicalName {
        let trimmed = name.trim();
        let display = self
            .entries
            .get(&trimmed.to_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string());
        CanonicalName::new(display)
    }

    /// Whether two free-text names refer to the same logical platform.
    pub fn same_platform(&self, a: &str, b: &str) -> bool {
        self.canonicalize(a) == self.canonicalize(b)
    }
}

//! Available-slot counts per logical platform.

use std::collections::BTreeMap;

use super::SlotService;
use crate::local::models::PlatformAvailability;
use crate::local::queries;
use crate::types::{AliasTable, CanonicalName, SlotError};

impl SlotService {
    /// Available slots across every platform row that canonicalizes to
    /// `platform`. Unknown platforms count zero.
    pub async fn count_available(&self, platform: &str) -> Result<u32, SlotError> {
        let name = self.canonicalize(platform);
        let counts = self.count_available_all().await?;
        Ok(counts.get(&name).copied().unwrap_or(0))
    }

    /// Available slots for every logical platform in the store, including
    /// platforms with no free slot.
    pub async fn count_available_all(&self) -> Result<BTreeMap<CanonicalName, u32>, SlotError> {
        let rows = self
            .read_with_retry("count_available", || async {
                let mut conn = self.db.acquire().await?;
                queries::available_by_platform(&mut conn).await
            })
            .await?;

        Ok(fold_availability(&self.aliases, &rows))
    }
}

/// Sum per-row counts onto canonical platform names.
fn fold_availability(
    aliases: &AliasTable,
    rows: &[PlatformAvailability],
) -> BTreeMap<CanonicalName, u32> {
    let mut counts = BTreeMap::new();
    for row in rows {
        let available = u32::try_from(row.available).unwrap_or(0);
        *counts.entry(aliases.canonicalize(&row.name)).or_insert(0) += available;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::engine::testing::{account, service};

    fn row(id: i64, name: &str, available: i64) -> PlatformAvailability {
        PlatformAvailability {
            platform_id: id,
            name: name.to_string(),
            available,
        }
    }

    #[test]
    fn test_fold_merges_aliases() {
        let aliases = AliasTable::builtin();
        let rows = vec![
            row(1, "Amazon Prime", 2),
            row(2, "prime", 3),
            row(3, "Netflix", 0),
            row(4, "Canva", 1),
        ];

        let counts = fold_availability(&aliases, &rows);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[&aliases.canonicalize("Prime")], 5);
        assert_eq!(counts[&aliases.canonicalize("netflix")], 0);
        assert_eq!(counts[&aliases.canonicalize("CANVA")], 1);
    }

    #[tokio::test]
    async fn test_count_available_matches_inventory() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        svc.add_account("Netflix", &account("a@x.com", &["1", "2", "3"]))
            .await
            .unwrap();
        svc.add_account("netflix", &account("b@x.com", &["1", "2"]))
            .await
            .unwrap();
        svc.add_account("Disney+", &account("c@x.com", &["1"]))
            .await
            .unwrap();
        svc.allocate("Netflix", "buyer@x.com").await.unwrap();

        assert_eq!(svc.count_available("NETFLIX").await.unwrap(), 4);
        assert_eq!(svc.count_available("Disney+").await.unwrap(), 1);
        assert_eq!(svc.count_available("Spotify").await.unwrap(), 0);

        let inventory = svc.get_platform("Netflix").await.unwrap().unwrap();
        assert_eq!(inventory.available(), 4);

        let all = svc.count_available_all().await.unwrap();
        assert_eq!(all.len(), 2);
        for (name, available) in &all {
            assert_eq!(
                svc.count_available(name.as_str()).await.unwrap(),
                *available,
                "aggregate disagrees for {}",
                name
            );
        }
        let total: u32 = all.values().sum();
        assert_eq!(total, 5);
    }
}

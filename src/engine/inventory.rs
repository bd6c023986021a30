//! Inventory operations: platform views and account maintenance.

use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use super::SlotService;
use crate::local::models::{AccountRow, PlatformRow};
use crate::local::queries;
use crate::types::{
    Account, AccountFields, CanonicalName, MAX_SLOTS_PER_ACCOUNT, PlatformInventory, SlotError,
};

impl SlotService {
    /// All accounts and slots stored under the platform, merged across
    /// duplicate platform rows. `None` if no row matches.
    pub async fn get_platform(&self, platform: &str) -> Result<Option<PlatformInventory>, SlotError> {
        let name = self.canonicalize(platform);
        self.read_with_retry("get_platform", || self.load_platform(&name))
            .await
    }

    async fn load_platform(&self, name: &CanonicalName) -> Result<Option<PlatformInventory>, SlotError> {
        let mut conn = self.db.acquire().await?;
        let platforms = self.matching_platforms(&mut conn, name).await?;
        if platforms.is_empty() {
            return Ok(None);
        }

        let mut accounts = Vec::new();
        for platform in &platforms {
            for row in queries::accounts_for_platform(&mut conn, platform.id).await? {
                let slots = queries::slots_for_account(&mut conn, &row.id).await?;
                accounts.push(row.into_account(slots)?);
            }
        }

        Ok(Some(PlatformInventory {
            name: name.clone(),
            accounts,
        }))
    }

    /// Whether an account with this e-mail (case-insensitive) is already
    /// registered under the platform.
    pub async fn account_email_exists(&self, platform: &str, email: &str) -> Result<bool, SlotError> {
        let name = self.canonicalize(platform);
        self.read_with_retry("account_email_exists", || async {
            let mut conn = self.db.acquire().await?;
            let platforms = self.matching_platforms(&mut conn, &name).await?;
            let count = count_email(&mut conn, &platforms, email, None).await?;
            Ok(count > 0)
        })
        .await
    }

    /// Register an account under the platform, creating the platform row if
    /// none exists. Slots start available.
    pub async fn add_account(&self, platform: &str, fields: &AccountFields) -> Result<Account, SlotError> {
        let name = self.canonicalize(platform);
        if name.as_str().is_empty() {
            return Err(SlotError::InvalidInput("platform name is required".to_string()));
        }
        let (email, password) = fields.credentials()?;
        let pins = fields.slot_pins()?;

        self.bounded("add_account", async {
            // Platform lookup, platform creation and the e-mail check all run
            // under the write lock so concurrent adds serialize.
            let mut tx = self.db.begin_write().await?;

            let mut platforms = self.matching_platforms(&mut tx, &name).await?;
            if platforms.is_empty() {
                let id = queries::insert_platform(&mut tx, name.as_str()).await?;
                info!(platform = %name, id, "created platform");
                platforms.push(PlatformRow {
                    id,
                    name: name.to_string(),
                });
            }

            let account_id = Uuid::now_v7().to_string();
            let now = self.now();

            queries::insert_account(&mut tx, &account_id, platforms[0].id, &email, &password, now)
                .await?;

            if count_email(&mut tx, &platforms, &email, Some(&account_id)).await? > 0 {
                return Err(SlotError::DuplicateEmail {
                    scope: name.to_string(),
                    email,
                });
            }

            for (number, pin) in &pins {
                queries::upsert_slot_pin(&mut tx, &account_id, *number, pin).await?;
            }

            let slots = queries::slots_for_account(&mut tx, &account_id).await?;
            let row = queries::find_account(&mut tx, &account_id)
                .await?
                .ok_or_else(|| SlotError::NotFound(format!("account {}", account_id)))?;
            tx.commit().await?;

            info!(platform = %name, account = %account_id, slots = pins.len(), "added account");
            row.into_account(slots)
        })
        .await
    }

    /// Replace an account's e-mail, password and PIN set.
    ///
    /// Slots keep their occupancy by number. A slot whose PIN is cleared is
    /// dropped; clearing the PIN of an occupied slot is refused.
    pub async fn update_account(
        &self,
        platform: &str,
        account_id: &str,
        fields: &AccountFields,
    ) -> Result<Account, SlotError> {
        let name = self.canonicalize(platform);
        let (email, password) = fields.credentials()?;
        let pins = fields.slot_pins()?;

        self.bounded("update_account", async {
            let (platforms, _) = self.owned_account(&name, account_id).await?;
            let mut tx = self.db.begin().await?;

            if !queries::update_account_credentials(&mut tx, account_id, &email, &password).await? {
                return Err(SlotError::NotFound(format!("account {}", account_id)));
            }

            if count_email(&mut tx, &platforms, &email, Some(account_id)).await? > 0 {
                return Err(SlotError::DuplicateEmail {
                    scope: name.to_string(),
                    email,
                });
            }

            for number in 1..=MAX_SLOTS_PER_ACCOUNT {
                match pins.iter().find(|(n, _)| *n == number) {
                    Some((_, pin)) => {
                        queries::upsert_slot_pin(&mut tx, account_id, number, pin).await?;
                    }
                    None => {
                        let Some(slot) = queries::find_slot(&mut tx, account_id, number).await? else {
                            continue;
                        };
                        if slot.is_occupied() {
                            return Err(SlotError::PreconditionFailed(format!(
                                "slot {} of account {} is occupied; release it before clearing its PIN",
                                number, account_id
                            )));
                        }
                        queries::delete_available_slot(&mut tx, account_id, number).await?;
                        debug!(account = %account_id, number, "dropped slot");
                    }
                }
            }

            let slots = queries::slots_for_account(&mut tx, account_id).await?;
            let row = queries::find_account(&mut tx, account_id)
                .await?
                .ok_or_else(|| SlotError::NotFound(format!("account {}", account_id)))?;
            tx.commit().await?;

            info!(platform = %name, account = %account_id, "updated account");
            row.into_account(slots)
        })
        .await
    }

    /// The platform rows for `name` and the account, which must belong to one
    /// of them.
    pub(super) async fn owned_account(
        &self,
        name: &CanonicalName,
        account_id: &str,
    ) -> Result<(Vec<PlatformRow>, AccountRow), SlotError> {
        let mut conn = self.db.acquire().await?;
        let platforms = self.matching_platforms(&mut conn, name).await?;
        let account = queries::find_account(&mut conn, account_id)
            .await?
            .filter(|a| platforms.iter().any(|p| p.id == a.platform_id))
            .ok_or_else(|| SlotError::NotFound(format!("account {} on {}", account_id, name)))?;

        Ok((platforms, account))
    }
}

async fn count_email(
    conn: &mut SqliteConnection,
    platforms: &[PlatformRow],
    email: &str,
    except_id: Option<&str>,
) -> Result<i64, SlotError> {
    let mut total = 0;
    for platform in platforms {
        total += queries::count_accounts_with_email(&mut *conn, platform.id, email, except_id).await?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use tempfile::tempdir;

    use crate::engine::testing::{account, service};
    use crate::local::queries;
    use crate::types::{SlotError, SlotState};

    #[tokio::test]
    async fn test_add_account_creates_platform_and_slots() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("netflix", &account("acc@x.com", &["1111", "2222", "3333"]))
            .await
            .unwrap();
        assert_eq!(added.slots.len(), 3);
        assert!(added.slots.iter().all(|s| s.state() == SlotState::Available));

        let inventory = svc.get_platform("NETFLIX").await.unwrap().unwrap();
        assert_eq!(inventory.name.as_str(), "Netflix");
        assert_eq!(inventory.accounts.len(), 1);
        assert_eq!(inventory.available(), 3);
    }

    #[tokio::test]
    async fn test_email_exists_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        svc.add_account("Netflix", &account("acc@x.com", &["1111"]))
            .await
            .unwrap();

        assert!(svc.account_email_exists("Netflix", "ACC@X.com").await.unwrap());
        assert!(!svc.account_email_exists("Prime", "acc@x.com").await.unwrap());
        assert!(!svc.account_email_exists("Netflix", "other@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_and_rolled_back() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        svc.add_account("Netflix", &account("acc@x.com", &["1111"]))
            .await
            .unwrap();
        let err = svc
            .add_account("netflix ", &account("ACC@x.com", &["2222"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlotError::DuplicateEmail { .. }));

        let inventory = svc.get_platform("Netflix").await.unwrap().unwrap();
        assert_eq!(inventory.accounts.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_to_new_platform_keep_one_row_and_one_email() {
        for _ in 0..5 {
            let dir = tempdir().unwrap();
            let svc = std::sync::Arc::new(service(&dir).await);

            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let svc = svc.clone();
                    tokio::spawn(async move {
                        let pin = format!("{i}{i}{i}{i}");
                        svc.add_account("Netflix", &account("shared@x.com", &[pin.as_str()]))
                            .await
                    })
                })
                .collect();
            let results: Vec<_> = join_all(handles)
                .await
                .into_iter()
                .map(|r| r.unwrap())
                .collect();

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(
                results
                    .iter()
                    .filter_map(|r| r.as_ref().err())
                    .all(|e| matches!(e, SlotError::DuplicateEmail { .. }))
            );

            let mut conn = svc.db().acquire().await.unwrap();
            assert_eq!(queries::list_platforms(&mut conn).await.unwrap().len(), 1);
            let inventory = svc.get_platform("Netflix").await.unwrap().unwrap();
            assert_eq!(inventory.accounts.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_duplicate_platform_rows_are_merged() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        {
            let mut conn = svc.db().acquire().await.unwrap();
            let legacy = queries::insert_platform(&mut conn, "Amazon Prime").await.unwrap();
            queries::insert_account(&mut conn, "legacy-1", legacy, "old@x.com", "pw", svc.now())
                .await
                .unwrap();
            queries::upsert_slot_pin(&mut conn, "legacy-1", 1, "1111").await.unwrap();
            queries::insert_platform(&mut conn, "prime").await.unwrap();
        }

        svc.add_account("PRIME", &account("new@x.com", &["2222"]))
            .await
            .unwrap();

        let inventory = svc.get_platform("amazon prime").await.unwrap().unwrap();
        assert_eq!(inventory.name.as_str(), "Prime");
        assert_eq!(inventory.accounts.len(), 2);
        assert_eq!(inventory.accounts[0].id, "legacy-1");
        assert!(svc.account_email_exists("Prime", "OLD@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_account_preserves_occupancy() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("Netflix", &account("acc@x.com", &["1111", "2222", "3333"]))
            .await
            .unwrap();
        svc.allocate("Netflix", "a@x.com").await.unwrap();

        let updated = svc
            .update_account(
                "Netflix",
                &added.id,
                &account("renamed@x.com", &["9999", "", "3333", "4444"]),
            )
            .await
            .unwrap();

        assert_eq!(updated.email, "renamed@x.com");
        let numbers: Vec<u8> = updated.slots.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 3, 4]);
        let first = updated.slot(1).unwrap();
        assert_eq!(first.pin, "9999");
        assert_eq!(first.occupancy.as_ref().unwrap().customer, "a@x.com");
    }

    #[tokio::test]
    async fn test_update_refuses_clearing_occupied_slot() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("Netflix", &account("acc@x.com", &["1111", "2222"]))
            .await
            .unwrap();
        svc.allocate("Netflix", "a@x.com").await.unwrap();

        let err = svc
            .update_account("Netflix", &added.id, &account("acc@x.com", &["", "2222"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlotError::PreconditionFailed(_)));

        let inventory = svc.get_platform("Netflix").await.unwrap().unwrap();
        assert_eq!(inventory.accounts[0].slots.len(), 2);
    }

    #[tokio::test]
    async fn test_update_rejects_email_taken_by_sibling() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        svc.add_account("Netflix", &account("one@x.com", &["1"]))
            .await
            .unwrap();
        let second = svc
            .add_account("Netflix", &account("two@x.com", &["2"]))
            .await
            .unwrap();

        let err = svc
            .update_account("Netflix", &second.id, &account("ONE@x.com", &["2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlotError::DuplicateEmail { .. }));

        let same = svc
            .update_account("Netflix", &second.id, &account("TWO@x.com", &["2"]))
            .await
            .unwrap();
        assert_eq!(same.email, "TWO@x.com");
    }

    #[tokio::test]
    async fn test_update_unknown_account() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let err = svc
            .update_account("Netflix", "missing", &account("acc@x.com", &["1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlotError::NotFound(_)));
    }
}

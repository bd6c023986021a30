//! Slot release and account retirement.
//!
//! Both reset slot occupancy and suspend the purchases that handed those slots
//! out, in the same transaction. Suspension erases the credential snapshot on
//! the purchase and cannot be undone.

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::SlotService;
use crate::local::models::PurchaseRow;
use crate::local::queries;
use crate::types::{AliasTable, CanonicalName, SlotError};

/// The occupied slot to give back.
#[derive(Debug, Clone)]
pub struct ReleaseTarget {
    pub platform: String,
    pub account_id: String,
    /// Account e-mail used to match purchases that predate stored account ids.
    /// Defaults to the account's current e-mail.
    pub account_email: Option<String>,
    pub slot_number: u8,
    pub customer: String,
}

/// A purchase lookup that did not resolve to exactly one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeWarning {
    /// No open purchase matched the released slot.
    NoPurchase { customer: String, slot_number: u8 },
    /// Several open purchases matched; all of them were suspended.
    AmbiguousMatch {
        customer: String,
        slot_number: u8,
        candidates: Vec<String>,
    },
}

impl std::fmt::Display for CascadeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeWarning::NoPurchase {
                customer,
                slot_number,
            } => write!(f, "no open purchase for {} on slot {}", customer, slot_number),
            CascadeWarning::AmbiguousMatch {
                customer,
                slot_number,
                candidates,
            } => write!(
                f,
                "{} purchases matched {} on slot {}: {}",
                candidates.len(),
                customer,
                slot_number,
                candidates.join(", ")
            ),
        }
    }
}

/// Purchases suspended by a release, and anything that needs a second look.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub suspended: Vec<String>,
    pub warnings: Vec<CascadeWarning>,
}

impl CascadeReport {
    fn merge(&mut self, other: CascadeReport) {
        self.suspended.extend(other.suspended);
        self.warnings.extend(other.warnings);
    }
}

/// Outcome of deleting an account.
#[derive(Debug, Clone, Serialize)]
pub struct RetireReport {
    pub account_id: String,
    pub email: String,
    pub slots_removed: usize,
    pub cascade: CascadeReport,
}

impl SlotService {
    /// Return an occupied slot to the pool and suspend the purchase that sold it.
    ///
    /// Fails with `PreconditionFailed` unless the slot is occupied by
    /// `target.customer`.
    pub async fn release_slot(&self, target: &ReleaseTarget) -> Result<CascadeReport, SlotError> {
        let name = self.canonicalize(&target.platform);
        let customer = target.customer.trim();

        self.bounded("release_slot", async {
            let (_, account) = self.owned_account(&name, &target.account_id).await?;
            let account_email = target
                .account_email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .unwrap_or(account.email.as_str());

            let mut tx = self.db.begin().await?;

            if !queries::vacate_slot(&mut tx, &account.id, target.slot_number, customer).await? {
                return Err(
                    match queries::find_slot(&mut tx, &account.id, target.slot_number).await? {
                        None => SlotError::NotFound(format!(
                            "slot {} of account {}",
                            target.slot_number, account.id
                        )),
                        Some(slot) if !slot.is_occupied() => SlotError::PreconditionFailed(format!(
                            "slot {} of account {} is not occupied",
                            target.slot_number, account.id
                        )),
                        Some(_) => SlotError::PreconditionFailed(format!(
                            "slot {} of account {} is not held by {}",
                            target.slot_number, account.id, customer
                        )),
                    },
                );
            }

            let report = suspend_matching(
                &mut tx,
                &self.aliases,
                &name,
                &account.id,
                account_email,
                customer,
                target.slot_number,
            )
            .await?;

            tx.commit().await?;

            info!(
                platform = %name,
                account = %account.id,
                slot = target.slot_number,
                suspended = report.suspended.len(),
                "released slot"
            );
            Ok(report)
        })
        .await
    }

    /// Permanently delete an account and its slots, suspending the purchases
    /// of every occupied slot.
    pub async fn delete_account(&self, platform: &str, account_id: &str) -> Result<RetireReport, SlotError> {
        let name = self.canonicalize(platform);

        self.bounded("delete_account", async {
            self.owned_account(&name, account_id).await?;

            let mut tx = self.db.begin().await?;
            let retired = queries::retire_account(&mut tx, account_id)
                .await?
                .ok_or_else(|| SlotError::NotFound(format!("account {}", account_id)))?;

            let mut cascade = CascadeReport::default();
            for slot in retired.slots.iter().filter(|s| s.is_occupied()) {
                let (Some(customer), Ok(number)) = (slot.customer.as_deref(), u8::try_from(slot.number))
                else {
                    continue;
                };
                let report = suspend_matching(
                    &mut tx,
                    &self.aliases,
                    &name,
                    account_id,
                    &retired.account.email,
                    customer,
                    number,
                )
                .await?;
                cascade.merge(report);
            }

            tx.commit().await?;

            info!(
                platform = %name,
                account = %account_id,
                slots = retired.slots.len(),
                suspended = cascade.suspended.len(),
                "deleted account"
            );
            Ok(RetireReport {
                account_id: retired.account.id,
                email: retired.account.email,
                slots_removed: retired.slots.len(),
                cascade,
            })
        })
        .await
    }
}

/// Suspend the open purchases that sold `slot_number` of `account_id` to
/// `customer`.
async fn suspend_matching(
    conn: &mut SqliteConnection,
    aliases: &AliasTable,
    platform: &CanonicalName,
    account_id: &str,
    account_email: &str,
    customer: &str,
    slot_number: u8,
) -> Result<CascadeReport, SlotError> {
    let open = queries::open_purchases_for_slot(&mut *conn, customer, slot_number).await?;
    let matched = select_purchases(&open, aliases, platform, account_id, account_email);

    let mut report = CascadeReport::default();
    match matched.len() {
        0 => {
            warn!(customer, slot = slot_number, platform = %platform, "no purchase to suspend");
            report.warnings.push(CascadeWarning::NoPurchase {
                customer: customer.to_string(),
                slot_number,
            });
        }
        1 => {}
        _ => {
            let candidates: Vec<String> = matched.iter().map(|p| p.id.clone()).collect();
            warn!(
                customer,
                slot = slot_number,
                platform = %platform,
                candidates = ?candidates,
                "several purchases match released slot, suspending all"
            );
            report.warnings.push(CascadeWarning::AmbiguousMatch {
                customer: customer.to_string(),
                slot_number,
                candidates,
            });
        }
    }

    for purchase in matched {
        if queries::suspend_purchase(&mut *conn, &purchase.id).await? {
            report.suspended.push(purchase.id.clone());
        }
    }

    Ok(report)
}

/// Pick the purchases a released slot refers to.
///
/// Rows carrying an account id match on it; older rows without one fall back
/// to the snapshot e-mail.
fn select_purchases<'a>(
    open: &'a [PurchaseRow],
    aliases: &AliasTable,
    platform: &CanonicalName,
    account_id: &str,
    account_email: &str,
) -> Vec<&'a PurchaseRow> {
    let on_platform = || {
        open.iter()
            .filter(move |p| aliases.same_platform(&p.platform, platform.as_str()))
    };

    let by_id: Vec<_> = on_platform()
        .filter(|p| p.account_id.as_deref() == Some(account_id))
        .collect();
    if !by_id.is_empty() {
        return by_id;
    }

    on_platform()
        .filter(|p| p.account_id.as_deref().is_none_or(str::is_empty))
        .filter(|p| {
            p.email
                .as_deref()
                .is_some_and(|e| e.trim().eq_ignore_ascii_case(account_email.trim()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::engine::PurchaseRequest;
    use crate::engine::testing::{account, customer, service};
    use crate::types::{PriceTier, PurchaseState};

    fn row(id: &str, platform: &str, account_id: Option<&str>, email: &str) -> PurchaseRow {
        PurchaseRow {
            id: id.to_string(),
            code: "12345".to_string(),
            code_hex: "ABCDEF".to_string(),
            request_id: None,
            customer: "a@x.com".to_string(),
            platform: platform.to_string(),
            info: "a@...".to_string(),
            state: "Available".to_string(),
            price: 10000,
            purchased_at: "2026-01-01T00:00:00+00:00".to_string(),
            account_id: account_id.map(str::to_string),
            email: Some(email.to_string()),
            password: Some("secret".to_string()),
            slot_number: Some(2),
            pin: Some("2222".to_string()),
            expires_at: Some("2026-01-31T00:00:00+00:00".to_string()),
        }
    }

    async fn funded(svc: &SlotService, email: &str, amount: i64) {
        svc.register_customer(customer(email, PriceTier::Retail))
            .await
            .unwrap();
        svc.credit_balance(email, amount).await.unwrap();
    }

    #[test]
    fn test_select_prefers_account_id() {
        let aliases = AliasTable::builtin();
        let platform = aliases.canonicalize("Crunchyroll");
        let open = vec![
            row("legacy", "crunchyroll", None, "acc@x.com"),
            row("exact", "Crunchyroll", Some("acc-1"), "acc@x.com"),
            row("other", "Crunchyroll", Some("acc-2"), "acc@x.com"),
        ];

        let picked = select_purchases(&open, &aliases, &platform, "acc-1", "acc@x.com");
        let ids: Vec<_> = picked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["exact"]);
    }

    #[test]
    fn test_select_falls_back_to_legacy_email() {
        let aliases = AliasTable::builtin();
        let platform = aliases.canonicalize("Prime");
        let open = vec![
            row("legacy", "Amazon Prime", None, "ACC@x.com"),
            row("elsewhere", "Netflix", None, "acc@x.com"),
            row("different", "Prime", None, "other@x.com"),
        ];

        let picked = select_purchases(&open, &aliases, &platform, "acc-9", "acc@x.com");
        let ids: Vec<_> = picked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["legacy"]);
    }

    #[test]
    fn test_select_reports_every_ambiguous_candidate() {
        let aliases = AliasTable::builtin();
        let platform = aliases.canonicalize("Netflix");
        let open = vec![
            row("first", "Netflix", None, "acc@x.com"),
            row("second", "netflix", None, "acc@x.com"),
        ];

        let picked = select_purchases(&open, &aliases, &platform, "acc-1", "acc@x.com");
        assert_eq!(picked.len(), 2);
    }

    #[tokio::test]
    async fn test_release_suspends_purchase_and_frees_slot() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("Crunchyroll", &account("acc@x.com", &["1111", "2222"]))
            .await
            .unwrap();
        funded(&svc, "a@x.com", 50000).await;
        svc.allocate("Crunchyroll", "holder@x.com").await.unwrap();
        let purchase = svc
            .buy(&PurchaseRequest::new("Crunchyroll", "a@x.com"))
            .await
            .unwrap();
        assert_eq!(purchase.credential.as_ref().unwrap().slot_number, 2);

        let target = ReleaseTarget {
            platform: "crunchyroll".to_string(),
            account_id: added.id.clone(),
            account_email: Some("ACC@x.com".to_string()),
            slot_number: 2,
            customer: "a@x.com".to_string(),
        };
        let report = svc.release_slot(&target).await.unwrap();
        assert_eq!(report.suspended, vec![purchase.id.clone()]);
        assert!(report.warnings.is_empty());

        let inventory = svc.get_platform("Crunchyroll").await.unwrap().unwrap();
        let slot = inventory.accounts[0].slot(2).unwrap();
        assert!(slot.is_available());
        assert!(slot.occupancy.is_none());

        let history = svc.purchases("a@x.com").await.unwrap();
        assert_eq!(history[0].state, PurchaseState::Suspended);
        assert!(history[0].credential.is_none());

        let again = svc.release_slot(&target).await.unwrap_err();
        assert!(matches!(again, SlotError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_release_requires_matching_customer() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("Netflix", &account("acc@x.com", &["1111"]))
            .await
            .unwrap();
        svc.allocate("Netflix", "holder@x.com").await.unwrap();

        let mut target = ReleaseTarget {
            platform: "Netflix".to_string(),
            account_id: added.id.clone(),
            account_email: None,
            slot_number: 1,
            customer: "intruder@x.com".to_string(),
        };
        let err = svc.release_slot(&target).await.unwrap_err();
        assert!(matches!(err, SlotError::PreconditionFailed(_)));
        assert_eq!(svc.count_available("Netflix").await.unwrap(), 0);

        target.slot_number = 5;
        let err = svc.release_slot(&target).await.unwrap_err();
        assert!(matches!(err, SlotError::NotFound(_)));

        target.platform = "Disney+".to_string();
        target.slot_number = 1;
        let err = svc.release_slot(&target).await.unwrap_err();
        assert!(matches!(err, SlotError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_release_without_purchase_warns() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("Netflix", &account("acc@x.com", &["1111"]))
            .await
            .unwrap();
        svc.allocate("Netflix", "Holder@x.com").await.unwrap();

        let report = svc
            .release_slot(&ReleaseTarget {
                platform: "Netflix".to_string(),
                account_id: added.id.clone(),
                account_email: None,
                slot_number: 1,
                customer: "holder@x.com".to_string(),
            })
            .await
            .unwrap();

        assert!(report.suspended.is_empty());
        assert_eq!(
            report.warnings,
            vec![CascadeWarning::NoPurchase {
                customer: "holder@x.com".to_string(),
                slot_number: 1
            }]
        );
        assert_eq!(svc.count_available("Netflix").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_account_suspends_occupied_purchases() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account(
                "Disney+",
                &account("acc@x.com", &["1", "2", "3", "4", "5", "6"]),
            )
            .await
            .unwrap();
        funded(&svc, "a@x.com", 100000).await;
        funded(&svc, "b@x.com", 100000).await;
        let first = svc
            .buy(&PurchaseRequest::new("Disney+", "a@x.com"))
            .await
            .unwrap();
        let second = svc
            .buy(&PurchaseRequest::new("disney+", "b@x.com"))
            .await
            .unwrap();

        let report = svc.delete_account("DISNEY+", &added.id).await.unwrap();
        assert_eq!(report.slots_removed, 6);
        assert_eq!(report.email, "acc@x.com");
        let mut suspended = report.cascade.suspended.clone();
        suspended.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(suspended, expected);
        assert!(report.cascade.warnings.is_empty());

        let inventory = svc.get_platform("Disney+").await.unwrap().unwrap();
        assert!(inventory.accounts.is_empty());
        assert_eq!(svc.count_available("Disney+").await.unwrap(), 0);

        for email in ["a@x.com", "b@x.com"] {
            let history = svc.purchases(email).await.unwrap();
            assert_eq!(history[0].state, PurchaseState::Suspended);
            assert!(history[0].credential.is_none());
        }

        let err = svc.delete_account("Disney+", &added.id).await.unwrap_err();
        assert!(matches!(err, SlotError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_legacy_purchases_match_by_email() {
        let dir = tempdir().unwrap();
        let svc = service(&dir).await;

        let added = svc
            .add_account("Netflix", &account("acc@x.com", &["1111"]))
            .await
            .unwrap();
        funded(&svc, "a@x.com", 50000).await;
        let purchase = svc
            .buy(&PurchaseRequest::new("Netflix", "a@x.com"))
            .await
            .unwrap();
        sqlx::query("UPDATE purchases SET account_id = NULL WHERE id = ?")
            .bind(&purchase.id)
            .execute(svc.db().pool())
            .await
            .unwrap();

        let report = svc
            .release_slot(&ReleaseTarget {
                platform: "Netflix".to_string(),
                account_id: added.id.clone(),
                account_email: None,
                slot_number: 1,
                customer: "a@x.com".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(report.suspended, vec![purchase.id]);
    }
}

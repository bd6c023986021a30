//! Slot service.
//!
//! Ties the store to the inventory, availability, allocation, purchase and
//! release operations:
//! 1. Canonicalize the platform name
//! 2. Resolve every stored platform row it covers
//! 3. Run the operation, bounded by the request timeout

mod allocation;
mod availability;
mod clock;
mod customers;
mod inventory;
mod purchase;
mod release;

pub use clock::{Clock, SystemClock};
pub use purchase::PurchaseRequest;
pub use release::ReleaseTarget;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::warn;

use crate::local::models::PlatformRow;
use crate::local::{DB_FILE_NAME, SlotDb, VaultConfig, queries};
use crate::types::{AliasTable, CanonicalName, SlotError};

/// Bound for steps that undo a failed or timed-out write. Longer than the
/// request timeout so a commit still in flight can land first.
const COMPENSATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeouts, terms and retry policy for the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub request_timeout: Duration,
    pub slot_term: chrono::Duration,
    pub read_retries: u32,
    pub retry_backoff: Duration,
}

impl ServiceSettings {
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            slot_term: config.slot_term(),
            read_retries: config.read_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&VaultConfig::default())
    }
}

/// Credential inventory and slot allocation over the local store.
pub struct SlotService {
    db: SlotDb,
    aliases: AliasTable,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl SlotService {
    /// Open the store in `store_dir` and build a service from `config`.
    pub async fn open(store_dir: &Path, config: &VaultConfig) -> Result<Self, SlotError> {
        let db = SlotDb::open(
            &store_dir.join(DB_FILE_NAME),
            config.max_connections,
            config.request_timeout(),
        )
        .await?;

        Ok(Self::new(
            db,
            config.alias_table(),
            Arc::new(SystemClock),
            ServiceSettings::from_config(config),
        ))
    }

    pub fn new(
        db: SlotDb,
        aliases: AliasTable,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db,
            aliases,
            clock,
            settings,
        }
    }

    /// Canonical form of a free-text platform name.
    pub fn canonicalize(&self, name: &str) -> CanonicalName {
        self.aliases.canonicalize(name)
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Get the underlying database.
    pub fn db(&self) -> &SlotDb {
        &self.db
    }

    /// Run one store step under the request timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, SlotError>
    where
        F: Future<Output = Result<T, SlotError>>,
    {
        self.bounded_for(op, self.settings.request_timeout, fut).await
    }

    async fn bounded_for<T, F>(&self, op: &'static str, after: Duration, fut: F) -> Result<T, SlotError>
    where
        F: Future<Output = Result<T, SlotError>>,
    {
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, ?after, "store call timed out");
                Err(SlotError::Timeout { op, after })
            }
        }
    }

    /// Run a read-only step, retrying transient failures with exponential backoff.
    async fn read_with_retry<T, F, Fut>(&self, op: &'static str, mut step: F) -> Result<T, SlotError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SlotError>>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(op, step()).await {
                Err(e) if e.is_transient() && attempt < self.settings.read_retries => {
                    let delay = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(op, attempt, ?delay, error = %e, "transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Every stored platform row whose name canonicalizes to `name`, oldest first.
    async fn matching_platforms(
        &self,
        conn: &mut SqliteConnection,
        name: &CanonicalName,
    ) -> Result<Vec<PlatformRow>, SlotError> {
        let rows = queries::list_platforms(conn).await?;
        Ok(rows
            .into_iter()
            .filter(|row| self.aliases.canonicalize(&row.name) == *name)
            .collect())
    }
}

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the inventory, allocation, ledger and release operations.
///
/// Commands translate these into user-facing messages; nothing here carries
/// credential material.
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("e-mail {email} is already registered for {scope}")]
    DuplicateEmail { scope: String, email: String },

    #[error("no available slot for {0}")]
    NoCapacity(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("insufficient balance: {balance} available, {price} required")]
    InsufficientBalance { balance: i64, price: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("store call `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl SlotError {
    /// Whether a read may be retried after this failure.
    pub fn is_transient(&self) -> bool {
        match self {
            SlotError::Timeout { .. } => true,
            SlotError::Persistence(err) => !matches!(
                err,
                sqlx::Error::RowNotFound
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::TypeNotFound { .. }
            ),
            _ => false,
        }
    }

    /// Whether this is a unique-constraint violation raised by the store.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SlotError::Persistence(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = SlotError::Timeout {
            op: "count_available",
            after: Duration::from_millis(10),
        };
        assert!(timeout.is_transient());
        assert!(SlotError::Persistence(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!SlotError::Persistence(sqlx::Error::RowNotFound).is_transient());
        assert!(!SlotError::NoCapacity("Netflix".into()).is_transient());
    }

    #[test]
    fn test_messages_do_not_leak_credentials() {
        let err = SlotError::DuplicateEmail {
            scope: "Netflix".into(),
            email: "acc@x.com".into(),
        };
        assert_eq!(
            err.to_string(),
            "e-mail acc@x.com is already registered for Netflix"
        );
    }
}

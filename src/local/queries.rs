//! Statements against the slot store.
//!
//! Every function takes a bare connection so callers decide whether it runs
//! on its own or inside a transaction (`&mut *tx`).

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::types::{PurchaseState, SlotError, SlotState};

use super::models::{
    AccountRow, CreatePurchase, CustomerRow, PlatformAvailability, PlatformRow, PurchaseRow,
    RetiredAccount, SlotCandidate, SlotRow,
};

// ==================== Platform Operations ====================

/// List every platform row in insertion order.
pub async fn list_platforms(conn: &mut SqliteConnection) -> Result<Vec<PlatformRow>, SlotError> {
    let rows = sqlx::query_as::<_, PlatformRow>("SELECT id, name FROM platforms ORDER BY id")
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Insert a platform row.
pub async fn insert_platform(conn: &mut SqliteConnection, name: &str) -> Result<i64, SlotError> {
    let id: i64 = sqlx::query_scalar("INSERT INTO platforms (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(conn)
        .await?;

    Ok(id)
}

/// Available-slot count for every platform row, including empty ones.
pub async fn available_by_platform(
    conn: &mut SqliteConnection,
) -> Result<Vec<PlatformAvailability>, SlotError> {
    let rows = sqlx::query_as::<_, PlatformAvailability>(
        r#"
        SELECT
            p.id AS platform_id,
            p.name AS name,
            COUNT(CASE WHEN s.state = 'available' THEN 1 END) AS available
        FROM platforms p
        LEFT JOIN accounts a ON a.platform_id = p.id
        LEFT JOIN slots s ON s.account_id = a.id
        GROUP BY p.id, p.name
        ORDER BY p.id
        "#,
    )
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

// ==================== Account Operations ====================

/// Accounts of one platform row in stored order.
pub async fn accounts_for_platform(
    conn: &mut SqliteConnection,
    platform_id: i64,
) -> Result<Vec<AccountRow>, SlotError> {
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT id, seq, platform_id, email, password, created_at FROM accounts WHERE platform_id = ? ORDER BY seq",
    )
    .bind(platform_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Find an account by id.
pub async fn find_account(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> Result<Option<AccountRow>, SlotError> {
    let row = sqlx::query_as::<_, AccountRow>(
        "SELECT id, seq, platform_id, email, password, created_at FROM accounts WHERE id = ?",
    )
    .bind(account_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Insert an account row.
pub async fn insert_account(
    conn: &mut SqliteConnection,
    id: &str,
    platform_id: i64,
    email: &str,
    password: &str,
    created_at: DateTime<Utc>,
) -> Result<(), SlotError> {
    sqlx::query(
        "INSERT INTO accounts (id, platform_id, email, password, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(platform_id)
    .bind(email)
    .bind(password)
    .bind(created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Replace an account's login credentials.
pub async fn update_account_credentials(
    conn: &mut SqliteConnection,
    account_id: &str,
    email: &str,
    password: &str,
) -> Result<bool, SlotError> {
    let result = sqlx::query("UPDATE accounts SET email = ?, password = ? WHERE id = ?")
        .bind(email)
        .bind(password)
        .bind(account_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Count accounts on a platform row using `email` (case-insensitive),
/// ignoring `except_id`.
pub async fn count_accounts_with_email(
    conn: &mut SqliteConnection,
    platform_id: i64,
    email: &str,
    except_id: Option<&str>,
) -> Result<i64, SlotError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM accounts WHERE platform_id = ? AND lower(email) = lower(?) AND id != ?",
    )
    .bind(platform_id)
    .bind(email.trim())
    .bind(except_id.unwrap_or(""))
    .fetch_one(conn)
    .await?;

    Ok(count)
}

/// Delete an account's slots, then the account itself.
///
/// Returns `None` (and deletes nothing) if the account does not exist.
pub async fn retire_account(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> Result<Option<RetiredAccount>, SlotError> {
    let slots = sqlx::query_as::<_, SlotRow>(
        r#"
        DELETE FROM slots WHERE account_id = ?
        RETURNING account_id, number, pin, state, customer, assigned_at, expires_at
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?;

    let account = sqlx::query_as::<_, AccountRow>(
        r#"
        DELETE FROM accounts WHERE id = ?
        RETURNING id, seq, platform_id, email, password, created_at
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(account.map(|account| {
        let mut slots = slots;
        slots.sort_by_key(|s| s.number);
        RetiredAccount { account, slots }
    }))
}

// ==================== Slot Operations ====================

/// Slots of one account, ascending by number.
pub async fn slots_for_account(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> Result<Vec<SlotRow>, SlotError> {
    let rows = sqlx::query_as::<_, SlotRow>(
        r#"
        SELECT account_id, number, pin, state, customer, assigned_at, expires_at
        FROM slots WHERE account_id = ? ORDER BY number
        "#,
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Find one slot.
pub async fn find_slot(
    conn: &mut SqliteConnection,
    account_id: &str,
    number: u8,
) -> Result<Option<SlotRow>, SlotError> {
    let row = sqlx::query_as::<_, SlotRow>(
        r#"
        SELECT account_id, number, pin, state, customer, assigned_at, expires_at
        FROM slots WHERE account_id = ? AND number = ?
        "#,
    )
    .bind(account_id)
    .bind(number as i64)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Create a slot with the given PIN, or change the PIN of an existing one
/// without touching its occupancy.
pub async fn upsert_slot_pin(
    conn: &mut SqliteConnection,
    account_id: &str,
    number: u8,
    pin: &str,
) -> Result<(), SlotError> {
    sqlx::query(
        r#"
        INSERT INTO slots (account_id, number, pin, state)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(account_id, number) DO UPDATE SET pin = excluded.pin
        "#,
    )
    .bind(account_id)
    .bind(number as i64)
    .bind(pin)
    .bind(SlotState::Available.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete a slot, but only while it is available.
pub async fn delete_available_slot(
    conn: &mut SqliteConnection,
    account_id: &str,
    number: u8,
) -> Result<bool, SlotError> {
    let result = sqlx::query("DELETE FROM slots WHERE account_id = ? AND number = ? AND state = ?")
        .bind(account_id)
        .bind(number as i64)
        .bind(SlotState::Available.as_str())
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Available slots of one platform row: accounts in stored order, slots
/// ascending by number.
pub async fn available_slots(
    conn: &mut SqliteConnection,
    platform_id: i64,
) -> Result<Vec<SlotCandidate>, SlotError> {
    let rows = sqlx::query_as::<_, SlotCandidate>(
        r#"
        SELECT s.account_id AS account_id, s.number AS number
        FROM slots s
        JOIN accounts a ON a.id = s.account_id
        WHERE a.platform_id = ? AND s.state = ?
        ORDER BY a.seq, s.number
        "#,
    )
    .bind(platform_id)
    .bind(SlotState::Available.as_str())
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Occupy a slot if, and only if, it is still available.
///
/// Returns the slot PIN when this call won the slot, `None` when another
/// writer got there first (or the slot is gone).
pub async fn occupy_slot(
    conn: &mut SqliteConnection,
    account_id: &str,
    number: u8,
    customer: &str,
    claim: &str,
    assigned_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Option<String>, SlotError> {
    let pin: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE slots
        SET state = ?, customer = ?, claim = ?, assigned_at = ?, expires_at = ?
        WHERE account_id = ? AND number = ? AND state = ?
        RETURNING pin
        "#,
    )
    .bind(SlotState::Occupied.as_str())
    .bind(customer)
    .bind(claim)
    .bind(assigned_at.to_rfc3339())
    .bind(expires_at.to_rfc3339())
    .bind(account_id)
    .bind(number as i64)
    .bind(SlotState::Available.as_str())
    .fetch_optional(conn)
    .await?;

    Ok(pin)
}

/// Return an occupied slot to the pool if it is held by `customer`
/// (case-insensitive).
pub async fn vacate_slot(
    conn: &mut SqliteConnection,
    account_id: &str,
    number: u8,
    customer: &str,
) -> Result<bool, SlotError> {
    let result = sqlx::query(
        r#"
        UPDATE slots
        SET state = ?, customer = NULL, claim = NULL, assigned_at = NULL, expires_at = NULL
        WHERE account_id = ? AND number = ? AND state = ? AND lower(customer) = lower(?)
        "#,
    )
    .bind(SlotState::Available.as_str())
    .bind(account_id)
    .bind(number as i64)
    .bind(SlotState::Occupied.as_str())
    .bind(customer.trim())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Return the slot occupied under `claim`, unless a purchase with the claim
/// as its id has been recorded.
pub async fn release_claim(conn: &mut SqliteConnection, claim: &str) -> Result<bool, SlotError> {
    let result = sqlx::query(
        r#"
        UPDATE slots
        SET state = ?, customer = NULL, claim = NULL, assigned_at = NULL, expires_at = NULL
        WHERE claim = ? AND state = ?
          AND NOT EXISTS (SELECT 1 FROM purchases WHERE id = ?)
        "#,
    )
    .bind(SlotState::Available.as_str())
    .bind(claim)
    .bind(SlotState::Occupied.as_str())
    .bind(claim)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ==================== Customer Operations ====================

/// Find a customer by e-mail (case-insensitive).
pub async fn find_customer(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<CustomerRow>, SlotError> {
    let row = sqlx::query_as::<_, CustomerRow>(
        r#"
        SELECT id, email, name, password, balance, price_tier, created_at
        FROM customers WHERE lower(email) = lower(?)
        "#,
    )
    .bind(email.trim())
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Insert a customer.
pub async fn insert_customer(conn: &mut SqliteConnection, row: &CustomerRow) -> Result<(), SlotError> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, email, name, password, balance, price_tier, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.email)
    .bind(&row.name)
    .bind(&row.password)
    .bind(row.balance)
    .bind(&row.price_tier)
    .bind(&row.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Add `amount` to a balance, returning the new balance.
pub async fn credit_balance(
    conn: &mut SqliteConnection,
    email: &str,
    amount: i64,
) -> Result<Option<i64>, SlotError> {
    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE customers SET balance = balance + ? WHERE lower(email) = lower(?) RETURNING balance",
    )
    .bind(amount)
    .bind(email.trim())
    .fetch_optional(conn)
    .await?;

    Ok(balance)
}

/// Subtract `amount` from a balance if it covers it.
pub async fn debit_balance(
    conn: &mut SqliteConnection,
    email: &str,
    amount: i64,
) -> Result<bool, SlotError> {
    let result = sqlx::query(
        "UPDATE customers SET balance = balance - ? WHERE lower(email) = lower(?) AND balance >= ?",
    )
    .bind(amount)
    .bind(email.trim())
    .bind(amount)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// ==================== Purchase Operations ====================

const PURCHASE_COLUMNS: &str = "id, code, code_hex, request_id, customer, platform, info, state, \
     price, purchased_at, account_id, email, password, slot_number, pin, expires_at";

/// Insert a purchase in state `Available` with its credential snapshot.
pub async fn insert_purchase(
    conn: &mut SqliteConnection,
    input: &CreatePurchase,
) -> Result<(), SlotError> {
    let credential = &input.credential;

    sqlx::query(
        r#"
        INSERT INTO purchases (
            id, code, code_hex, request_id, customer, platform, info, state,
            price, purchased_at, account_id, email, password, slot_number, pin, expires_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.id)
    .bind(&input.code.numeric)
    .bind(&input.code.hex)
    .bind(&input.request_id)
    .bind(&input.customer)
    .bind(&input.platform)
    .bind(&input.info)
    .bind(PurchaseState::Available.as_str())
    .bind(input.price)
    .bind(input.purchased_at.to_rfc3339())
    .bind(&credential.account_id)
    .bind(&credential.email)
    .bind(&credential.password)
    .bind(credential.slot_number as i64)
    .bind(&credential.pin)
    .bind(credential.expires_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_purchase(conn: &mut SqliteConnection, id: &str) -> Result<Option<PurchaseRow>, SlotError> {
    let sql = format!("SELECT {} FROM purchases WHERE id = ?", PURCHASE_COLUMNS);
    let row = sqlx::query_as::<_, PurchaseRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Find the purchase recorded for a customer's request id.
pub async fn find_purchase_by_request(
    conn: &mut SqliteConnection,
    customer: &str,
    request_id: &str,
) -> Result<Option<PurchaseRow>, SlotError> {
    let sql = format!(
        "SELECT {} FROM purchases WHERE customer = ? AND request_id = ?",
        PURCHASE_COLUMNS
    );
    let row = sqlx::query_as::<_, PurchaseRow>(&sql)
        .bind(customer)
        .bind(request_id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// A customer's purchases, newest first.
pub async fn purchases_for_customer(
    conn: &mut SqliteConnection,
    customer: &str,
) -> Result<Vec<PurchaseRow>, SlotError> {
    let sql = format!(
        "SELECT {} FROM purchases WHERE lower(customer) = lower(?) ORDER BY purchased_at DESC",
        PURCHASE_COLUMNS
    );
    let rows = sqlx::query_as::<_, PurchaseRow>(&sql)
        .bind(customer.trim())
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Non-suspended purchases of a customer for a slot number, oldest first.
pub async fn open_purchases_for_slot(
    conn: &mut SqliteConnection,
    customer: &str,
    slot_number: u8,
) -> Result<Vec<PurchaseRow>, SlotError> {
    let sql = format!(
        "SELECT {} FROM purchases \
         WHERE lower(customer) = lower(?) AND slot_number = ? AND state != ? \
         ORDER BY purchased_at",
        PURCHASE_COLUMNS
    );
    let rows = sqlx::query_as::<_, PurchaseRow>(&sql)
        .bind(customer.trim())
        .bind(slot_number as i64)
        .bind(PurchaseState::Suspended.as_str())
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Mark a purchase suspended and erase its credential snapshot.
pub async fn suspend_purchase(conn: &mut SqliteConnection, id: &str) -> Result<bool, SlotError> {
    let result = sqlx::query(
        r#"
        UPDATE purchases
        SET state = ?, email = NULL, password = NULL, slot_number = NULL,
            pin = NULL, expires_at = NULL
        WHERE id = ?
        "#,
    )
    .bind(PurchaseState::Suspended.as_str())
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{AssetType, EntrySide, LedgerEntry, Transaction, Wallet};

// --- Wallet locking and ledger writes (run inside an open transaction) ---

/// Lock both wallet rows for the life of the enclosing transaction.
///
/// The ORDER BY inside the locking read is load-bearing: every flow acquires
/// overlapping rows in ascending id order within this single statement, so no
/// circular wait between concurrent flows can form.
pub async fn lock_wallet_pair(
    executor: &mut SqlxTransaction<'_, Postgres>,
    first: Uuid,
    second: Uuid,
) -> Result<Vec<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        "SELECT * FROM wallets WHERE id IN ($1, $2) ORDER BY id FOR UPDATE",
    )
    .bind(first)
    .bind(second)
    .fetch_all(&mut **executor)
    .await
}

/// Apply one posting to a locked wallet: shift the balance by the signed
/// delta and record the entry with its before/after snapshot.
///
/// `balance_before` comes from the locked in-memory row; the exclusive lock
/// makes it equal to the stored value. The non-negative balance CHECK on
/// wallets remains as the last line of defense under the relative UPDATE.
pub async fn post_entry(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet: &Wallet,
    side: EntrySide,
    amount: &BigDecimal,
    transaction_id: Uuid,
) -> Result<LedgerEntry> {
    let delta = side.delta(amount);
    let balance_before = wallet.balance.clone();
    let balance_after = &balance_before + &delta;

    sqlx::query("UPDATE wallets SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
        .bind(&delta)
        .bind(wallet.id)
        .execute(&mut **executor)
        .await?;

    sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO ledger_entries (
            id, transaction_id, wallet_id, side, amount,
            balance_before, balance_after, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(transaction_id)
    .bind(wallet.id)
    .bind(side.as_str())
    .bind(amount)
    .bind(&balance_before)
    .bind(&balance_after)
    .bind(Utc::now())
    .fetch_one(&mut **executor)
    .await
}

pub async fn insert_pending_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, kind, status, user_wallet_id, system_wallet_id, amount,
            reference_id, idempotency_key, description, metadata,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(&tx.kind)
    .bind(&tx.status)
    .bind(tx.user_wallet_id)
    .bind(tx.system_wallet_id)
    .bind(&tx.amount)
    .bind(&tx.reference_id)
    .bind(&tx.idempotency_key)
    .bind(&tx.description)
    .bind(&tx.metadata)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(&mut **executor)
    .await
}

/// Promote a pending transaction once both postings exist.
pub async fn complete_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET status = 'completed', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&mut **executor)
    .await
}

// --- Idempotency-key lookups ---
//
// Two entry points (one on the pool, one inside an open transaction) sharing
// the same SQL, so the in-flow duplicate check and the post-abort re-read
// read the same shape.

const FIND_BY_KEY_SQL: &str = "SELECT * FROM transactions WHERE idempotency_key = $1";

pub async fn find_transaction_by_key(pool: &PgPool, key: &str) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(FIND_BY_KEY_SQL)
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn find_transaction_by_key_tx(
    executor: &mut SqlxTransaction<'_, Postgres>,
    key: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(FIND_BY_KEY_SQL)
        .bind(key)
        .fetch_optional(&mut **executor)
        .await
}

// --- Read views (no locks) ---

pub async fn list_asset_types(pool: &PgPool) -> Result<Vec<AssetType>> {
    sqlx::query_as::<_, AssetType>("SELECT * FROM asset_types ORDER BY symbol")
        .fetch_all(pool)
        .await
}

pub async fn get_wallet(pool: &PgPool, id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_wallets(
    pool: &PgPool,
    owner_kind: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        r#"
        SELECT * FROM wallets
        WHERE ($1::text IS NULL OR owner_kind = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(owner_kind)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_wallets(pool: &PgPool, owner_kind: Option<&str>) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM wallets WHERE ($1::text IS NULL OR owner_kind = $1)",
    )
    .bind(owner_kind)
    .fetch_one(pool)
    .await
}

pub async fn list_transactions_for_wallet(
    pool: &PgPool,
    wallet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE user_wallet_id = $1 OR system_wallet_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(wallet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_transactions_for_wallet(pool: &PgPool, wallet_id: Uuid) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM transactions WHERE user_wallet_id = $1 OR system_wallet_id = $1",
    )
    .bind(wallet_id)
    .fetch_one(pool)
    .await
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_entries_for_transaction(
    pool: &PgPool,
    transaction_id: Uuid,
) -> Result<Vec<LedgerEntry>> {
    sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE transaction_id = $1 ORDER BY created_at",
    )
    .bind(transaction_id)
    .fetch_all(pool)
    .await
}

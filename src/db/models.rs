use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";

/// Side of a ledger posting. A debit decreases the wallet balance, a credit
/// increases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySide {
    Debit,
    Credit,
}

impl EntrySide {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySide::Debit => "debit",
            EntrySide::Credit => "credit",
        }
    }

    /// Signed delta this side applies to a balance.
    pub fn delta(&self, amount: &BigDecimal) -> BigDecimal {
        match self {
            EntrySide::Debit => -amount.clone(),
            EntrySide::Credit => amount.clone(),
        }
    }
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct AssetType {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_kind: String,
    pub asset_type_id: Uuid,
    pub balance: BigDecimal,
    pub is_active: bool,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub user_wallet_id: Uuid,
    pub system_wallet_id: Uuid,
    pub amount: BigDecimal,
    pub reference_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: &str,
        user_wallet_id: Uuid,
        system_wallet_id: Uuid,
        amount: BigDecimal,
        reference_id: Option<String>,
        idempotency_key: Option<String>,
        description: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            status: STATUS_PENDING.to_string(),
            user_wallet_id,
            system_wallet_id,
            amount,
            reference_id,
            idempotency_key,
            description,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub side: String,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub id: Uuid,
    pub key: String,
    pub request_path: String,
    pub response_status: i32,
    pub response_body: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

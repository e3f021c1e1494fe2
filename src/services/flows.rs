//! The transactional mutation engine. Topup, bonus and spend share one
//! template: duplicate check, lock both wallets, validate, insert the
//! pending transaction, post a debit and a credit, mark completed. The
//! whole template runs inside a single database transaction that either
//! commits everything or leaves no trace.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{EntrySide, LedgerEntry, Transaction, Wallet};
use crate::db::queries;
use crate::error::{classify_db_error, is_unique_violation, AppError};

const IDEMPOTENCY_KEY_CONSTRAINT: &str = "transactions_idempotency_key_unique";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Topup,
    Bonus,
    Spend,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Topup => "topup",
            FlowKind::Bonus => "bonus",
            FlowKind::Spend => "spend",
        }
    }

    /// Spend burns user credits into a system wallet; topup and bonus issue
    /// credits out of a system wallet.
    pub fn debits_user_wallet(&self) -> bool {
        matches!(self, FlowKind::Spend)
    }
}

#[derive(Debug)]
pub struct FlowRequest {
    pub kind: FlowKind,
    pub user_wallet_id: Uuid,
    pub system_wallet_id: Uuid,
    pub amount: BigDecimal,
    pub reference_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct CompletedFlow {
    pub transaction: Transaction,
    /// Debit first, then credit.
    pub entries: Vec<LedgerEntry>,
    /// True when an already-committed transaction with the same idempotency
    /// key was returned instead of running the flow.
    pub replayed: bool,
}

#[derive(Clone)]
pub struct FlowEngine {
    pool: PgPool,
}

impl FlowEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn execute(&self, request: FlowRequest) -> Result<CompletedFlow, AppError> {
        if request.user_wallet_id == request.system_wallet_id {
            return Err(AppError::validation(
                "systemWalletId",
                "must differ from walletId",
            ));
        }
        if request.amount <= BigDecimal::from(0) {
            return Err(AppError::validation("amount", "must be greater than zero"));
        }

        let mut tx = self.pool.begin().await?;

        // A transaction already committed under this key wins outright.
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = queries::find_transaction_by_key_tx(&mut tx, key).await? {
                tx.rollback().await?;
                return self.replay(existing).await;
            }
        }

        let locked =
            queries::lock_wallet_pair(&mut tx, request.user_wallet_id, request.system_wallet_id)
                .await?;
        let (user_wallet, system_wallet) = classify_pair(locked, &request)?;
        let (source, target) = if request.kind.debits_user_wallet() {
            (user_wallet, system_wallet)
        } else {
            (system_wallet, user_wallet)
        };

        check_preconditions(&source, &target, &request.amount)?;

        let pending = Transaction::new(
            request.kind.as_str(),
            request.user_wallet_id,
            request.system_wallet_id,
            request.amount.clone(),
            request.reference_id.clone(),
            request.idempotency_key.clone(),
            request.description.clone(),
            request.metadata.clone(),
        );

        let inserted = match queries::insert_pending_transaction(&mut tx, &pending).await {
            Ok(row) => row,
            // Another request with the same key committed first. Abort this
            // transaction and hand back the winner's row as a replay.
            Err(err) if is_unique_violation(&err, IDEMPOTENCY_KEY_CONSTRAINT) => {
                tx.rollback().await?;
                let key = request
                    .idempotency_key
                    .as_deref()
                    .unwrap_or_default();
                let winner = queries::find_transaction_by_key(&self.pool, key)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(
                            "idempotency key conflict without a committed transaction".to_string(),
                        )
                    })?;
                return self.replay(winner).await;
            }
            Err(err) => return Err(classify_db_error(err)),
        };

        // Source first; both rows are locked, so the order is conventional.
        let debit = queries::post_entry(&mut tx, &source, EntrySide::Debit, &request.amount, inserted.id)
            .await
            .map_err(classify_db_error)?;
        let credit = queries::post_entry(&mut tx, &target, EntrySide::Credit, &request.amount, inserted.id)
            .await
            .map_err(classify_db_error)?;

        let completed = queries::complete_transaction(&mut tx, inserted.id).await?;

        tx.commit().await?;

        tracing::info!(
            transaction_id = %completed.id,
            kind = %completed.kind,
            amount = %completed.amount,
            source_wallet = %source.id,
            target_wallet = %target.id,
            "flow completed"
        );

        Ok(CompletedFlow {
            transaction: completed,
            entries: vec![debit, credit],
            replayed: false,
        })
    }

    async fn replay(&self, transaction: Transaction) -> Result<CompletedFlow, AppError> {
        let entries = queries::get_entries_for_transaction(&self.pool, transaction.id).await?;
        Ok(CompletedFlow {
            transaction,
            entries,
            replayed: true,
        })
    }
}

/// Split the locked rows back into (user, system) order. The locker returns
/// rows in canonical id order, which has nothing to do with roles.
fn classify_pair(
    locked: Vec<Wallet>,
    request: &FlowRequest,
) -> Result<(Wallet, Wallet), AppError> {
    let mut user_wallet = None;
    let mut system_wallet = None;
    for wallet in locked {
        if wallet.id == request.user_wallet_id {
            user_wallet = Some(wallet);
        } else if wallet.id == request.system_wallet_id {
            system_wallet = Some(wallet);
        }
    }

    match (user_wallet, system_wallet) {
        (Some(user), Some(system)) => Ok((user, system)),
        (None, _) => Err(AppError::NotFound(format!(
            "Wallet {} not found",
            request.user_wallet_id
        ))),
        (_, None) => Err(AppError::NotFound(format!(
            "Wallet {} not found",
            request.system_wallet_id
        ))),
    }
}

fn check_preconditions(
    source: &Wallet,
    target: &Wallet,
    amount: &BigDecimal,
) -> Result<(), AppError> {
    if !source.is_active {
        return Err(AppError::Conflict(format!("wallet {} is inactive", source.id)));
    }
    if !target.is_active {
        return Err(AppError::Conflict(format!("wallet {} is inactive", target.id)));
    }
    if source.asset_type_id != target.asset_type_id {
        return Err(AppError::Conflict(
            "wallets hold different asset types".to_string(),
        ));
    }
    if source.id == target.id {
        return Err(AppError::Conflict("source and target wallets are the same".to_string()));
    }
    if &source.balance < amount {
        return Err(AppError::InsufficientFunds {
            available: source.balance.clone(),
            required: amount.clone(),
        });
    }
    Ok(())
}

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::Wallet;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::transactions::TransactionView;
use crate::handlers::{page_bounds, ApiResponse, PaginationMeta};
use crate::validation::{serde_amount, validate_enum, OWNER_KINDS};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_type: String,
    pub asset_type_id: Uuid,
    #[serde(with = "serde_amount")]
    pub balance: BigDecimal,
    pub is_active: bool,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletView {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            owner_id: wallet.owner_id,
            owner_type: wallet.owner_kind,
            asset_type_id: wallet.asset_type_id,
            balance: wallet.balance,
            is_active: wallet.is_active,
            name: wallet.name,
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub wallet_id: Uuid,
    pub asset_type_id: Uuid,
    #[serde(with = "serde_amount")]
    pub balance: BigDecimal,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletListQuery {
    pub owner_type: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_wallets(
    State(state): State<AppState>,
    Query(query): Query<WalletListQuery>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(owner_type) = query.owner_type.as_deref() {
        validate_enum("ownerType", owner_type, OWNER_KINDS)
            .map_err(|error| AppError::Validation(vec![error]))?;
    }

    let (page, limit, offset) = page_bounds(query.page, query.limit);
    let owner_kind = query.owner_type.as_deref();

    let wallets = queries::list_wallets(&state.db, owner_kind, limit, offset).await?;
    let total = queries::count_wallets(&state.db, owner_kind).await?;

    let views: Vec<WalletView> = wallets.into_iter().map(WalletView::from).collect();
    Ok(Json(ApiResponse::paginated(
        views,
        PaginationMeta::new(page, limit, total),
    )))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Wallet {} not found", id)))?;

    Ok(Json(ApiResponse::new(WalletView::from(wallet))))
}

pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Wallet {} not found", id)))?;

    Ok(Json(ApiResponse::new(BalanceView {
        wallet_id: wallet.id,
        asset_type_id: wallet.asset_type_id,
        balance: wallet.balance,
        is_active: wallet.is_active,
        updated_at: wallet.updated_at,
    })))
}

pub async fn list_wallet_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    // History of an unknown wallet is a 404, not an empty page.
    queries::get_wallet(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Wallet {} not found", id)))?;

    let (page, limit, offset) = page_bounds(query.page, query.limit);

    let transactions =
        queries::list_transactions_for_wallet(&state.db, id, limit, offset).await?;
    let total = queries::count_transactions_for_wallet(&state.db, id).await?;

    let views: Vec<TransactionView> = transactions
        .into_iter()
        .map(TransactionView::from)
        .collect();
    Ok(Json(ApiResponse::paginated(
        views,
        PaginationMeta::new(page, limit, total),
    )))
}

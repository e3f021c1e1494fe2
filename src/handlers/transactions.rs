use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{LedgerEntry, Transaction};
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::{ApiResponse, AppJson};
use crate::middleware::idempotency::{IDEMPOTENCY_KEY_HEADER, REPLAYED_HEADER};
use crate::services::{CompletedFlow, FlowKind, FlowRequest};
use crate::validation::{
    serde_amount, validate_amount, validate_max_len, validate_required, ValidationError,
    DESCRIPTION_MAX_LEN, REFERENCE_ID_MAX_LEN,
};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub user_wallet_id: Uuid,
    pub system_wallet_id: Uuid,
    #[serde(with = "serde_amount")]
    pub amount: BigDecimal,
    pub reference_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<LedgerEntryView>>,
}

impl TransactionView {
    pub fn with_entries(transaction: Transaction, entries: Vec<LedgerEntry>) -> Self {
        let mut view = Self::from(transaction);
        view.entries = Some(entries.into_iter().map(LedgerEntryView::from).collect());
        view
    }
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind,
            status: tx.status,
            user_wallet_id: tx.user_wallet_id,
            system_wallet_id: tx.system_wallet_id,
            amount: tx.amount,
            reference_id: tx.reference_id,
            idempotency_key: tx.idempotency_key,
            description: tx.description,
            metadata: tx.metadata,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
            entries: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryView {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub side: String,
    #[serde(with = "serde_amount")]
    pub amount: BigDecimal,
    #[serde(with = "serde_amount")]
    pub balance_before: BigDecimal,
    #[serde(with = "serde_amount")]
    pub balance_after: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            transaction_id: entry.transaction_id,
            wallet_id: entry.wallet_id,
            side: entry.side,
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupRequest {
    pub wallet_id: Uuid,
    pub system_wallet_id: Uuid,
    #[serde(with = "serde_amount")]
    pub amount: BigDecimal,
    pub reference_id: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusRequest {
    pub wallet_id: Uuid,
    pub system_wallet_id: Uuid,
    #[serde(with = "serde_amount")]
    pub amount: BigDecimal,
    pub reason: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRequest {
    pub wallet_id: Uuid,
    pub system_wallet_id: Uuid,
    #[serde(with = "serde_amount")]
    pub amount: BigDecimal,
    pub service_id: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn topup(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<TopupRequest>,
) -> Result<Response, AppError> {
    let mut errors = Vec::new();
    collect(&mut errors, validate_amount("amount", &payload.amount));
    collect(&mut errors, validate_required("referenceId", &payload.reference_id));
    collect(
        &mut errors,
        validate_max_len("referenceId", &payload.reference_id, REFERENCE_ID_MAX_LEN),
    );
    validate_common(&mut errors, &payload.description, payload.wallet_id, payload.system_wallet_id);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let request = FlowRequest {
        kind: FlowKind::Topup,
        user_wallet_id: payload.wallet_id,
        system_wallet_id: payload.system_wallet_id,
        amount: payload.amount,
        reference_id: Some(payload.reference_id),
        idempotency_key: idempotency_key(&headers),
        description: payload.description,
        metadata: metadata_object(payload.metadata, &[])?,
    };

    let flow = state.flows.execute(request).await?;
    Ok(flow_response(flow))
}

pub async fn bonus(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<BonusRequest>,
) -> Result<Response, AppError> {
    let mut errors = Vec::new();
    collect(&mut errors, validate_amount("amount", &payload.amount));
    collect(&mut errors, validate_required("reason", &payload.reason));
    collect(
        &mut errors,
        validate_max_len("reason", &payload.reason, REFERENCE_ID_MAX_LEN),
    );
    validate_common(&mut errors, &payload.description, payload.wallet_id, payload.system_wallet_id);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let request = FlowRequest {
        kind: FlowKind::Bonus,
        user_wallet_id: payload.wallet_id,
        system_wallet_id: payload.system_wallet_id,
        amount: payload.amount,
        reference_id: None,
        idempotency_key: idempotency_key(&headers),
        description: payload.description,
        metadata: metadata_object(payload.metadata, &[("reason", payload.reason)])?,
    };

    let flow = state.flows.execute(request).await?;
    Ok(flow_response(flow))
}

pub async fn spend(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<SpendRequest>,
) -> Result<Response, AppError> {
    let mut errors = Vec::new();
    collect(&mut errors, validate_amount("amount", &payload.amount));
    collect(&mut errors, validate_required("serviceId", &payload.service_id));
    collect(
        &mut errors,
        validate_max_len("serviceId", &payload.service_id, REFERENCE_ID_MAX_LEN),
    );
    validate_common(&mut errors, &payload.description, payload.wallet_id, payload.system_wallet_id);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let request = FlowRequest {
        kind: FlowKind::Spend,
        user_wallet_id: payload.wallet_id,
        system_wallet_id: payload.system_wallet_id,
        amount: payload.amount,
        reference_id: Some(payload.service_id.clone()),
        idempotency_key: idempotency_key(&headers),
        description: payload.description,
        metadata: metadata_object(payload.metadata, &[("service_id", payload.service_id)])?,
    };

    let flow = state.flows.execute(request).await?;
    Ok(flow_response(flow))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = queries::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))?;
    let entries = queries::get_entries_for_transaction(&state.db, id).await?;

    Ok(Json(ApiResponse::new(TransactionView::with_entries(
        transaction,
        entries,
    ))))
}

fn collect(errors: &mut Vec<ValidationError>, result: Result<(), ValidationError>) {
    if let Err(error) = result {
        errors.push(error);
    }
}

fn validate_common(
    errors: &mut Vec<ValidationError>,
    description: &Option<String>,
    wallet_id: Uuid,
    system_wallet_id: Uuid,
) {
    if let Some(description) = description {
        collect(
            errors,
            validate_max_len("description", description, DESCRIPTION_MAX_LEN),
        );
    }
    if wallet_id == system_wallet_id {
        errors.push(ValidationError::new(
            "systemWalletId",
            "must differ from walletId",
        ));
    }
}

/// Merge flow-specific correlators into the caller's metadata bag.
fn metadata_object(
    metadata: Option<serde_json::Value>,
    extra: &[(&str, String)],
) -> Result<Option<serde_json::Value>, AppError> {
    let mut map = match metadata {
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            return Err(AppError::validation("metadata", "must be an object"));
        }
        None => serde_json::Map::new(),
    };

    for (key, value) in extra {
        map.insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::Value::Object(map)))
    }
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn flow_response(flow: CompletedFlow) -> Response {
    let replayed = flow.replayed;
    let view = TransactionView::with_entries(flow.transaction, flow.entries);
    let mut response =
        (StatusCode::CREATED, Json(ApiResponse::new(view))).into_response();
    if replayed {
        response
            .headers_mut()
            .insert(REPLAYED_HEADER, "true".parse().expect("static header value"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn metadata_merges_correlators() {
        let merged = metadata_object(
            Some(serde_json::json!({"campaign": "summer"})),
            &[("reason", "referral".to_string())],
        )
        .unwrap()
        .unwrap();

        assert_eq!(merged["campaign"], "summer");
        assert_eq!(merged["reason"], "referral");
    }

    #[test]
    fn metadata_rejects_non_objects() {
        let result = metadata_object(Some(serde_json::json!([1, 2])), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn metadata_empty_stays_none() {
        assert_eq!(metadata_object(None, &[]).unwrap(), None);
    }

    #[test]
    fn topup_payload_accepts_string_amount() {
        let payload: TopupRequest = serde_json::from_value(serde_json::json!({
            "walletId": Uuid::new_v4(),
            "systemWalletId": Uuid::new_v4(),
            "amount": "100.50",
            "referenceId": "stripe-111"
        }))
        .unwrap();
        assert_eq!(payload.amount, BigDecimal::from_str("100.50").unwrap());
    }

    #[test]
    fn spend_payload_requires_service_id() {
        let result = serde_json::from_value::<SpendRequest>(serde_json::json!({
            "walletId": Uuid::new_v4(),
            "systemWalletId": Uuid::new_v4(),
            "amount": 10
        }));
        assert!(result.is_err());
    }
}

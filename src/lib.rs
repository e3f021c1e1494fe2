pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod validation;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::middleware::idempotency::{idempotency_middleware, IdempotencyStore};
use crate::middleware::rate_limit::{build_limiter, rate_limit_middleware, IpRateLimiter};
use crate::middleware::request_id::request_id_middleware;
use crate::services::FlowEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub flows: FlowEngine,
    pub idempotency: IdempotencyStore,
    pub rate_limiter: Arc<IpRateLimiter>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pool: sqlx::PgPool, config: &Config) -> Self {
        Self {
            flows: FlowEngine::new(pool.clone()),
            idempotency: IdempotencyStore::new(pool.clone(), config.idempotency_ttl_hours),
            rate_limiter: build_limiter(config),
            db: pool,
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    // Rate limiting wraps idempotency so a throttled request is rejected
    // before anything can be cached under its key.
    let mutations = Router::new()
        .route("/transactions/topup", post(handlers::transactions::topup))
        .route("/transactions/bonus", post(handlers::transactions::bonus))
        .route("/transactions/spend", post(handlers::transactions::spend))
        .layer(from_fn_with_state(state.clone(), idempotency_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let api = Router::new()
        .route("/asset-types", get(handlers::asset_types::list_asset_types))
        .route("/wallets", get(handlers::wallets::list_wallets))
        .route("/wallets/:id", get(handlers::wallets::get_wallet))
        .route("/wallets/:id/balance", get(handlers::wallets::get_wallet_balance))
        .route(
            "/wallets/:id/transactions",
            get(handlers::wallets::list_wallet_transactions),
        )
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .merge(mutations);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

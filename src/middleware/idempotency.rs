//! Response-level idempotency for the mutation endpoints.
//!
//! The first response to a given (key, path) pair is cached in the
//! `idempotency_keys` table; replays are served from the cache verbatim and
//! never reach the flow engine. Server faults (5xx) are never cached, so a
//! client may safely retry them with the same key.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::db::models::IdempotencyRecord;
use crate::error::AppError;
use crate::validation::validate_idempotency_key;
use crate::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REPLAYED_HEADER: &str = "x-idempotency-replayed";

/// Responses are small envelopes; anything beyond this is not worth caching.
const MAX_CACHED_BODY: usize = 1024 * 1024;

#[derive(Clone)]
pub struct IdempotencyStore {
    pool: PgPool,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(pool: PgPool, ttl_hours: i64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Return the cached response for (key, path) if present and unexpired.
    pub async fn lookup(
        &self,
        key: &str,
        path: &str,
    ) -> sqlx::Result<Option<IdempotencyRecord>> {
        sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT * FROM idempotency_keys
            WHERE key = $1 AND request_path = $2 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .bind(path)
        .fetch_optional(&self.pool)
        .await
    }

    /// Best-effort insert; an existing row for (key, path) is left unchanged.
    /// Expired rows are pruned opportunistically on the way in.
    pub async fn store(
        &self,
        key: &str,
        path: &str,
        status: u16,
        body: &serde_json::Value,
    ) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, request_path, response_status, response_body, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (key, request_path) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(path)
        .bind(status as i32)
        .bind(body)
        .bind(Utc::now() + self.ttl)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub async fn idempotency_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = match request
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(key) => key.to_string(),
        None => {
            return AppError::validation("Idempotency-Key", "header is required")
                .into_response();
        }
    };

    if let Err(error) = validate_idempotency_key(&key) {
        return AppError::Validation(vec![error]).into_response();
    }

    let path = request.uri().path().to_string();

    match state.idempotency.lookup(&key, &path).await {
        Ok(Some(record)) => {
            let status = StatusCode::from_u16(record.response_status as u16)
                .unwrap_or(StatusCode::OK);
            let mut response = (status, Json(record.response_body)).into_response();
            response
                .headers_mut()
                .insert(REPLAYED_HEADER, "true".parse().expect("static header value"));
            return response;
        }
        Ok(None) => {}
        Err(error) => {
            // Fail open: the transactions-table key constraint still protects
            // against a duplicate commit.
            tracing::error!(%error, "idempotency lookup failed");
        }
    }

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(%error, "failed to buffer response for idempotency cache");
            return AppError::Internal("response capture failed".to_string()).into_response();
        }
    };

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        if let Err(error) = state
            .idempotency
            .store(&key, &path, status.as_u16(), &value)
            .await
        {
            tracing::error!(%error, "failed to store idempotency response");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

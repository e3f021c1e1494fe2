use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;

use crate::validation::ValidationError;

/// Stable error codes for the API. These are part of the wire contract and
/// must never be renamed or reused.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const CONSTRAINT_VIOLATION: &str = "CONSTRAINT_VIOLATION";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<ValidationError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: BigDecimal,
        required: BigDecimal,
    },

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![ValidationError::new(field, message)])
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::ConstraintViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::InsufficientFunds { .. } => codes::INSUFFICIENT_FUNDS,
            AppError::RateLimited => codes::RATE_LIMIT_EXCEEDED,
            AppError::ConstraintViolation(_) => codes::CONSTRAINT_VIOLATION,
            AppError::Database(_) | AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation(errors) => Some(json!(errors
                .iter()
                .map(|e| json!({ "field": e.field, "message": e.message }))
                .collect::<Vec<_>>())),
            AppError::InsufficientFunds {
                available,
                required,
            } => Some(json!({
                "available": available.to_string(),
                "required": required.to_string(),
            })),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                if cfg!(debug_assertions) {
                    self.to_string()
                } else {
                    "internal server error".to_string()
                }
            }
            _ => self.to_string(),
        }
    }
}

/// Translate datastore faults the flow engine does not handle itself:
/// unique violations become conflicts, the non-negative balance check becomes
/// a constraint violation. Everything else stays an internal database error.
pub fn classify_db_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        let code = db_err.code().map(|c| c.to_string());
        match code.as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!(
                    "uniqueness conflict on {}",
                    db_err.constraint().unwrap_or("unknown constraint")
                ));
            }
            Some("23514") => {
                return AppError::ConstraintViolation(
                    db_err.constraint().unwrap_or("check constraint").to_string(),
                );
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

/// True when `err` is a unique violation on the named constraint.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.public_message(),
        });
        if let Some(details) = self.details() {
            error["details"] = details;
        }

        // requestId is filled in by the request-id middleware.
        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_validation_error_maps_to_422() {
        let error = AppError::validation("amount", "must be greater than zero");
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.code(), codes::VALIDATION_ERROR);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let error = AppError::NotFound("wallet not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.code(), codes::NOT_FOUND);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let error = AppError::Conflict("wallet is inactive".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.code(), codes::CONFLICT);
    }

    #[test]
    fn test_insufficient_funds_carries_details() {
        let error = AppError::InsufficientFunds {
            available: BigDecimal::from_str("600").unwrap(),
            required: BigDecimal::from_str("9999").unwrap(),
        };
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.code(), codes::INSUFFICIENT_FUNDS);

        let details = error.details().unwrap();
        assert_eq!(details["available"], "600");
        assert_eq!(details["required"], "9999");
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let error = AppError::RateLimited;
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error.code(), codes::RATE_LIMIT_EXCEEDED);
    }

    #[test]
    fn test_database_error_maps_to_500() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.code(), codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_validation_details_list_fields() {
        let error = AppError::Validation(vec![
            ValidationError::new("amount", "must be greater than zero"),
            ValidationError::new("walletId", "must be a valid UUID"),
        ]);
        let details = error.details().unwrap();
        let fields: Vec<&str> = details
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["amount", "walletId"]);
    }

    #[tokio::test]
    async fn test_error_response_status() {
        let error = AppError::NotFound("wallet not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_is_unique_violation_rejects_other_errors() {
        assert!(!is_unique_violation(
            &sqlx::Error::RowNotFound,
            "transactions_idempotency_key_unique"
        ));
    }
}

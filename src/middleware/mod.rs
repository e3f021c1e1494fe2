pub mod idempotency;
pub mod rate_limit;
pub mod request_id;

use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub db_pool_min: u32,
    pub db_pool_max: u32,
    /// Seconds to wait for a pooled connection before giving up.
    pub db_acquire_timeout_secs: u64,
    /// Seconds an idle connection may sit in the pool before being closed.
    pub db_idle_timeout_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max: u32,
    pub idempotency_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            db_pool_min: env::var("DB_POOL_MIN")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            db_pool_max: env::var("DB_POOL_MAX")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            db_acquire_timeout_secs: env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            db_idle_timeout_secs: env::var("DB_IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            rate_limit_max: env::var("RATE_LIMIT_MAX")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            idempotency_ttl_hours: env::var("IDEMPOTENCY_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.db_pool_max == 0 || self.db_pool_min > self.db_pool_max {
            anyhow::bail!("DB_POOL_MIN must be <= DB_POOL_MAX and DB_POOL_MAX > 0");
        }
        if self.rate_limit_max == 0 {
            anyhow::bail!("RATE_LIMIT_MAX must be greater than 0");
        }
        if self.idempotency_ttl_hours <= 0 {
            anyhow::bail!("IDEMPOTENCY_TTL_HOURS must be greater than 0");
        }
        Ok(())
    }
}

use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub candidate_pool_limit: usize,
    pub response_timeout_secs: u64,
    pub deadline_sweep_interval_secs: u64,
    pub default_broker_fit: f64,
    pub default_price_fit: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            candidate_pool_limit: parse_or_default("CANDIDATE_POOL_LIMIT", 50)?,
            response_timeout_secs: parse_or_default("RESPONSE_TIMEOUT_SECS", 900)?,
            deadline_sweep_interval_secs: parse_or_default("DEADLINE_SWEEP_INTERVAL_SECS", 30)?,
            default_broker_fit: parse_or_default("DEFAULT_BROKER_FIT", 80.0)?,
            default_price_fit: parse_or_default("DEFAULT_PRICE_FIT", 100.0)?,
        })
    }

    pub fn response_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.response_timeout_secs.min(u32::MAX as u64) as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.deadline_sweep_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            candidate_pool_limit: 50,
            response_timeout_secs: 900,
            deadline_sweep_interval_secs: 30,
            default_broker_fit: 80.0,
            default_price_fit: 100.0,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

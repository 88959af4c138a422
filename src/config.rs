use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub job_queue_size: usize,
    pub event_buffer_size: usize,
    /// Backoff before re-queueing a job no driver could take, in ms.
    pub dispatch_retry_ms: u64,
    /// Load ceiling applied by the fallback rule.
    pub default_max_concurrent: u32,
    /// When true, a delivery completion without a signature is rejected
    /// instead of merely recorded.
    pub enforce_proof_requirements: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            job_queue_size: parse_or_default("JOB_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch_retry_ms: parse_or_default("DISPATCH_RETRY_MS", 250)?,
            default_max_concurrent: parse_or_default("DEFAULT_MAX_CONCURRENT", 3)?,
            enforce_proof_requirements: parse_or_default("ENFORCE_PROOF_REQUIREMENTS", false)?,
        })
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

use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub heartbeat_interval: Duration,
    pub subscriber_buffer: usize,
    pub max_consecutive_drops: u32,
    /// Empty means the request origin is mirrored.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("PORT", "8080")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_ACCESS_TOKEN_SECRET")?,
            access_token_ttl: positive_secs(
                "ACCESS_TOKEN_TTL_SECS",
                try_load("ACCESS_TOKEN_TTL_SECS", "900")?,
            )?,
            heartbeat_interval: positive_secs(
                "SSE_HEARTBEAT_SECS",
                try_load("SSE_HEARTBEAT_SECS", "30")?,
            )?,
            subscriber_buffer: try_load("SUBSCRIBER_BUFFER", "64")?,
            max_consecutive_drops: try_load("MAX_CONSECUTIVE_DROPS", "32")?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }
    })
}

/// Bounded so that `now + secs` stays representable as a JWT `exp`.
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn positive_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 || secs > MAX_DURATION_SECS {
        warn!("Invalid {key} value: {secs}");
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be between 1 and {MAX_DURATION_SECS} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            database_url: "postgres://localhost/live_polls_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl: Duration::from_secs(900),
            heartbeat_interval: Duration::from_secs(30),
            subscriber_buffer: 8,
            max_consecutive_drops: 4,
            cors_origins: Vec::new(),
        }
    }
}

//! Streamer Configuration Settings
//!
//! Client tuning knobs and the standalone-session payload, loaded from
//! environment variables.

use std::time::Duration;

use chrono::{TimeZone, Utc};

use crate::application::ports::SessionParameters;
use crate::infrastructure::streamer::envelope::QosLevel;

/// Client tuning settings.
#[derive(Debug, Clone)]
pub struct StreamerSettings {
    /// Outbound frame queue depth. Writes block (never drop) once full.
    pub outbound_queue: usize,
    /// Bound on the graceful close handshake before the socket is
    /// force-disposed.
    pub close_timeout: Duration,
    /// QoS tier to request right after connecting, if any.
    pub startup_qos: Option<QosLevel>,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            outbound_queue: 64,
            close_timeout: Duration::from_secs(5),
            startup_qos: None,
        }
    }
}

impl StreamerSettings {
    /// Load settings from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            outbound_queue: parse_env_usize("STREAMER_OUTBOUND_QUEUE", defaults.outbound_queue)
                .max(1),
            close_timeout: parse_env_duration_secs(
                "STREAMER_CLOSE_TIMEOUT_SECS",
                defaults.close_timeout,
            ),
            startup_qos: std::env::var("STREAMER_QOS_LEVEL")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(QosLevel::from_i64),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has an unusable value.
    #[error("environment variable {0} has an invalid value")]
    InvalidValue(String),
}

/// Build session parameters from `STREAMER_*` environment variables.
///
/// Intended for standalone runs of the binary, where the session payload
/// is injected by the operator instead of fetched from a live session
/// provider.
///
/// # Errors
///
/// Returns an error when `STREAMER_HOST`, `STREAMER_TOKEN` or
/// `STREAMER_ACCOUNT_ID` are missing, or when the token timestamp does not
/// parse as epoch milliseconds.
pub fn session_from_env() -> Result<SessionParameters, ConfigError> {
    let streamer_host = require_env("STREAMER_HOST")?;
    let token = require_env("STREAMER_TOKEN")?;
    let account_id = require_env("STREAMER_ACCOUNT_ID")?;

    let token_millis: i64 = std::env::var("STREAMER_TOKEN_TIMESTAMP_MS")
        .ok()
        .map_or(Ok(0), |raw| {
            raw.parse()
                .map_err(|_| ConfigError::InvalidValue("STREAMER_TOKEN_TIMESTAMP_MS".to_string()))
        })?;
    let token_timestamp = Utc
        .timestamp_millis_opt(token_millis)
        .single()
        .ok_or_else(|| ConfigError::InvalidValue("STREAMER_TOKEN_TIMESTAMP_MS".to_string()))?;

    Ok(SessionParameters {
        streamer_host,
        token,
        token_timestamp,
        user_group: optional_env("STREAMER_USER_GROUP"),
        access_level: optional_env("STREAMER_ACCESS_LEVEL"),
        app_id: optional_env("STREAMER_APP_ID"),
        acl: optional_env("STREAMER_ACL"),
        account_id,
        account_cd_domain_id: optional_env("STREAMER_ACCOUNT_CD_DOMAIN_ID"),
        company: optional_env("STREAMER_COMPANY"),
        segment: optional_env("STREAMER_SEGMENT"),
    })
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::MissingEnvVar(key.to_string()));
    }
    Ok(value)
}

fn optional_env(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

//! Client configuration loaded from environment.

use std::time::Duration;

use url::Url;

use crate::services::backoff::{ReconnectPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS};

/// Used when neither an override nor an API base URL is configured.
pub const FALLBACK_ENDPOINT: &str = "ws://localhost:8000/ws/builds";

/// Path of the build event stream on the API host.
pub const BUILDS_WS_PATH: &str = "/ws/builds";

/// Client configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Live-update endpoint (e.g. `ws://localhost:8000/ws/builds`).
    pub endpoint: String,
    /// First reconnect delay; doubles with every further attempt.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect attempts before the client gives up.
    pub max_reconnect_attempts: u32,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint = resolve_endpoint(
            var("BUILD_WS_URL").as_deref(),
            var("API_BASE_URL").as_deref(),
        )?;
        let reconnect_base_delay_ms = match var("RECONNECT_BASE_DELAY_MS") {
            Some(v) => parse_number("RECONNECT_BASE_DELAY_MS", &v)?,
            None => DEFAULT_BASE_DELAY_MS,
        };
        let max_reconnect_attempts = match var("MAX_RECONNECT_ATTEMPTS") {
            Some(v) => parse_number("MAX_RECONNECT_ATTEMPTS", &v)?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let log_level = var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            endpoint,
            reconnect_base_delay_ms,
            max_reconnect_attempts,
            log_level,
        })
    }

    /// Fresh backoff state for a new client.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            self.max_reconnect_attempts,
        )
    }
}

/// Pick the live-update endpoint: the override verbatim, else derived from the
/// REST API host, else [`FALLBACK_ENDPOINT`].
///
/// The override is not validated; a bad address surfaces as a transport error
/// on the first connect.
pub fn resolve_endpoint(
    endpoint_override: Option<&str>,
    api_base_url: Option<&str>,
) -> Result<String, ConfigLoadError> {
    if let Some(endpoint) = endpoint_override {
        return Ok(endpoint.to_string());
    }

    match api_base_url {
        Some(base) => derive_endpoint(base),
        None => Ok(FALLBACK_ENDPOINT.to_string()),
    }
}

/// `http://host:8000/api/v1` -> `ws://host:8000/ws/builds`.
fn derive_endpoint(api_base_url: &str) -> Result<String, ConfigLoadError> {
    let invalid = || ConfigLoadError::InvalidApiBase(api_base_url.to_string());
    let url = Url::parse(api_base_url).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid()),
    };
    let host = url.host_str().ok_or_else(invalid)?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok(format!("{}://{}{}", scheme, authority, BUILDS_WS_PATH))
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigLoadError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigLoadError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid API_BASE_URL: {0}")]
    InvalidApiBase(String),
    #[error("Invalid {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

//! Gateway configuration types.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Requests admitted per principal per minute.
    #[serde(default = "GatewayConfig::default_rate_limit")]
    pub rate_limit_per_minute: u64,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_rate_limit() -> u64 {
        600
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Build a configuration from `LISTEN_ADDR`, `CORS_ORIGINS` (comma
    /// separated), `RATE_LIMIT_PER_MINUTE`, `MAX_BODY_BYTES` and
    /// `REQUEST_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup("RATE_LIMIT_PER_MINUTE") {
            config.rate_limit_per_minute = parse_var("RATE_LIMIT_PER_MINUTE", &raw)?;
        }
        if let Some(raw) = lookup("MAX_BODY_BYTES") {
            config.max_body_bytes = parse_var("MAX_BODY_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout_seconds = parse_var("REQUEST_TIMEOUT_SECONDS", &raw)?;
        }
        Ok(config)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// A malformed configuration variable.
#[derive(Debug, Error)]
#[error("invalid value for {key}: {value}")]
pub struct ConfigError {
    /// Variable name.
    pub key: &'static str,
    /// Offending value.
    pub value: String,
}

fn parse_var<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError {
        key,
        value: raw.to_string(),
    })
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            rate_limit_per_minute: Self::default_rate_limit(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.rate_limit_per_minute, 600);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_deserialize_keeps_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"rate_limit_per_minute": 5}"#).unwrap();
        assert_eq!(config.rate_limit_per_minute, 5);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = GatewayConfig::from_lookup(|key| match key {
            "CORS_ORIGINS" => Some("https://a.example, https://b.example,".to_string()),
            "RATE_LIMIT_PER_MINUTE" => Some("42".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rate_limit_per_minute, 42);
        assert_eq!(config.request_timeout_seconds, 30);
    }

    #[test]
    fn lookup_rejects_bad_numbers() {
        let err = GatewayConfig::from_lookup(|key| {
            (key == "MAX_BODY_BYTES").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert_eq!(err.key, "MAX_BODY_BYTES");
    }
}

//! Authorizer configuration.
//!
//! Configuration is loaded from environment variables. The usage
//! identifier key is redacted in Debug output.

use crate::auth::verifier::ClaimPolicy;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default principal reported in every decision.
pub const DEFAULT_PRINCIPAL_ID: &str = "user";

/// Default timeout in seconds for discovery and JWKS requests.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Maximum allowed HTTP timeout in seconds.
pub const MAX_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Default clock skew tolerance in seconds for `exp` / `nbf`.
pub const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 0;

/// Maximum allowed clock skew tolerance in seconds (10 minutes).
pub const MAX_CLOCK_SKEW_SECONDS: u64 = 600;

/// Authorizer configuration.
#[derive(Clone)]
pub struct Config {
    /// URL of the identity provider's OpenID discovery document.
    pub oidc_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Usage plan key echoed in every policy document.
    pub usage_identifier_key: String,

    /// Principal reported in every decision (default: "user").
    pub principal_id: String,

    /// Timeout for each discovery / JWKS request.
    pub http_timeout: Duration,

    /// Leeway in seconds applied to `exp` / `nbf`.
    pub jwt_clock_skew_seconds: u64,

    /// Accepted issuers; unset disables the issuer check.
    pub expected_issuers: Option<Vec<String>>,

    /// Accepted audiences; unset disables the audience check.
    pub expected_audiences: Option<Vec<String>>,

    /// Seconds to keep serving after a shutdown signal (default: 0).
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("oidc_url", &self.oidc_url)
            .field("bind_address", &self.bind_address)
            .field("usage_identifier_key", &"[REDACTED]")
            .field("principal_id", &self.principal_id)
            .field("http_timeout", &self.http_timeout)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("expected_issuers", &self.expected_issuers)
            .field("expected_audiences", &self.expected_audiences)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid OIDC URL: {0}")]
    InvalidOidcUrl(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid drain configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let oidc_url = vars
            .get("OIDC_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OIDC_URL".to_string()))?
            .trim()
            .to_string();

        if !(oidc_url.starts_with("https://") || oidc_url.starts_with("http://")) {
            return Err(ConfigError::InvalidOidcUrl(format!(
                "OIDC_URL must be an http(s) URL, got '{}'",
                oidc_url
            )));
        }

        let usage_identifier_key = vars
            .get("USAGE_IDENTIFIER_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("USAGE_IDENTIFIER_KEY".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let principal_id = vars
            .get("PRINCIPAL_ID")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRINCIPAL_ID.to_string());

        // Parse HTTP timeout with validation
        let http_timeout_seconds = if let Some(value_str) = vars.get("HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidHttpTimeout(
                    "HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_HTTP_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidHttpTimeout(format!(
                    "HTTP_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                    MAX_HTTP_TIMEOUT_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_HTTP_TIMEOUT_SECONDS
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW_SECONDS {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW_SECONDS
        };

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        Ok(Config {
            oidc_url,
            bind_address,
            usage_identifier_key,
            principal_id,
            http_timeout: Duration::from_secs(http_timeout_seconds),
            jwt_clock_skew_seconds,
            expected_issuers: parse_list(vars.get("EXPECTED_ISSUER")),
            expected_audiences: parse_list(vars.get("EXPECTED_AUDIENCE")),
            drain_seconds,
        })
    }

    /// Claim checks derived from this configuration.
    pub fn claim_policy(&self) -> ClaimPolicy {
        ClaimPolicy {
            leeway_seconds: self.jwt_clock_skew_seconds,
            issuers: self.expected_issuers.clone(),
            audiences: self.expected_audiences.clone(),
        }
    }
}

/// Split a comma-separated value; empty or blank input yields `None`.
fn parse_list(value: Option<&String>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "OIDC_URL".to_string(),
                "https://idp.example.com/.well-known/openid-configuration".to_string(),
            ),
            (
                "USAGE_IDENTIFIER_KEY".to_string(),
                "usage-key-secret".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(
            config.oidc_url,
            "https://idp.example.com/.well-known/openid-configuration"
        );
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.usage_identifier_key, "usage-key-secret");
        assert_eq!(config.principal_id, "user");
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.jwt_clock_skew_seconds, 0);
        assert!(config.expected_issuers.is_none());
        assert!(config.expected_audiences.is_none());
        assert_eq!(config.drain_seconds, 0);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("PRINCIPAL_ID".to_string(), "gateway-user".to_string());
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert(
            "EXPECTED_ISSUER".to_string(),
            "https://idp.example.com".to_string(),
        );
        vars.insert(
            "EXPECTED_AUDIENCE".to_string(),
            "api-one, api-two,,".to_string(),
        );
        vars.insert("DRAIN_SECONDS".to_string(), "15".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.principal_id, "gateway-user");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.jwt_clock_skew_seconds, 120);
        assert_eq!(
            config.expected_issuers,
            Some(vec!["https://idp.example.com".to_string()])
        );
        assert_eq!(
            config.expected_audiences,
            Some(vec!["api-one".to_string(), "api-two".to_string()])
        );
        assert_eq!(config.drain_seconds, 15);

        let policy = config.claim_policy();
        assert_eq!(policy.leeway_seconds, 120);
        assert_eq!(policy.audiences, config.expected_audiences);
    }

    #[test]
    fn test_from_vars_missing_oidc_url() {
        let mut vars = base_vars();
        vars.remove("OIDC_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "OIDC_URL"));
    }

    #[test]
    fn test_from_vars_blank_oidc_url() {
        let mut vars = base_vars();
        vars.insert("OIDC_URL".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "OIDC_URL"));
    }

    #[test]
    fn test_from_vars_rejects_non_http_oidc_url() {
        let mut vars = base_vars();
        vars.insert("OIDC_URL".to_string(), "ftp://idp.example.com".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidOidcUrl(_))));
    }

    #[test]
    fn test_from_vars_missing_usage_identifier_key() {
        let mut vars = base_vars();
        vars.remove("USAGE_IDENTIFIER_KEY");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "USAGE_IDENTIFIER_KEY")
        );
    }

    #[test]
    fn test_http_timeout_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidHttpTimeout(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_http_timeout_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "61".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidHttpTimeout(msg)) if msg.contains("must not exceed 60"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_accepts_zero_and_max() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().jwt_clock_skew_seconds, 0);

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "-5".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwtClockSkew(_))));
    }

    #[test]
    fn test_blank_audience_list_disables_check() {
        let mut vars = base_vars();
        vars.insert("EXPECTED_AUDIENCE".to_string(), " , ".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.expected_audiences.is_none());
    }

    #[test]
    fn test_debug_redacts_usage_identifier_key() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("usage-key-secret"));
    }
}

//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults target a local Redis.
//!
//! - `IAM_HOST` - Bind address (default: 127.0.0.1)
//! - `IAM_PORT` - Listen port (default: 8080)
//! - `IAM_STORE` - `redis` or `memory` (default: redis)
//! - `IAM_REDIS_HOST` - Redis host (default: localhost)
//! - `IAM_REDIS_PORT` - Redis port (default: 6379)
//! - `IAM_REDIS_DB` - Redis logical database (default: 0)
//! - `IAM_REDIS_PASSWORD` - Redis password
//! - `IAM_SSO_CONFIRM_URL` - Where a successful login is redirected
//!   (default: <https://sso.shapley.io/confirm>)
//! - `IAM_REQUEST_TIMEOUT_MS` - Per-request deadline for backend calls (default: 5000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_SSO_CONFIRM_URL: &str = "https://sso.shapley.io/confirm";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which key-value backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Redis at `IAM_REDIS_*`.
    Redis,
    /// In-process map; data is lost on restart.
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'redis' or 'memory', got '{other}'")),
        }
    }
}

/// IAM service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Backend selection
    pub store: StoreKind,
    /// Redis connection settings
    pub redis: RedisConfig,
    /// External SSO confirmation endpoint
    pub sso_confirm_url: Url,
    /// Deadline applied to every request's backend calls
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
}

/// Redis connection settings.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<SecretString>,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RedisConfig {
    /// `redis://` URL for the client. Contains the password, hence secret.
    #[must_use]
    pub fn connection_url(&self) -> SecretString {
        let auth = self
            .password
            .as_ref()
            .map(|pw| format!(":{}@", encode_userinfo(pw.expose_secret())))
            .unwrap_or_default();
        SecretString::from(format!(
            "redis://{auth}{}:{}/{}",
            self.host, self.port, self.db
        ))
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("IAM_HOST", "127.0.0.1")?;
        let port = parse_env("IAM_PORT", "8080")?;
        let store = parse_env("IAM_STORE", "redis")?;
        let redis = RedisConfig {
            host: get_env_or_default("IAM_REDIS_HOST", "localhost"),
            port: parse_env("IAM_REDIS_PORT", "6379")?,
            db: parse_env("IAM_REDIS_DB", "0")?,
            password: get_optional_env("IAM_REDIS_PASSWORD").map(SecretString::from),
        };
        let sso_confirm_url = parse_env("IAM_SSO_CONFIRM_URL", DEFAULT_SSO_CONFIRM_URL)?;
        let timeout_ms: u64 = parse_env("IAM_REQUEST_TIMEOUT_MS", "5000")?;

        Ok(Self {
            host,
            port,
            store,
            redis,
            sso_confirm_url,
            request_timeout: Duration::from_millis(timeout_ms),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Percent-encode characters that would break the userinfo part of a URL.
fn encode_userinfo(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn redis(password: Option<&str>) -> RedisConfig {
        RedisConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            db: 2,
            password: password.map(|p| SecretString::from(p.to_string())),
        }
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<u16>("IAM_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("IAM_PORT"));
    }

    #[test]
    fn test_store_kind_from_str() {
        assert_eq!("redis".parse::<StoreKind>(), Ok(StoreKind::Redis));
        assert_eq!("Memory".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert!("postgres".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_sso_url_must_be_absolute() {
        assert!(parse_value::<Url>("IAM_SSO_CONFIRM_URL", "/confirm").is_err());
        let url: Url = parse_value("IAM_SSO_CONFIRM_URL", DEFAULT_SSO_CONFIRM_URL).unwrap();
        assert_eq!(url.host_str(), Some("sso.shapley.io"));
    }

    #[test]
    fn test_connection_url_without_password() {
        let url = redis(None).connection_url();
        assert_eq!(url.expose_secret(), "redis://cache.internal:6380/2");
    }

    #[test]
    fn test_connection_url_encodes_password() {
        let url = redis(Some("p@ss:word")).connection_url();
        assert_eq!(
            url.expose_secret(),
            "redis://:p%40ss%3Aword@cache.internal:6380/2"
        );
    }

    #[test]
    fn test_redis_config_debug_redacts_password() {
        let debug_output = format!("{:?}", redis(Some("hunter2")));

        assert!(debug_output.contains("cache.internal"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            store: StoreKind::Memory,
            redis: redis(None),
            sso_confirm_url: Url::parse(DEFAULT_SSO_CONFIRM_URL).unwrap(),
            request_timeout: Duration::from_secs(5),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }
}

//! Gateway configuration.
//!
//! Every struct has production defaults and a `from_env()` constructor that
//! reads `DIRECT_*` variables; unparseable values fall back to the default.

use std::str::FromStr;
use std::time::Duration;

use reqwest::Method;

use crate::error::{GatewayError, GatewayResult};

/// Default API base URL (the endpoint name is appended).
pub const DEFAULT_API_URL: &str = "https://api.direct.yandex.com/json/v5";

/// Default OAuth token endpoint.
pub const DEFAULT_OAUTH_URL: &str = "https://oauth.yandex.ru/token";

/// Default OAuth response field holding the token.
pub const DEFAULT_TOKEN_FIELD: &str = "access_token";

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list_or<T: FromStr>(name: &str, default: Vec<T>) -> Vec<T> {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    let parsed: Result<Vec<T>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();
    parsed.unwrap_or(default)
}

// =============================================================================
// Transport
// =============================================================================

/// HTTP-level retry policy for network failures and selected status codes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRetryConfig {
    /// Upper bound on retries of any kind
    pub total: u32,
    /// Retries on a status code from `status_forcelist`
    pub status: u32,
    /// Retries on connection failures and timeouts
    pub connect: u32,
    /// Delay before retry `n` is `backoff_factor * 2^(n-1)`
    pub backoff_factor: Duration,
    /// Backoff cap
    pub backoff_max: Duration,
    /// Status codes that trigger a retry
    pub status_forcelist: Vec<u16>,
}

impl Default for TransportRetryConfig {
    fn default() -> Self {
        Self {
            total: 10,
            status: 3,
            connect: 3,
            backoff_factor: Duration::from_millis(500),
            backoff_max: Duration::from_secs(120),
            status_forcelist: vec![500, 502, 524, 423, 400],
        }
    }
}

impl TransportRetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            total: env_or("DIRECT_RETRY_TOTAL", defaults.total),
            status: env_or("DIRECT_RETRY_STATUS", defaults.status),
            connect: env_or("DIRECT_RETRY_CONNECT", defaults.connect),
            backoff_factor: Duration::from_millis(env_or(
                "DIRECT_RETRY_BACKOFF_MS",
                defaults.backoff_factor.as_millis() as u64,
            )),
            backoff_max: Duration::from_millis(env_or(
                "DIRECT_RETRY_BACKOFF_MAX_MS",
                defaults.backoff_max.as_millis() as u64,
            )),
            status_forcelist: env_list_or("DIRECT_RETRY_STATUS_CODES", defaults.status_forcelist),
        }
    }

    /// Whether a response with this status should be retried.
    pub fn retries_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Delay before the given retry (1-based).
    pub fn delay(&self, retry_number: u32) -> Duration {
        let shift = retry_number.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(1u32 << shift)
            .min(self.backoff_max)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.status > self.total || self.connect > self.total {
            return Err(GatewayError::config_error(format!(
                "status ({}) and connect ({}) retries cannot exceed total retries ({})",
                self.status, self.connect, self.total
            )));
        }
        if let Some(code) = self
            .status_forcelist
            .iter()
            .find(|code| (200..300).contains(*code))
        {
            return Err(GatewayError::config_error(format!(
                "success status {} cannot be retried",
                code
            )));
        }
        Ok(())
    }
}

/// Authenticated transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Worker pool size (concurrent in-flight pooled requests)
    pub pool_size: usize,
    /// Methods `send` accepts
    pub allowed_methods: Vec<Method>,
    pub retry: TransportRetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            pool_size: 4,
            allowed_methods: vec![
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::DELETE,
                Method::PUT,
            ],
            retry: TransportRetryConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let allowed_methods = std::env::var("DIRECT_ALLOWED_METHODS")
            .ok()
            .and_then(|raw| {
                raw.split(',')
                    .map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()))
                    .collect::<Result<Vec<_>, _>>()
                    .ok()
            })
            .unwrap_or(defaults.allowed_methods);

        Self {
            timeout: Duration::from_secs(env_or(
                "DIRECT_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            connect_timeout: Duration::from_secs(env_or(
                "DIRECT_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            pool_size: env_or("DIRECT_POOL_SIZE", defaults.pool_size),
            allowed_methods,
            retry: TransportRetryConfig::from_env(),
        }
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.pool_size == 0 {
            return Err(GatewayError::config_error("pool size must be at least 1"));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(GatewayError::config_error("timeouts must be positive"));
        }
        if self.allowed_methods.is_empty() {
            return Err(GatewayError::config_error("no HTTP methods allowed"));
        }
        self.retry.validate()
    }
}

// =============================================================================
// Soft-error retry
// =============================================================================

/// Retry policy for in-band error codes returned with HTTP 200.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftRetryConfig {
    /// `error_code` values that trigger a retry
    pub codes: Vec<i64>,
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_factor * ((max_retries - 1)^2)^n`
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
}

impl Default for SoftRetryConfig {
    fn default() -> Self {
        Self {
            codes: vec![52, 1000, 1001, 1002],
            max_retries: 3,
            backoff_factor: Duration::from_millis(100),
            backoff_max: Duration::from_secs(60),
        }
    }
}

impl SoftRetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            codes: env_list_or("DIRECT_SOFT_RETRY_CODES", defaults.codes),
            max_retries: env_or("DIRECT_SOFT_RETRY_MAX", defaults.max_retries),
            backoff_factor: Duration::from_millis(env_or(
                "DIRECT_SOFT_RETRY_BACKOFF_MS",
                defaults.backoff_factor.as_millis() as u64,
            )),
            backoff_max: Duration::from_millis(env_or(
                "DIRECT_SOFT_RETRY_BACKOFF_MAX_MS",
                defaults.backoff_max.as_millis() as u64,
            )),
        }
    }

    pub fn is_retryable(&self, code: i64) -> bool {
        self.codes.contains(&code)
    }

    /// Delay before the given retry (1-based).
    pub fn delay(&self, retry_number: u32) -> Duration {
        let growth = self.max_retries.saturating_sub(1).saturating_pow(2);
        self.backoff_factor
            .saturating_mul(growth.saturating_pow(retry_number))
            .min(self.backoff_max)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.codes.is_empty() {
            return Err(GatewayError::config_error(
                "soft retry needs at least one error code",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Ad platform gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Versioned API base URL
    pub api_url: String,
    /// OAuth token endpoint
    pub oauth_url: String,
    /// OAuth response field holding the token
    pub token_field: String,
    pub transport: TransportConfig,
    pub soft_retry: SoftRetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            token_field: DEFAULT_TOKEN_FIELD.to_string(),
            transport: TransportConfig::default(),
            soft_retry: SoftRetryConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("DIRECT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            oauth_url: std::env::var("DIRECT_OAUTH_URL")
                .unwrap_or_else(|_| DEFAULT_OAUTH_URL.to_string()),
            token_field: std::env::var("DIRECT_OAUTH_TOKEN_FIELD")
                .unwrap_or_else(|_| DEFAULT_TOKEN_FIELD.to_string()),
            transport: TransportConfig::from_env(),
            soft_retry: SoftRetryConfig::from_env(),
        }
    }

    /// Point both API and OAuth endpoints at a local base URL.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_url = format!("{}/json/v5", base);
        self.oauth_url = format!("{}/token", base);
        self
    }

    pub fn validate(&self) -> GatewayResult<()> {
        for (name, value) in [("api_url", &self.api_url), ("oauth_url", &self.oauth_url)] {
            url::Url::parse(value).map_err(|e| {
                GatewayError::config_error(format!("{} '{}' is not a valid URL: {}", name, value, e))
            })?;
        }
        if self.token_field.is_empty() {
            return Err(GatewayError::config_error("token field name cannot be empty"));
        }
        self.transport.validate()?;
        self.soft_retry.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

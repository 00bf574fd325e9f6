//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ANTHROPIC_API_KEY` - Claude API key used for distance estimation
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection
//!   string; without one the embedded in-memory store is used
//! - `CLAUDE_MODEL` - Model name (default: claude-sonnet-4-20250514)
//! - `CLAUDE_API_URL` - Messages endpoint (default: Anthropic)
//! - `DELIVERY_ORIGIN_ADDRESS` - Where deliveries start (default: the farm)
//! - `DELIVERY_RATE_PER_KM` - Shillings per km (default: 250)
//! - `DELIVERY_MIN_FEE` / `DELIVERY_MAX_FEE` - Fee bounds (default: 1500 / 6000)
//! - `DELIVERY_ROUNDING_STEP` - Fee granularity (default: 100)
//! - `DELIVERY_MIN_ADDRESS_LEN` - Shortest address worth resolving (default: 10)
//! - `DELIVERY_DEBOUNCE_MS` - Quiet period before resolving (default: 1000)
//! - `DELIVERY_RETRY_ATTEMPTS` - Resolver attempts (default: 3)
//! - `DELIVERY_RETRY_BASE_DELAY_MS` - First retry delay (default: 500)
//! - `CHECKOUT_SESSION_IDLE_SECS` - Abandoned session expiry (default: 1800)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use mbuli_core::Tzs;

use crate::delivery::estimator::{DEFAULT_MIN_ADDRESS_LEN, DEFAULT_ORIGIN};
use crate::delivery::pricing::{
    DEFAULT_MAX_FEE, DEFAULT_MIN_FEE, DEFAULT_RATE_PER_KM, DEFAULT_ROUNDING_STEP,
};
use crate::delivery::recalculator::DEFAULT_DEBOUNCE;
use crate::delivery::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::delivery::{PricingPolicy, RetryPolicy};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_SESSION_IDLE_SECS: u64 = 1_800;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` connection URL (contains password); `None` selects the
    /// embedded store
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Claude API configuration
    pub claude: ClaudeConfig,
    /// Delivery-fee estimation settings
    pub delivery: DeliveryConfig,
    /// How long an untouched checkout session lives
    pub session_idle_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Claude API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ClaudeConfig {
    pub api_key: SecretString,
    pub model: String,
    pub api_url: Url,
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_url", &self.api_url.as_str())
            .finish()
    }
}

/// Delivery-fee estimation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub origin: String,
    pub pricing: PricingPolicy,
    pub min_address_len: usize,
    pub debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            pricing: PricingPolicy::default(),
            min_address_len: DEFAULT_MIN_ADDRESS_LEN,
            debounce: DEFAULT_DEBOUNCE,
            retry: RetryPolicy::default(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL");
        let host = get_parsed_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let claude = ClaudeConfig::from_env()?;
        let delivery = DeliveryConfig::from_env()?;
        let session_idle_timeout = Duration::from_secs(get_parsed_or_default(
            "CHECKOUT_SESSION_IDLE_SECS",
            &DEFAULT_SESSION_IDLE_SECS.to_string(),
        )?);

        Ok(Self {
            database_url,
            host,
            port,
            claude,
            delivery,
            session_idle_timeout,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ClaudeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("ANTHROPIC_API_KEY")?,
            model: get_env_or_default("CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
            api_url: get_parsed_or_default("CLAUDE_API_URL", DEFAULT_CLAUDE_API_URL)?,
        })
    }
}

impl DeliveryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let rate = get_parsed_or_default("DELIVERY_RATE_PER_KM", &DEFAULT_RATE_PER_KM.to_string())?;
        let min = get_parsed_or_default("DELIVERY_MIN_FEE", &DEFAULT_MIN_FEE.to_string())?;
        let max = get_parsed_or_default("DELIVERY_MAX_FEE", &DEFAULT_MAX_FEE.to_string())?;
        let step =
            get_parsed_or_default("DELIVERY_ROUNDING_STEP", &DEFAULT_ROUNDING_STEP.to_string())?;
        let attempts =
            get_parsed_or_default("DELIVERY_RETRY_ATTEMPTS", &DEFAULT_MAX_ATTEMPTS.to_string())?;
        let base_delay_ms = get_parsed_or_default(
            "DELIVERY_RETRY_BASE_DELAY_MS",
            &DEFAULT_BASE_DELAY.as_millis().to_string(),
        )?;
        let debounce_ms = get_parsed_or_default(
            "DELIVERY_DEBOUNCE_MS",
            &DEFAULT_DEBOUNCE.as_millis().to_string(),
        )?;

        Ok(Self {
            origin: get_env_or_default("DELIVERY_ORIGIN_ADDRESS", DEFAULT_ORIGIN),
            pricing: build_pricing(rate, min, max, step)?,
            min_address_len: get_parsed_or_default(
                "DELIVERY_MIN_ADDRESS_LEN",
                &DEFAULT_MIN_ADDRESS_LEN.to_string(),
            )?,
            debounce: Duration::from_millis(debounce_ms),
            retry: build_retry(attempts, base_delay_ms)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn build_pricing(rate: u32, min: u32, max: u32, step: u32) -> Result<PricingPolicy, ConfigError> {
    PricingPolicy::new(
        Tzs::from_shillings(rate),
        Tzs::from_shillings(min),
        Tzs::from_shillings(max),
        Tzs::from_shillings(step),
    )
    .map_err(|e| ConfigError::InvalidEnvVar("DELIVERY_*_FEE".to_string(), e.to_string()))
}

fn build_retry(attempts: u32, base_delay_ms: u64) -> Result<RetryPolicy, ConfigError> {
    if attempts == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "DELIVERY_RETRY_ATTEMPTS".to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(RetryPolicy::new(
        attempts,
        Duration::from_millis(base_delay_ms),
    ))
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-anthropic-key-here", "ANTHROPIC_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "ANTHROPIC_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("sk-ant-REDACTED", "ANTHROPIC_API_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u16>("STOREFRONT_PORT", "eighty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "STOREFRONT_PORT"));
        assert_eq!(parse_value::<u16>("STOREFRONT_PORT", " 8080 ").unwrap(), 8080);
    }

    #[test]
    fn test_build_pricing_rejects_inverted_bounds() {
        assert!(build_pricing(250, 6_000, 1_500, 100).is_err());
        assert_eq!(build_pricing(250, 1_500, 6_000, 100).unwrap(), PricingPolicy::default());
    }

    #[test]
    fn test_build_retry_rejects_zero_attempts() {
        assert!(build_retry(0, 500).is_err());
        assert_eq!(build_retry(3, 500).unwrap(), RetryPolicy::default());
    }

    #[test]
    fn test_delivery_defaults() {
        let delivery = DeliveryConfig::default();
        assert_eq!(delivery.debounce, Duration::from_secs(1));
        assert_eq!(delivery.min_address_len, 10);
        assert!(delivery.origin.contains("Mbezi Beach"));
    }

    #[test]
    fn test_claude_config_debug_redacts_key() {
        let config = ClaudeConfig {
            api_key: SecretString::from("sk-ant-super-private"),
            model: DEFAULT_CLAUDE_MODEL.to_string(),
            api_url: Url::parse(DEFAULT_CLAUDE_API_URL).unwrap(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-private"));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: None,
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            claude: ClaudeConfig {
                api_key: SecretString::from("sk-ant-test"),
                model: DEFAULT_CLAUDE_MODEL.to_string(),
                api_url: Url::parse(DEFAULT_CLAUDE_API_URL).unwrap(),
            },
            delivery: DeliveryConfig::default(),
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}

//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STORE_BASE_URL` - Public URL of the storefront (used in download links)
//! - `STORE_FILES_DIR` - Directory holding the deliverable product files
//! - `PAYMENTS_API_BASE` - Payment gateway REST API base URL
//! - `PAYMENTS_KEY_ID` - Gateway API key id (public half)
//! - `PAYMENTS_KEY_SECRET` - Gateway API key secret (signs payment confirmations)
//! - `PAYMENTS_WEBHOOK_SECRET` - Secret the gateway signs webhook bodies with
//!
//! ## Optional
//! - `STORE_HOST` - Bind address (default: 127.0.0.1)
//! - `STORE_PORT` - Listen port (default: 3000)
//! - `PAYMENTS_CURRENCY` - ISO currency code for checkout (default: INR)
//! - `MAILER_API_URL` - Transactional mail API endpoint
//! - `MAILER_API_KEY` - Mail API bearer token
//! - `MAILER_FROM` - Receipt sender address
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry traces sample rate (default: 1.0)
//!
//! The three `MAILER_*` variables must be set together; when absent, receipts
//! are logged instead of sent.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 16;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
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
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the storefront
    pub base_url: String,
    /// Directory holding deliverable product files
    pub files_dir: PathBuf,
    /// Payment gateway configuration
    pub payments: PaymentsConfig,
    /// Transactional mail configuration (optional)
    pub mailer: Option<MailerConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Payment gateway credentials.
///
/// Implements `Debug` manually to redact the signing secrets.
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Gateway REST API base URL
    pub api_base: String,
    /// API key id; public, embedded in the checkout widget
    pub key_id: String,
    /// API key secret; authenticates API calls and signs confirmations
    pub key_secret: SecretString,
    /// Secret the gateway signs webhook bodies with
    pub webhook_secret: SecretString,
    /// ISO currency code used at checkout
    pub currency: String,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish()
    }
}

/// Transactional mail API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct MailerConfig {
    /// Mail API endpoint
    pub api_url: String,
    /// Mail API bearer token
    pub api_key: SecretString,
    /// Receipt sender address
    pub from_address: String,
}

impl std::fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
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
    /// if secrets fail placeholder/length validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STORE_DATABASE_URL")?;
        let host = get_env_or_default("STORE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("STORE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("STORE_BASE_URL")?;
        let files_dir = PathBuf::from(get_required_env("STORE_FILES_DIR")?);

        let payments = PaymentsConfig::from_env()?;
        let mailer = MailerConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            files_dir,
            payments,
            mailer,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_required_env("PAYMENTS_API_BASE")?,
            key_id: get_required_env("PAYMENTS_KEY_ID")?,
            key_secret: get_validated_secret("PAYMENTS_KEY_SECRET")?,
            webhook_secret: get_validated_secret("PAYMENTS_WEBHOOK_SECRET")?,
            currency: get_env_or_default("PAYMENTS_CURRENCY", "INR"),
        })
    }
}

impl MailerConfig {
    /// Load mail configuration from environment.
    ///
    /// Returns `None` if no `MAILER_*` variable is set (receipts are then
    /// logged instead of sent). All three variables must be set together.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let api_url = get_optional_env("MAILER_API_URL");
        let api_key = get_optional_env("MAILER_API_KEY");
        let from_address = get_optional_env("MAILER_FROM");

        match (api_url, api_key, from_address) {
            (Some(url), Some(key), Some(from)) => {
                validate_secret_strength(&key, "MAILER_API_KEY")?;
                Ok(Some(Self {
                    api_url: url,
                    api_key: SecretString::from(key),
                    from_address: from,
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "MAILER_*".to_string(),
                "MAILER_API_URL, MAILER_API_KEY and MAILER_FROM must be set together".to_string(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a secret is not a placeholder and is long enough to be real.
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

    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_SECRET_LENGTH} characters (got {})",
                secret.len()
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

//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CRM_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `CRM_DATABASE_URL` - `SQLite` connection string (falls back to `DATABASE_URL`,
//!   then `sqlite://webshop_crm.db?mode=rwc`)
//! - `CRM_HOST` - Bind address (default: 127.0.0.1)
//! - `CRM_PORT` - Listen port (default: 5000)
//! - `CRM_BASE_URL` - Public URL used in email links (default: <http://localhost:5000>)
//! - `CRM_CORS_ORIGIN` - Allowed browser origin (default: <http://localhost:3000>)
//! - `CRM_AUTO_MIGRATE` - Run embedded migrations on startup (default: true)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (SMTP - all or nothing)
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`
//! - `SMTP_PORT` - SMTP port (default: 587)
//!
//! ## Optional (label sender address)
//! - `COMPANY_NAME`, `COMPANY_STREET`, `COMPANY_HOUSE_NUMBER`,
//!   `COMPANY_POSTAL_CODE`, `COMPANY_CITY`, `COMPANY_COUNTRY`
//!
//! ## Optional (OAuth apps for connecting ad accounts)
//! - `GOOGLE_OAUTH_CLIENT_ID`, `GOOGLE_OAUTH_CLIENT_SECRET`
//! - `META_APP_ID`, `META_APP_SECRET`
//!
//! ## Optional (TLS)
//! - `CRM_TLS_CERT` - PEM-encoded certificate chain
//! - `CRM_TLS_KEY` - PEM-encoded private key
//!
//! Ad platform and carrier credentials are not part of this struct. They are
//! resolved per request by [`crate::services::integrations`], which prefers
//! values stored through the settings API over environment variables.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_DATABASE_URL: &str = "sqlite://webshop_crm.db?mode=rwc";

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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `SQLite` connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build verification and reset links
    pub base_url: String,
    /// Browser origin allowed by CORS
    pub cors_origin: String,
    /// Token signing secret
    pub jwt_secret: SecretString,
    /// Whether to apply embedded migrations on startup
    pub auto_migrate: bool,
    /// SMTP configuration (optional - emails are only logged without it)
    pub email: Option<EmailConfig>,
    /// Sender address printed on shipping labels
    pub company: CompanyAddress,
    /// OAuth apps used to connect Google Ads and Meta accounts
    pub oauth: OAuthConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// SMTP configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Sender address used when creating shipments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyAddress {
    pub name: String,
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl Default for CompanyAddress {
    fn default() -> Self {
        Self {
            name: "Webshop BV".to_string(),
            street: "Hoofdstraat".to_string(),
            house_number: "123".to_string(),
            postal_code: "1000 AB".to_string(),
            city: "Amsterdam".to_string(),
            country: "NL".to_string(),
        }
    }
}

/// An OAuth client registered with an ad platform.
#[derive(Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: Option<SecretString>,
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// OAuth apps per platform. A platform without a client id has OAuth disabled.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub google: Option<OAuthApp>,
    pub meta: Option<OAuthApp>,
}

impl OAuthConfig {
    fn from_env() -> Self {
        let app = |id_var: &str, secret_var: &str| {
            get_optional_env(id_var).map(|client_id| OAuthApp {
                client_id,
                client_secret: get_optional_env(secret_var).map(SecretString::from),
            })
        };
        Self {
            google: app("GOOGLE_OAUTH_CLIENT_ID", "GOOGLE_OAUTH_CLIENT_SECRET"),
            meta: app("META_APP_ID", "META_APP_SECRET"),
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("CRM_TLS_CERT");
        let key_pem = get_optional_env("CRM_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "CRM_TLS_*".to_string(),
                "Both CRM_TLS_CERT and CRM_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AppConfig {
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

        let database_url = get_database_url("CRM_DATABASE_URL");
        let host = get_env_or_default("CRM_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CRM_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CRM_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CRM_PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("CRM_BASE_URL", "http://localhost:5000");
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("CRM_BASE_URL".to_string(), e.to_string()))?;
        let cors_origin = get_env_or_default("CRM_CORS_ORIGIN", "http://localhost:3000");
        let jwt_secret = get_validated_secret("CRM_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "CRM_JWT_SECRET")?;
        let auto_migrate = parse_bool("CRM_AUTO_MIGRATE", true)?;

        let email = EmailConfig::from_env()?;
        let company = CompanyAddress::from_env();
        let oauth = OAuthConfig::from_env();
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cors_origin,
            jwt_secret,
            auto_migrate,
            email,
            company,
            oauth,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Configuration for in-process tests: in-memory database, fixed secret,
    /// no SMTP.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("sqlite::memory:"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            jwt_secret: SecretString::from("k9#Qv2$Lm7@Zp4!Xr8&Tn1^Wb6*Hd3%F"),
            auto_migrate: true,
            email: None,
            company: CompanyAddress::default(),
            oauth: OAuthConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
            tls: None,
        }
    }
}

impl EmailConfig {
    /// Load SMTP configuration from environment.
    ///
    /// Returns `None` when no SMTP variable is set. Setting only some of
    /// them is an error.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let host = get_optional_env("SMTP_HOST");
        let username = get_optional_env("SMTP_USERNAME");
        let password = get_optional_env("SMTP_PASSWORD");
        let from = get_optional_env("SMTP_FROM");

        match (host, username, password, from) {
            (Some(smtp_host), Some(smtp_username), Some(password), Some(from_address)) => {
                let smtp_port = get_env_or_default("SMTP_PORT", "587")
                    .parse::<u16>()
                    .map_err(|e| {
                        ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string())
                    })?;
                Ok(Some(Self {
                    smtp_host,
                    smtp_port,
                    smtp_username,
                    smtp_password: SecretString::from(password),
                    from_address,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SMTP_*".to_string(),
                "SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and SMTP_FROM must be set together"
                    .to_string(),
            )),
        }
    }
}

impl CompanyAddress {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: get_optional_env("COMPANY_NAME").unwrap_or(defaults.name),
            street: get_optional_env("COMPANY_STREET").unwrap_or(defaults.street),
            house_number: get_optional_env("COMPANY_HOUSE_NUMBER")
                .unwrap_or(defaults.house_number),
            postal_code: get_optional_env("COMPANY_POSTAL_CODE").unwrap_or(defaults.postal_code),
            city: get_optional_env("COMPANY_CITY").unwrap_or(defaults.city),
            country: get_optional_env("COMPANY_COUNTRY").unwrap_or(defaults.country),
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

/// Database URL from `CRM_DATABASE_URL`, `DATABASE_URL`, or the local default.
///
/// Used by tools that need the database but not the rest of the server
/// configuration.
#[must_use]
pub fn database_url() -> SecretString {
    let _ = dotenvy::dotenv();
    get_database_url("CRM_DATABASE_URL")
}

/// Get database URL with fallback to generic `DATABASE_URL`, then a local file.
fn get_database_url(primary_key: &str) -> SecretString {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_or_else(
            |_| SecretString::from(DEFAULT_DATABASE_URL),
            SecretString::from,
        )
}

/// Get an optional environment variable. Empty values count as unset.
pub(crate) fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a boolean flag (`true`/`false`/`1`/`0`/`yes`/`no`).
fn parse_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match get_optional_env(key) {
        None => Ok(default),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected a boolean, got '{other}'"),
            )),
        },
    }
}

/// Validate that the token secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
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
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_jwt_secret(&secret, "CRM_JWT_SECRET").is_err());
    }

    #[test]
    fn test_test_config_secret_passes_validation() {
        let config = AppConfig::for_tests();
        let secret = config.jwt_secret.expose_secret();
        assert!(validate_secret_strength(secret, "CRM_JWT_SECRET").is_ok());
        assert!(validate_jwt_secret(&config.jwt_secret, "CRM_JWT_SECRET").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let mut config = AppConfig::for_tests();
        config.port = 5001;
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5001);
    }

    #[test]
    fn test_company_address_defaults() {
        let company = CompanyAddress::default();
        assert_eq!(company.name, "Webshop BV");
        assert_eq!(company.country, "NL");
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.shop.nl".to_string(),
            smtp_port: 587,
            smtp_username: "crm@shop.nl".to_string(),
            smtp_password: SecretString::from("hunter2-but-longer"),
            from_address: "crm@shop.nl".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.shop.nl"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_oauth_app_debug_redacts_secret() {
        let app = OAuthApp {
            client_id: "1234.apps.googleusercontent.com".to_string(),
            client_secret: Some(SecretString::from("GOCSPX-geheim")),
        };

        let debug_output = format!("{app:?}");
        assert!(debug_output.contains("1234.apps.googleusercontent.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("GOCSPX"));
    }
}

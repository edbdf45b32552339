//! Integration credential resolution.
//!
//! Credentials for ad platforms, carriers and mail providers are looked up
//! per platform: active rows in `api_settings` win, and only when a platform
//! has no rows at all are environment variables consulted. Resolved sets are
//! cached for 60 seconds with `moka` and invalidated when the settings API
//! writes to the platform.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::get_optional_env;
use crate::db::{ApiSettingsRepository, RepositoryError};

const CACHE_TTL: Duration = Duration::from_secs(60);

/// Resolved credentials of one platform, keyed by setting name.
pub type Credentials = BTreeMap<String, String>;

/// An external service whose credentials can be managed through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleAds,
    MetaAds,
    Dhl,
    Postnl,
    Ups,
    EmailSmtp,
    EmailSendgrid,
}

impl Platform {
    pub const ALL: &'static [Self] = &[
        Self::GoogleAds,
        Self::MetaAds,
        Self::Dhl,
        Self::Postnl,
        Self::Ups,
        Self::EmailSmtp,
        Self::EmailSendgrid,
    ];

    /// Platforms reported by the connection status endpoint.
    pub const MONITORED: &'static [Self] =
        &[Self::GoogleAds, Self::MetaAds, Self::Dhl, Self::EmailSmtp];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoogleAds => "google_ads",
            Self::MetaAds => "meta_ads",
            Self::Dhl => "dhl",
            Self::Postnl => "postnl",
            Self::Ups => "ups",
            Self::EmailSmtp => "email_smtp",
            Self::EmailSendgrid => "email_sendgrid",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::GoogleAds => "Google Ads",
            Self::MetaAds => "Meta Ads",
            Self::Dhl => "DHL",
            Self::Postnl => "PostNL",
            Self::Ups => "UPS",
            Self::EmailSmtp => "SMTP email",
            Self::EmailSendgrid => "SendGrid email",
        }
    }

    /// Keys that must be present for the platform to count as configured.
    #[must_use]
    pub const fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::GoogleAds => &[
                "developer_token",
                "client_id",
                "client_secret",
                "refresh_token",
                "customer_id",
            ],
            Self::MetaAds => &["access_token", "ad_account_id"],
            Self::Dhl => &["api_key", "api_secret", "account_number"],
            Self::Postnl => &["api_key", "customer_code"],
            Self::EmailSmtp => &["host", "port", "user", "pass"],
            Self::Ups | Self::EmailSendgrid => &[],
        }
    }

    /// Environment fallbacks as `(setting key, variable)` pairs.
    const fn env_vars(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::GoogleAds => &[
                ("developer_token", "GOOGLE_ADS_DEVELOPER_TOKEN"),
                ("client_id", "GOOGLE_ADS_CLIENT_ID"),
                ("client_secret", "GOOGLE_ADS_CLIENT_SECRET"),
                ("refresh_token", "GOOGLE_ADS_REFRESH_TOKEN"),
                ("customer_id", "GOOGLE_ADS_CUSTOMER_ID"),
            ],
            Self::MetaAds => &[
                ("access_token", "META_ACCESS_TOKEN"),
                ("ad_account_id", "META_AD_ACCOUNT_ID"),
                ("app_id", "META_APP_ID"),
                ("app_secret", "META_APP_SECRET"),
            ],
            Self::Dhl => &[
                ("api_key", "DHL_API_KEY"),
                ("api_secret", "DHL_API_SECRET"),
                ("account_number", "DHL_ACCOUNT_NUMBER"),
                ("environment", "DHL_ENVIRONMENT"),
            ],
            Self::EmailSmtp => &[
                ("host", "SMTP_HOST"),
                ("port", "SMTP_PORT"),
                ("user", "SMTP_USERNAME"),
                ("pass", "SMTP_PASSWORD"),
            ],
            Self::Postnl | Self::Ups | Self::EmailSendgrid => &[],
        }
    }

    fn from_env(self) -> Credentials {
        self.env_vars()
            .iter()
            .filter_map(|(key, var)| get_optional_env(var).map(|v| ((*key).to_string(), v)))
            .collect()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown platform: {s}"))
    }
}

/// Required keys of `platform` that are missing or blank in `credentials`.
#[must_use]
pub fn missing_keys(platform: Platform, credentials: &Credentials) -> Vec<&'static str> {
    platform
        .required_keys()
        .iter()
        .copied()
        .filter(|key| credentials.get(*key).is_none_or(|v| v.trim().is_empty()))
        .collect()
}

/// Cached credential loader.
#[derive(Clone)]
pub struct IntegrationSettings {
    cache: Cache<Platform, Arc<Credentials>>,
}

impl std::fmt::Debug for IntegrationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationSettings")
            .field("cached_platforms", &self.cache.entry_count())
            .finish()
    }
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationSettings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(Platform::ALL.len() as u64)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Resolve the credentials of a platform.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the settings table cannot be read.
    pub async fn load(
        &self,
        pool: &SqlitePool,
        platform: Platform,
    ) -> Result<Arc<Credentials>, RepositoryError> {
        if let Some(cached) = self.cache.get(&platform).await {
            return Ok(cached);
        }

        let stored: Credentials = ApiSettingsRepository::new(pool)
            .for_platform(platform.as_str())
            .await?
            .into_iter()
            .collect();

        let credentials = if stored.is_empty() {
            platform.from_env()
        } else {
            stored
        };

        let credentials = Arc::new(credentials);
        self.cache.insert(platform, Arc::clone(&credentials)).await;
        Ok(credentials)
    }

    /// Resolve credentials only if every required key is present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the settings table cannot be read.
    pub async fn configured(
        &self,
        pool: &SqlitePool,
        platform: Platform,
    ) -> Result<Option<Arc<Credentials>>, RepositoryError> {
        let credentials = self.load(pool, platform).await?;
        Ok(missing_keys(platform, &credentials)
            .is_empty()
            .then_some(credentials))
    }

    /// Drop the cached entry after the platform's settings changed.
    pub async fn invalidate(&self, platform: Platform) {
        self.cache.invalidate(&platform).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db;

    fn creds(pairs: &[(&str, &str)]) -> Credentials {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_platform_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), *platform);
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_missing_keys() {
        let partial = creds(&[("access_token", "abc"), ("ad_account_id", " ")]);
        assert_eq!(missing_keys(Platform::MetaAds, &partial), vec!["ad_account_id"]);

        let complete = creds(&[("access_token", "abc"), ("ad_account_id", "act_1")]);
        assert!(missing_keys(Platform::MetaAds, &complete).is_empty());
    }

    #[test]
    fn test_platform_without_requirements_is_always_complete() {
        assert!(missing_keys(Platform::Ups, &Credentials::new()).is_empty());
    }

    #[tokio::test]
    async fn test_database_settings_are_cached_until_invalidated() {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let repo = ApiSettingsRepository::new(&pool);
        let settings = IntegrationSettings::new();

        repo.upsert("postnl", "api_key", "key-1").await.unwrap();
        repo.upsert("postnl", "customer_code", "CC").await.unwrap();

        let loaded = settings.configured(&pool, Platform::Postnl).await.unwrap();
        assert_eq!(loaded.unwrap().get("api_key").map(String::as_str), Some("key-1"));

        repo.upsert("postnl", "api_key", "key-2").await.unwrap();
        let cached = settings.load(&pool, Platform::Postnl).await.unwrap();
        assert_eq!(cached.get("api_key").map(String::as_str), Some("key-1"));

        settings.invalidate(Platform::Postnl).await;
        let fresh = settings.load(&pool, Platform::Postnl).await.unwrap();
        assert_eq!(fresh.get("api_key").map(String::as_str), Some("key-2"));
    }
}

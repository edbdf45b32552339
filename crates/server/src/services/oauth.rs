//! OAuth authorization-code flow for connecting ad accounts.
//!
//! The start endpoints send the browser to the platform's consent page. The
//! callbacks trade the returned code for tokens and store them as integration
//! settings, so the next campaign sync uses them.

use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::instrument;
use url::Url;

use webshop_crm_core::AdPlatform;

use crate::config::OAuthApp;
use crate::db::{ApiSettingsRepository, RepositoryError};
use crate::services::ads::AdsError;
use crate::services::integrations::{IntegrationSettings, Platform};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_SCOPE: &str = "https://www.googleapis.com/auth/adwords";

const META_AUTHORIZE_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const META_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
const META_SCOPE: &str = "ads_management,ads_read";

/// Settings obtained from a completed authorization, as `(key, value)`.
pub type ObtainedSettings = Vec<(&'static str, String)>;

/// Ad platform that can be connected through OAuth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Meta,
}

impl OAuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Meta => "meta",
        }
    }

    /// Settings platform the obtained tokens are stored under.
    #[must_use]
    pub const fn platform(self) -> Platform {
        match self {
            Self::Google => Platform::GoogleAds,
            Self::Meta => Platform::MetaAds,
        }
    }

    const fn ad_platform(self) -> AdPlatform {
        match self {
            Self::Google => AdPlatform::Google,
            Self::Meta => AdPlatform::Meta,
        }
    }

    /// Environment variable holding the provider's client id.
    #[must_use]
    pub const fn client_id_var(self) -> &'static str {
        match self {
            Self::Google => "GOOGLE_OAUTH_CLIENT_ID",
            Self::Meta => "META_APP_ID",
        }
    }

    /// Callback URL registered with the provider.
    #[must_use]
    pub fn callback_url(self, base_url: &str) -> String {
        format!(
            "{}/api/oauth/{}/callback",
            base_url.trim_end_matches('/'),
            self.as_str()
        )
    }

    /// Consent page URL. Google additionally asks for offline access so the
    /// response carries a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` only if the built-in endpoint is malformed.
    pub fn authorize_url(
        self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url, url::ParseError> {
        let (endpoint, scope) = match self {
            Self::Google => (GOOGLE_AUTHORIZE_URL, GOOGLE_SCOPE),
            Self::Meta => (META_AUTHORIZE_URL, META_SCOPE),
        };

        let mut url = Url::parse(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", scope)
                .append_pair("state", state);
            if self == Self::Google {
                query
                    .append_pair("access_type", "offline")
                    .append_pair("prompt", "consent");
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchanges authorization codes for platform tokens.
#[derive(Debug, Clone, Default)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trade an authorization code for the settings the ad clients need.
    ///
    /// # Errors
    ///
    /// Returns `AdsError::MissingCredential` when the app secret or the
    /// expected token is missing, and `AdsError::Api`/`Http` when the
    /// platform rejects the exchange.
    #[instrument(skip(self, app, code), fields(provider = provider.as_str()))]
    pub async fn exchange(
        &self,
        provider: OAuthProvider,
        app: &OAuthApp,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ObtainedSettings, AdsError> {
        let secret = app
            .client_secret
            .as_ref()
            .ok_or(AdsError::MissingCredential("client_secret"))?
            .expose_secret();

        match provider {
            OAuthProvider::Google => {
                let response = self
                    .http
                    .post(GOOGLE_TOKEN_URL)
                    .form(&[
                        ("code", code),
                        ("client_id", app.client_id.as_str()),
                        ("client_secret", secret),
                        ("redirect_uri", redirect_uri),
                        ("grant_type", "authorization_code"),
                    ])
                    .send()
                    .await?;
                let tokens = read_tokens(provider, response).await?;
                let refresh_token = tokens
                    .refresh_token
                    .ok_or(AdsError::MissingCredential("refresh_token"))?;

                Ok(vec![
                    ("client_id", app.client_id.clone()),
                    ("client_secret", secret.to_string()),
                    ("refresh_token", refresh_token),
                ])
            }
            OAuthProvider::Meta => {
                let response = self
                    .http
                    .get(META_TOKEN_URL)
                    .query(&[
                        ("client_id", app.client_id.as_str()),
                        ("client_secret", secret),
                        ("redirect_uri", redirect_uri),
                        ("code", code),
                    ])
                    .send()
                    .await?;
                let short_lived = read_tokens(provider, response).await?;

                let response = self
                    .http
                    .get(META_TOKEN_URL)
                    .query(&[
                        ("grant_type", "fb_exchange_token"),
                        ("client_id", app.client_id.as_str()),
                        ("client_secret", secret),
                        ("fb_exchange_token", short_lived.access_token.as_str()),
                    ])
                    .send()
                    .await?;
                let long_lived = read_tokens(provider, response).await?;

                Ok(vec![
                    ("access_token", long_lived.access_token),
                    ("app_id", app.client_id.clone()),
                    ("app_secret", secret.to_string()),
                ])
            }
        }
    }
}

async fn read_tokens(
    provider: OAuthProvider,
    response: reqwest::Response,
) -> Result<TokenResponse, AdsError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AdsError::Api {
            platform: provider.ad_platform(),
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}

/// Store obtained settings under the provider's platform and drop its cached
/// credentials.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a write fails.
pub async fn store_settings(
    pool: &SqlitePool,
    integrations: &IntegrationSettings,
    provider: OAuthProvider,
    settings: &[(&'static str, String)],
) -> Result<(), RepositoryError> {
    let platform = provider.platform();
    let repo = ApiSettingsRepository::new(pool);
    for (key, value) in settings {
        repo.upsert(platform.as_str(), key, value).await?;
    }
    integrations.invalidate(platform).await;

    tracing::info!(platform = %platform, keys = settings.len(), "Stored OAuth credentials");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db;

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_google_authorize_url() {
        let redirect = OAuthProvider::Google.callback_url("https://crm.example.nl/");
        assert_eq!(redirect, "https://crm.example.nl/api/oauth/google/callback");

        let url = OAuthProvider::Google
            .authorize_url("client-1", &redirect, "st4te")
            .unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(query(&url, "client_id").as_deref(), Some("client-1"));
        assert_eq!(query(&url, "redirect_uri").as_deref(), Some(redirect.as_str()));
        assert_eq!(query(&url, "scope").as_deref(), Some(GOOGLE_SCOPE));
        assert_eq!(query(&url, "access_type").as_deref(), Some("offline"));
        assert_eq!(query(&url, "state").as_deref(), Some("st4te"));
    }

    #[test]
    fn test_meta_authorize_url() {
        let url = OAuthProvider::Meta
            .authorize_url("app-9", "http://localhost:5000/api/oauth/meta/callback", "s")
            .unwrap();
        assert_eq!(url.host_str(), Some("www.facebook.com"));
        assert_eq!(query(&url, "scope").as_deref(), Some(META_SCOPE));
        assert_eq!(query(&url, "access_type"), None);
    }

    #[tokio::test]
    async fn test_exchange_without_secret_fails_before_any_request() {
        let app = OAuthApp {
            client_id: "client-1".to_string(),
            client_secret: None,
        };
        let result = OAuthClient::new()
            .exchange(OAuthProvider::Google, &app, "code", "http://localhost")
            .await;
        assert!(matches!(result, Err(AdsError::MissingCredential("client_secret"))));
    }

    #[tokio::test]
    async fn test_store_settings_replaces_cached_credentials() {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let integrations = IntegrationSettings::new();

        integrations.load(&pool, Platform::MetaAds).await.unwrap();

        store_settings(
            &pool,
            &integrations,
            OAuthProvider::Meta,
            &[
                ("access_token", "long-lived".to_string()),
                ("app_id", "app-9".to_string()),
            ],
        )
        .await
        .unwrap();

        let after = integrations.load(&pool, Platform::MetaAds).await.unwrap();
        assert_eq!(after.get("access_token").map(String::as_str), Some("long-lived"));
        assert_eq!(after.get("app_id").map(String::as_str), Some("app-9"));
    }
}

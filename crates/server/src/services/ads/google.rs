//! Google Ads REST client.
//!
//! Authenticates with an OAuth refresh token and runs a GAQL search over the
//! account's campaigns restricted to today's date segment.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use webshop_crm_core::{AdPlatform, CampaignStatus};

use super::{AdPlatformClient, AdsError, from_micros, lenient_i64};
use crate::models::{AdMetric, RemoteCampaign};
use crate::services::integrations::Credentials;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const API_BASE: &str = "https://googleads.googleapis.com/v17";

const CAMPAIGN_QUERY: &str = "SELECT campaign.id, campaign.name, campaign.status, \
     campaign_budget.amount_micros, metrics.cost_micros, metrics.impressions, \
     metrics.clicks, metrics.conversions, metrics.conversions_value \
     FROM campaign WHERE segments.date DURING TODAY";

/// Client for one Google Ads customer account.
#[derive(Debug, Clone)]
pub struct GoogleAdsClient {
    http: reqwest::Client,
    developer_token: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    customer_id: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRow {
    campaign: GoogleCampaign,
    #[serde(default)]
    campaign_budget: Option<GoogleBudget>,
    #[serde(default)]
    metrics: GoogleMetrics,
}

#[derive(Deserialize)]
struct GoogleCampaign {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleBudget {
    #[serde(default, deserialize_with = "lenient_i64")]
    amount_micros: i64,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleMetrics {
    #[serde(default, deserialize_with = "lenient_i64")]
    cost_micros: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    impressions: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    clicks: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    conversions: i64,
    #[serde(default)]
    conversions_value: f64,
}

fn campaign_status(status: &str) -> CampaignStatus {
    match status {
        "ENABLED" => CampaignStatus::Active,
        "PAUSED" => CampaignStatus::Paused,
        _ => CampaignStatus::Ended,
    }
}

impl From<SearchRow> for RemoteCampaign {
    fn from(row: SearchRow) -> Self {
        Self {
            external_id: row.campaign.id,
            name: row.campaign.name,
            status: campaign_status(&row.campaign.status),
            budget: row
                .campaign_budget
                .map_or(Decimal::ZERO, |b| from_micros(b.amount_micros)),
            today: AdMetric {
                date: Utc::now().date_naive(),
                impressions: row.metrics.impressions,
                clicks: row.metrics.clicks,
                spent: from_micros(row.metrics.cost_micros),
                conversions: row.metrics.conversions,
                revenue: webshop_crm_core::money::from_db(row.metrics.conversions_value),
            },
        }
    }
}

impl GoogleAdsClient {
    /// Build a client from resolved `google_ads` credentials.
    ///
    /// # Errors
    ///
    /// Returns `AdsError::MissingCredential` if a required key is absent.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, AdsError> {
        let get = |key: &'static str| {
            credentials
                .get(key)
                .cloned()
                .ok_or(AdsError::MissingCredential(key))
        };

        Ok(Self {
            http: reqwest::Client::new(),
            developer_token: get("developer_token")?,
            client_id: get("client_id")?,
            client_secret: get("client_secret")?,
            refresh_token: get("refresh_token")?,
            customer_id: get("customer_id")?.replace('-', ""),
        })
    }

    async fn access_token(&self) -> Result<String, AdsError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdsError::Api {
                platform: AdPlatform::Google,
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json::<TokenResponse>().await?.access_token)
    }
}

impl AdPlatformClient for GoogleAdsClient {
    fn platform(&self) -> AdPlatform {
        AdPlatform::Google
    }

    #[instrument(skip(self), fields(customer_id = %self.customer_id))]
    async fn fetch_campaigns(&self) -> Result<Vec<RemoteCampaign>, AdsError> {
        let token = self.access_token().await?;
        let url = format!("{API_BASE}/customers/{}/googleAds:search", self.customer_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("developer-token", &self.developer_token)
            .json(&serde_json::json!({ "query": CAMPAIGN_QUERY }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdsError::Api {
                platform: AdPlatform::Google,
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_search_row_conversion() {
        let json = r#"{
            "results": [{
                "campaign": {"id": "123", "name": "Zomer", "status": "ENABLED"},
                "campaignBudget": {"amountMicros": "50000000"},
                "metrics": {
                    "costMicros": "12500000",
                    "impressions": "1000",
                    "clicks": "40",
                    "conversions": 3.0,
                    "conversionsValue": 180.5
                }
            }]
        }"#;
        let body: SearchResponse = serde_json::from_str(json).unwrap();
        let campaign: RemoteCampaign = body.results.into_iter().next().unwrap().into();

        assert_eq!(campaign.external_id, "123");
        assert_eq!(campaign.status, CampaignStatus::Active);
        assert_eq!(campaign.budget, dec!(50));
        assert_eq!(campaign.today.spent, dec!(12.5));
        assert_eq!(campaign.today.clicks, 40);
        assert_eq!(campaign.today.conversions, 3);
        assert_eq!(campaign.today.revenue, dec!(180.5));
    }

    #[test]
    fn test_missing_credentials() {
        let creds = Credentials::new();
        assert!(matches!(
            GoogleAdsClient::from_credentials(&creds),
            Err(AdsError::MissingCredential("developer_token"))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(campaign_status("PAUSED"), CampaignStatus::Paused);
        assert_eq!(campaign_status("REMOVED"), CampaignStatus::Ended);
    }
}

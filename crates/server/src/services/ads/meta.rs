//! Meta (Facebook) Marketing API client.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use webshop_crm_core::{AdPlatform, CampaignStatus, money};

use super::{AdPlatformClient, AdsError, lenient_decimal, lenient_i64};
use crate::models::{AdMetric, RemoteCampaign};
use crate::services::integrations::Credentials;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const CAMPAIGN_FIELDS: &str = "id,name,status,daily_budget,\
     insights.date_preset(today){spend,impressions,clicks,actions,action_values}";
const PURCHASE_ACTION: &str = "purchase";

/// Client for one Meta ad account.
#[derive(Debug, Clone)]
pub struct MetaAdsClient {
    http: reqwest::Client,
    access_token: String,
    ad_account_id: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct MetaCampaign {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
    /// Minor currency units.
    #[serde(default, deserialize_with = "lenient_i64")]
    daily_budget: i64,
    #[serde(default)]
    insights: Option<Page<MetaInsight>>,
}

#[derive(Default, Deserialize)]
struct MetaInsight {
    #[serde(default, deserialize_with = "lenient_decimal")]
    spend: Decimal,
    #[serde(default, deserialize_with = "lenient_i64")]
    impressions: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    clicks: i64,
    #[serde(default)]
    actions: Vec<MetaAction>,
    #[serde(default)]
    action_values: Vec<MetaActionValue>,
}

#[derive(Deserialize)]
struct MetaAction {
    action_type: String,
    #[serde(deserialize_with = "lenient_i64")]
    value: i64,
}

#[derive(Deserialize)]
struct MetaActionValue {
    action_type: String,
    #[serde(deserialize_with = "lenient_decimal")]
    value: Decimal,
}

fn campaign_status(status: &str) -> CampaignStatus {
    match status {
        "ACTIVE" => CampaignStatus::Active,
        "PAUSED" => CampaignStatus::Paused,
        _ => CampaignStatus::Ended,
    }
}

impl From<MetaCampaign> for RemoteCampaign {
    fn from(campaign: MetaCampaign) -> Self {
        let insight = campaign
            .insights
            .and_then(|page| page.data.into_iter().next())
            .unwrap_or_default();

        let conversions = insight
            .actions
            .iter()
            .filter(|a| a.action_type == PURCHASE_ACTION)
            .map(|a| a.value)
            .sum();
        let revenue = insight
            .action_values
            .iter()
            .filter(|a| a.action_type == PURCHASE_ACTION)
            .map(|a| a.value)
            .sum();

        Self {
            external_id: campaign.id,
            name: campaign.name,
            status: campaign_status(&campaign.status),
            budget: money::round2(Decimal::new(campaign.daily_budget, 2)),
            today: AdMetric {
                date: Utc::now().date_naive(),
                impressions: insight.impressions,
                clicks: insight.clicks,
                spent: money::round2(insight.spend),
                conversions,
                revenue: money::round2(revenue),
            },
        }
    }
}

impl MetaAdsClient {
    /// Build a client from resolved `meta_ads` credentials.
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

        let account = get("ad_account_id")?;
        let ad_account_id = account
            .strip_prefix("act_")
            .map_or_else(|| account.clone(), str::to_string);

        Ok(Self {
            http: reqwest::Client::new(),
            access_token: get("access_token")?,
            ad_account_id,
        })
    }
}

impl AdPlatformClient for MetaAdsClient {
    fn platform(&self) -> AdPlatform {
        AdPlatform::Meta
    }

    #[instrument(skip(self), fields(ad_account_id = %self.ad_account_id))]
    async fn fetch_campaigns(&self) -> Result<Vec<RemoteCampaign>, AdsError> {
        let url = format!("{GRAPH_BASE}/act_{}/campaigns", self.ad_account_id);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", CAMPAIGN_FIELDS),
                ("limit", "100"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdsError::Api {
                platform: AdPlatform::Meta,
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let page: Page<MetaCampaign> = response.json().await?;
        Ok(page.data.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_campaign_with_purchases() {
        let json = r#"{
            "data": [{
                "id": "2385",
                "name": "Retargeting",
                "status": "ACTIVE",
                "daily_budget": "2500",
                "insights": {"data": [{
                    "spend": "17.42",
                    "impressions": "5230",
                    "clicks": "88",
                    "actions": [
                        {"action_type": "link_click", "value": "88"},
                        {"action_type": "purchase", "value": "4"}
                    ],
                    "action_values": [
                        {"action_type": "purchase", "value": "219.80"}
                    ]
                }]}
            }]
        }"#;
        let page: Page<MetaCampaign> = serde_json::from_str(json).unwrap();
        let campaign: RemoteCampaign = page.data.into_iter().next().unwrap().into();

        assert_eq!(campaign.budget, dec!(25));
        assert_eq!(campaign.status, CampaignStatus::Active);
        assert_eq!(campaign.today.spent, dec!(17.42));
        assert_eq!(campaign.today.impressions, 5230);
        assert_eq!(campaign.today.conversions, 4);
        assert_eq!(campaign.today.revenue, dec!(219.80));
    }

    #[test]
    fn test_campaign_without_insights() {
        let json = r#"{"data": [{"id": "1", "name": "Oud", "status": "ARCHIVED"}]}"#;
        let page: Page<MetaCampaign> = serde_json::from_str(json).unwrap();
        let campaign: RemoteCampaign = page.data.into_iter().next().unwrap().into();

        assert_eq!(campaign.status, CampaignStatus::Ended);
        assert_eq!(
            campaign.today,
            AdMetric {
                date: campaign.today.date,
                impressions: 0,
                clicks: 0,
                spent: Decimal::ZERO,
                conversions: 0,
                revenue: Decimal::ZERO,
            }
        );
    }

    #[test]
    fn test_account_prefix_is_stripped() {
        let creds: Credentials = [
            ("access_token".to_string(), "tok".to_string()),
            ("ad_account_id".to_string(), "act_998".to_string()),
        ]
        .into_iter()
        .collect();
        let client = MetaAdsClient::from_credentials(&creds).unwrap();
        assert_eq!(client.ad_account_id, "998");
    }
}

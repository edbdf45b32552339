//! Advertising campaign domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{AdPlatform, CampaignId, CampaignStatus, UserId, money};

#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub platform: AdPlatform,
    /// Identifier on the ad platform, if the campaign is linked.
    pub campaign_id: Option<String>,
    pub status: CampaignStatus,
    pub budget: Decimal,
    pub spent: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: Decimal,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Click-through, cost-per-click and cost-per-acquisition. Each is `None`
/// when its divisor is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedMetrics {
    pub ctr: Option<Decimal>,
    pub cpc: Option<Decimal>,
    pub cpa: Option<Decimal>,
}

impl DerivedMetrics {
    #[must_use]
    pub fn compute(impressions: i64, clicks: i64, conversions: i64, spent: Decimal) -> Self {
        Self {
            ctr: money::ratio(
                money::from_count(clicks) * Decimal::ONE_HUNDRED,
                money::from_count(impressions),
            ),
            cpc: money::ratio(spent, money::from_count(clicks)),
            cpa: money::ratio(spent, money::from_count(conversions)),
        }
    }
}

/// A campaign as listed: with derived metrics and the creator's name.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignListing {
    #[serde(flatten)]
    pub campaign: Campaign,
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
    pub created_by_name: Option<String>,
}

/// One day of campaign results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdMetric {
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub spent: Decimal,
    pub conversions: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub platform: AdPlatform,
    pub campaign_id: Option<String>,
    pub budget: Decimal,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub budget: Option<Decimal>,
    pub status: Option<CampaignStatus>,
}

impl CampaignUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.budget.is_none() && self.status.is_none()
    }
}

/// A campaign as reported by a remote ad platform during sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCampaign {
    pub external_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub budget: Decimal,
    pub today: AdMetric,
}

/// Campaign counts and spend for the advertising overview.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdTotals {
    pub total_campaigns: i64,
    pub active_campaigns: i64,
    pub period_spend: Decimal,
    pub period_conversions: i64,
    pub period_revenue: Decimal,
}

/// Lifetime totals of all campaigns on one platform.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformPerformance {
    pub platform: String,
    pub campaigns: i64,
    pub spent: Decimal,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub ctr: Option<Decimal>,
    pub cpc: Option<Decimal>,
}

/// Metric sums of one campaign over a comparison window.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignComparison {
    pub id: CampaignId,
    pub name: String,
    pub platform: AdPlatform,
    pub impressions: i64,
    pub clicks: i64,
    pub spent: Decimal,
    pub conversions: i64,
    pub revenue: Decimal,
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
    /// Revenue per unit of spend; `None` without spend.
    pub roas: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_derived_metrics() {
        let m = DerivedMetrics::compute(1000, 50, 5, dec!(25));
        assert_eq!(m.ctr, Some(dec!(5)));
        assert_eq!(m.cpc, Some(dec!(0.5)));
        assert_eq!(m.cpa, Some(dec!(5)));
    }

    #[test]
    fn test_derived_metrics_without_data_are_null() {
        let m = DerivedMetrics::compute(0, 0, 0, dec!(25));
        assert_eq!(m, DerivedMetrics { ctr: None, cpc: None, cpa: None });
    }
}

//! Stored profit snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{SnapshotId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct ProfitSnapshot {
    pub id: SnapshotId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub total_fixed_costs: Decimal,
    pub total_ad_spend: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub gross_margin: Decimal,
    pub net_margin: Decimal,
    pub orders_count: i64,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProfitSnapshot {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub total_fixed_costs: Decimal,
    pub total_ad_spend: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub gross_margin: Decimal,
    pub net_margin: Decimal,
    pub orders_count: i64,
    pub created_by: Option<UserId>,
}

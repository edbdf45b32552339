//! Fixed cost domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{BillingCycle, FixedCostId};

#[derive(Debug, Clone, Serialize)]
pub struct FixedCost {
    pub id: FixedCostId,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub amount: Decimal,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFixedCost {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub amount: Decimal,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct FixedCostUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub billing_cycle: Option<BillingCycle>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl FixedCostUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.billing_cycle.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.is_active.is_none()
    }
}

//! Webshop (tenant) domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};

use webshop_crm_core::{SubscriptionPlan, UserId, WebshopId};

#[derive(Debug, Clone, Serialize)]
pub struct Webshop {
    pub id: WebshopId,
    pub name: String,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<UserId>,
    pub subscription_plan: SubscriptionPlan,
    pub settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings applied to a webshop created without explicit settings.
#[must_use]
pub fn default_webshop_settings() -> Value {
    json!({
        "currency": "EUR",
        "language": "nl",
        "timezone": "Europe/Amsterdam"
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct WebshopListing {
    #[serde(flatten)]
    pub webshop: Webshop,
    pub customers_count: i64,
    pub orders_count: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewWebshop {
    pub name: String,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<UserId>,
    pub subscription_plan: SubscriptionPlan,
    pub settings: Value,
}

#[derive(Debug, Clone, Default)]
pub struct WebshopUpdate {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub settings: Option<Value>,
}

impl WebshopUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.domain.is_none()
            && self.description.is_none()
            && self.subscription_plan.is_none()
            && self.settings.is_none()
    }
}

/// The plan a webshop is subscribed to and its current billing period.
#[derive(Debug, Clone, Serialize)]
pub struct WebshopSubscription {
    pub plan: SubscriptionPlan,
    pub price_monthly: Decimal,
    pub price_yearly: Option<Decimal>,
    /// Plan limits; `-1` is unlimited.
    pub max_customers: i64,
    pub max_orders: i64,
    pub max_products: i64,
    pub status: String,
    pub billing_cycle: String,
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
}

/// A staff user with access to a webshop.
#[derive(Debug, Clone, Serialize)]
pub struct WebshopMember {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebshopDetail {
    #[serde(flatten)]
    pub webshop: Webshop,
    pub subscription: Option<WebshopSubscription>,
    pub members: Vec<WebshopMember>,
}

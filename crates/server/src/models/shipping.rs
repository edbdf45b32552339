//! Shipping and tax rule domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{ShippingRuleId, TaxRuleId, TaxScope};

#[derive(Debug, Clone, Serialize)]
pub struct ShippingRule {
    pub id: ShippingRuleId,
    pub name: String,
    pub country: String,
    pub min_weight: i64,
    pub max_weight: i64,
    pub min_order_value: Decimal,
    pub max_order_value: Decimal,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShippingRule {
    pub name: String,
    pub country: String,
    pub min_weight: i64,
    pub max_weight: i64,
    pub min_order_value: Decimal,
    pub max_order_value: Decimal,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxRule {
    pub id: TaxRuleId,
    pub name: String,
    pub country: String,
    pub tax_rate: Decimal,
    pub applies_to: TaxScope,
    pub product_category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTaxRule {
    pub name: String,
    pub country: String,
    pub tax_rate: Decimal,
    pub applies_to: TaxScope,
    pub product_category: Option<String>,
}

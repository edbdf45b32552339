//! Reporting aggregates for the analytics, profit and insights endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use webshop_crm_core::{CustomerId, ProductId};

/// Headline counters for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardCounts {
    pub total_customers: i64,
    pub new_customers_this_month: i64,
    pub total_orders: i64,
    pub orders_this_month: i64,
    pub total_revenue: Decimal,
    pub revenue_this_month: Decimal,
    pub avg_order_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCustomer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub total_spent: Decimal,
    pub total_orders: i64,
}

/// Bucket size for sales-over-time reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesInterval {
    #[default]
    Day,
    Week,
    Month,
}

impl SalesInterval {
    /// `strftime` pattern naming the bucket of an order date.
    #[must_use]
    pub const fn strftime(self) -> &'static str {
        match self {
            Self::Day => "%Y-%m-%d",
            Self::Week => "%Y-W%W",
            Self::Month => "%Y-%m",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesPoint {
    pub period: String,
    pub orders: i64,
    pub revenue: Decimal,
    pub avg_order_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAcquisition {
    pub month: String,
    pub new_customers: i64,
}

/// Customers grouped by spend or order count.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerSegment {
    pub segment: String,
    pub customers: i64,
    pub avg_spent: Decimal,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityStat {
    pub city: String,
    pub customers: i64,
    pub revenue: Decimal,
}

/// Order-line sales of one product name/SKU.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSales {
    pub product_name: String,
    pub product_sku: Option<String>,
    pub times_ordered: i64,
    pub total_quantity: i64,
    pub total_revenue: Decimal,
    pub avg_price: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RepeatRate {
    pub repeat_customers: i64,
    pub total_customers: i64,
    pub repeat_rate: Decimal,
}

// =============================================================================
// Profit
// =============================================================================

/// Sales, cost of goods and ad spend of a date range. Fixed costs are
/// allocated separately.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PeriodFigures {
    pub revenue: Decimal,
    pub orders_count: i64,
    pub avg_order_value: Decimal,
    pub cogs: Decimal,
    pub units_sold: i64,
    pub ad_spend: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub units_sold: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyProfit {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub orders_count: i64,
}

// =============================================================================
// Insights
// =============================================================================

/// An active product with its sales over the analysis window.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSalesWindow {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i64,
    pub quantity_sold: i64,
    pub revenue: Decimal,
    pub orders_count: i64,
}

/// Repeat-purchase figures over customers that ordered at least once.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RepeatBehaviour {
    pub one_time_customers: i64,
    pub repeat_customers: i64,
}

/// Inputs of the business health score.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BusinessMetrics {
    pub monthly_revenue: Decimal,
    pub previous_month_revenue: Decimal,
    pub new_customers_month: i64,
    pub repeat_customers: i64,
    pub active_customers: i64,
    pub monthly_orders: i64,
    pub avg_order_value: Decimal,
    pub monthly_fixed_costs: Decimal,
}

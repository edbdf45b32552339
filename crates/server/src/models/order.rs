//! Order domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use webshop_crm_core::{CustomerId, OrderId, OrderItemId, OrderStatus, WebshopId};

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub webshop_id: Option<WebshopId>,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An order joined with its customer's contact details.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// `quantity * unit_price`, or `None` when the product does not fit a decimal.
#[must_use]
pub fn line_total(quantity: i64, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity).checked_mul(unit_price)
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub webshop_id: Option<WebshopId>,
    pub order_number: String,
    pub order_date: NaiveDateTime,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<CustomerId>,
}

/// Order count and revenue for one status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusBreakdown {
    pub status: String,
    pub count: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTotals {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub avg_order_value: Decimal,
}

/// An order as shown in the customer portal: with a one-line item summary.
#[derive(Debug, Clone, Serialize)]
pub struct PortalOrder {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
    /// `"name (xN), name (xN)"`.
    pub items_summary: Option<String>,
}

/// Lifetime order figures of one customer.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOrderStats {
    pub total_orders: i64,
    pub total_spent: Decimal,
    pub avg_order_value: Decimal,
    pub first_order_date: Option<DateTime<Utc>>,
    pub last_order_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySpend {
    /// `YYYY-MM`.
    pub month: String,
    pub orders: i64,
    pub spent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavouriteProduct {
    pub product_name: String,
    pub total_quantity: i64,
    pub total_spent: Decimal,
}
